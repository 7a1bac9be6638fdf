//! Marker types.

/// Marker type describing an issuance (of a one-time password, for example).
#[derive(Clone, Copy, Debug)]
pub struct Issuance;

/// Marker type describing the last activity upon an entity.
#[derive(Clone, Copy, Debug)]
pub struct Activity;
