//! Read entities definitions.

pub mod registration;

pub use self::registration::Snapshot;
