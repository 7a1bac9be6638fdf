//! [`Stoppage`] definitions.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Pickup point of a transport route.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Stoppage {
    /// ID of this [`Stoppage`].
    pub id: Id,

    /// Name of this [`Stoppage`].
    pub name: String,
}

/// ID of a [`Stoppage`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(transparent)]
pub struct Id(i64);
