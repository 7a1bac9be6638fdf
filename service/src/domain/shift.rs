//! [`Shift`] definitions.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Working shift a staff member may register for.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Shift {
    /// ID of this [`Shift`].
    pub id: Id,

    /// Human-readable label of this [`Shift`] (e.g. `Morning`).
    pub label: String,
}

impl Shift {
    /// Checks whether this [`Shift`] label contains the provided `hint`,
    /// ignoring case.
    #[must_use]
    pub fn matches_hint(&self, hint: &str) -> bool {
        let hint = hint.trim().to_lowercase();
        !hint.is_empty() && self.label.to_lowercase().contains(&hint)
    }
}

/// ID of a [`Shift`].
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
