//! Confirmation [`Summary`] definitions.

use serde::Serialize;

use super::{staff, Catalog, Shift, Stoppage};

/// Read-only summary shown once a registration is accepted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Full name of the staff member.
    pub staff_name: staff::Name,

    /// Label of the submitted [`Shift`].
    pub shift_label: String,

    /// Name of the submitted [`Stoppage`].
    pub stoppage_name: String,
}

impl Summary {
    /// Assembles a [`Summary`] from the [`Catalog`] entries that were
    /// submitted.
    #[must_use]
    pub fn new(catalog: &Catalog, shift: &Shift, stoppage: &Stoppage) -> Self {
        Self {
            staff_name: catalog.profile.name(),
            shift_label: shift.label.clone(),
            stoppage_name: stoppage.name.clone(),
        }
    }
}
