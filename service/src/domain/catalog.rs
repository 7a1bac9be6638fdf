//! [`Catalog`] of shifts and stoppages available to a staff member.

use std::collections::BTreeMap;

use derive_more::{Display, Error};
use serde::Serialize;

use super::{shift, staff, stoppage, Shift, Stoppage};

/// Staff [`staff::Profile`] together with the [`Shift`]s and [`Stoppage`]s
/// available to it.
///
/// Always arrives atomically from a single backend call.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Catalog {
    /// [`staff::Profile`] of the staff member.
    pub profile: staff::Profile,

    /// Available [`Shift`]s.
    pub shifts: Vec<Shift>,

    /// Available [`Stoppage`]s.
    pub stoppages: Stoppages,
}

/// [`Stoppage`]s of a [`Catalog`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "items")]
pub enum Stoppages {
    /// One flat list serving every [`Shift`].
    Global(Vec<Stoppage>),

    /// Separate list for every [`Shift`].
    ByShift(BTreeMap<shift::Id, Vec<Stoppage>>),
}

impl Catalog {
    /// Creates a new [`Catalog`], refusing empty ones.
    ///
    /// # Errors
    ///
    /// If there is no [`Shift`] or no [`Stoppage`] to choose from.
    pub fn new(
        profile: staff::Profile,
        shifts: Vec<Shift>,
        stoppages: Stoppages,
    ) -> Result<Self, EmptyCatalogError> {
        if shifts.is_empty() {
            return Err(EmptyCatalogError::NoShifts);
        }
        let no_stoppages = match &stoppages {
            Stoppages::Global(all) => all.is_empty(),
            Stoppages::ByShift(by_shift) => by_shift.values().all(Vec::is_empty),
        };
        if no_stoppages {
            return Err(EmptyCatalogError::NoStoppages);
        }

        Ok(Self {
            profile,
            shifts,
            stoppages,
        })
    }

    /// Indicates whether [`Stoppage`]s depend on the chosen [`Shift`].
    #[must_use]
    pub fn is_shift_scoped(&self) -> bool {
        matches!(self.stoppages, Stoppages::ByShift(_))
    }

    /// Returns the [`Shift`] with the provided ID, if any.
    #[must_use]
    pub fn shift(&self, id: shift::Id) -> Option<&Shift> {
        self.shifts.iter().find(|s| s.id == id)
    }

    /// Returns the [`Shift`] with the provided label, ignoring case.
    #[must_use]
    pub fn shift_by_label(&self, label: &str) -> Option<&Shift> {
        let label = label.trim();
        self.shifts
            .iter()
            .find(|s| s.label.eq_ignore_ascii_case(label))
    }

    /// Returns the [`Stoppage`]s selectable for the provided [`Shift`].
    ///
    /// Shift-scoped [`Stoppage`]s are unavailable until a [`Shift`] is
    /// chosen.
    #[must_use]
    pub fn stoppages_for(&self, shift: Option<shift::Id>) -> &[Stoppage] {
        match (&self.stoppages, shift) {
            (Stoppages::Global(all), _) => all.as_slice(),
            (Stoppages::ByShift(by_shift), Some(id)) => {
                by_shift.get(&id).map_or(&[][..], Vec::as_slice)
            }
            (Stoppages::ByShift(_), None) => &[],
        }
    }

    /// Returns the [`Stoppage`] with the provided ID among the ones
    /// selectable for the provided [`Shift`].
    #[must_use]
    pub fn stoppage(
        &self,
        shift: Option<shift::Id>,
        id: stoppage::Id,
    ) -> Option<&Stoppage> {
        self.stoppages_for(shift).iter().find(|s| s.id == id)
    }

    /// Returns the [`Stoppage`] with the provided ID regardless of the
    /// [`Shift`] it belongs to.
    #[must_use]
    pub fn any_stoppage(&self, id: stoppage::Id) -> Option<&Stoppage> {
        match &self.stoppages {
            Stoppages::Global(all) => all.iter().find(|s| s.id == id),
            Stoppages::ByShift(by_shift) => {
                by_shift.values().flatten().find(|s| s.id == id)
            }
        }
    }
}

/// Error of creating an empty [`Catalog`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
pub enum EmptyCatalogError {
    /// No [`Shift`] is available.
    #[display("No shifts are available")]
    NoShifts,

    /// No [`Stoppage`] is available.
    #[display("No stoppages are available")]
    NoStoppages,
}

#[cfg(test)]
pub(crate) mod spec {
    use std::collections::BTreeMap;

    use super::{Catalog, EmptyCatalogError, Stoppages};
    use crate::domain::{staff, Shift, Stoppage};

    pub(crate) fn profile() -> staff::Profile {
        staff::Profile {
            first_name: "John".to_owned(),
            last_name: "Doe".to_owned(),
            employee_id: "E123456".to_owned(),
            department: "Computer Science".to_owned(),
        }
    }

    pub(crate) fn shift(id: i64, label: &str) -> Shift {
        Shift {
            id: id.into(),
            label: label.to_owned(),
        }
    }

    pub(crate) fn stoppage(id: i64, name: &str) -> Stoppage {
        Stoppage {
            id: id.into(),
            name: name.to_owned(),
        }
    }

    pub(crate) fn global() -> Catalog {
        Catalog::new(
            profile(),
            vec![shift(1, "Morning"), shift(2, "Evening")],
            Stoppages::Global(vec![
                stoppage(5, "Central Station"),
                stoppage(6, "Anand Van"),
            ]),
        )
        .unwrap()
    }

    pub(crate) fn shift_scoped() -> Catalog {
        Catalog::new(
            profile(),
            vec![shift(1, "Morning"), shift(2, "Evening")],
            Stoppages::ByShift(BTreeMap::from([
                (1.into(), vec![stoppage(5, "Central Station")]),
                (
                    2.into(),
                    vec![stoppage(6, "Anand Van"), stoppage(7, "Akabar Pur")],
                ),
            ])),
        )
        .unwrap()
    }

    #[test]
    fn refuses_empty_catalogs() {
        assert_eq!(
            Catalog::new(
                profile(),
                vec![],
                Stoppages::Global(vec![stoppage(5, "Central Station")]),
            ),
            Err(EmptyCatalogError::NoShifts),
        );
        assert_eq!(
            Catalog::new(
                profile(),
                vec![shift(1, "Morning")],
                Stoppages::Global(vec![]),
            ),
            Err(EmptyCatalogError::NoStoppages),
        );
        assert_eq!(
            Catalog::new(
                profile(),
                vec![shift(1, "Morning")],
                Stoppages::ByShift(BTreeMap::from([(1.into(), vec![])])),
            ),
            Err(EmptyCatalogError::NoStoppages),
        );
    }

    #[test]
    fn global_stoppages_ignore_shift() {
        let catalog = global();

        assert_eq!(catalog.stoppages_for(None).len(), 2);
        assert_eq!(catalog.stoppages_for(Some(2.into())).len(), 2);
        assert!(catalog.stoppage(None, 5.into()).is_some());
    }

    #[test]
    fn shift_scoped_stoppages_follow_shift() {
        let catalog = shift_scoped();

        assert!(catalog.stoppages_for(None).is_empty());
        assert!(catalog.stoppage(Some(1.into()), 6.into()).is_none());
        assert!(catalog.stoppage(Some(2.into()), 6.into()).is_some());
        assert_eq!(
            catalog.any_stoppage(7.into()).map(|s| s.name.as_str()),
            Some("Akabar Pur"),
        );
    }

    #[test]
    fn finds_shifts_by_label_ignoring_case() {
        let catalog = global();

        assert_eq!(
            catalog.shift_by_label("morning").map(|s| s.id),
            Some(1.into()),
        );
        assert!(catalog.shift_by_label("Night").is_none());
    }
}
