//! [`Selection`] of a shift and a stoppage.

use derive_more::{Display, Error};
use serde::Serialize;

use super::{shift, stoppage, Catalog};

/// Current choice of a staff member: at most one shift and at most one
/// stoppage.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Selection {
    /// Chosen [`shift::Id`], if any.
    shift: Option<shift::Id>,

    /// Chosen [`stoppage::Id`], if any.
    stoppage: Option<stoppage::Id>,
}

impl Selection {
    /// Returns the chosen [`shift::Id`], if any.
    #[must_use]
    pub fn shift(&self) -> Option<shift::Id> {
        self.shift
    }

    /// Returns the chosen [`stoppage::Id`], if any.
    #[must_use]
    pub fn stoppage(&self) -> Option<stoppage::Id> {
        self.stoppage
    }

    /// Chooses the shift with the provided `id`, replacing the previous one.
    ///
    /// Clears the chosen stoppage if stoppages are shift-scoped and the shift
    /// actually changes.
    ///
    /// # Errors
    ///
    /// If the provided `id` is not in the [`Catalog`].
    pub fn select_shift(
        &mut self,
        catalog: &Catalog,
        id: shift::Id,
    ) -> Result<(), SelectionError> {
        if catalog.shift(id).is_none() {
            return Err(SelectionError::UnknownShift(id));
        }

        if catalog.is_shift_scoped() && self.shift != Some(id) {
            self.stoppage = None;
        }
        self.shift = Some(id);
        Ok(())
    }

    /// Chooses the first shift whose label contains the provided `hint`.
    ///
    /// # Errors
    ///
    /// If no shift in the [`Catalog`] matches the `hint`.
    pub fn select_shift_by_hint(
        &mut self,
        catalog: &Catalog,
        hint: &str,
    ) -> Result<shift::Id, SelectionError> {
        let id = catalog
            .shifts
            .iter()
            .find(|s| s.matches_hint(hint))
            .map(|s| s.id)
            .ok_or(SelectionError::NoShiftMatchesHint)?;
        self.select_shift(catalog, id)?;
        Ok(id)
    }

    /// Chooses the stoppage with the provided `id`, replacing the previous
    /// one.
    ///
    /// # Errors
    ///
    /// If:
    /// - stoppages are shift-scoped and no shift is chosen yet;
    /// - the provided `id` is not selectable for the chosen shift.
    pub fn select_stoppage(
        &mut self,
        catalog: &Catalog,
        id: stoppage::Id,
    ) -> Result<(), SelectionError> {
        if catalog.is_shift_scoped() && self.shift.is_none() {
            return Err(SelectionError::ShiftRequired);
        }
        if catalog.stoppage(self.shift, id).is_none() {
            return Err(SelectionError::UnknownStoppage(id));
        }

        self.stoppage = Some(id);
        Ok(())
    }

    /// Indicates whether both a shift and a stoppage are chosen.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete().is_some()
    }

    /// Returns both chosen IDs if this [`Selection`] is complete.
    #[must_use]
    pub fn complete(&self) -> Option<(shift::Id, stoppage::Id)> {
        self.shift.zip(self.stoppage)
    }

    /// Forgets both choices.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Error of changing a [`Selection`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
pub enum SelectionError {
    /// Shift is not in the [`Catalog`].
    #[display("Shift `{_0}` is not available")]
    UnknownShift(#[error(not(source))] shift::Id),

    /// Stoppage is not selectable for the chosen shift.
    #[display("Stoppage `{_0}` is not available")]
    UnknownStoppage(#[error(not(source))] stoppage::Id),

    /// Stoppages are shift-scoped and no shift is chosen yet.
    #[display("Select a shift before selecting a stoppage")]
    ShiftRequired,

    /// No shift label matches the provided hint.
    #[display("No shift matches the suggestion")]
    NoShiftMatchesHint,
}

#[cfg(test)]
mod spec {
    use super::{Selection, SelectionError};
    use crate::domain::catalog::spec::{global, shift_scoped};

    #[test]
    fn keeps_single_shift() {
        let catalog = global();
        let mut selection = Selection::default();

        selection.select_shift(&catalog, 1.into()).unwrap();
        selection.select_shift(&catalog, 2.into()).unwrap();

        assert_eq!(selection.shift(), Some(2.into()));
    }

    #[test]
    fn keeps_single_stoppage() {
        let catalog = global();
        let mut selection = Selection::default();

        selection.select_stoppage(&catalog, 5.into()).unwrap();
        selection.select_stoppage(&catalog, 6.into()).unwrap();

        assert_eq!(selection.stoppage(), Some(6.into()));
    }

    #[test]
    fn global_stoppage_survives_shift_change() {
        let catalog = global();
        let mut selection = Selection::default();

        selection.select_shift(&catalog, 1.into()).unwrap();
        selection.select_stoppage(&catalog, 5.into()).unwrap();
        selection.select_shift(&catalog, 2.into()).unwrap();

        assert_eq!(selection.complete(), Some((2.into(), 5.into())));
    }

    #[test]
    fn shift_scoped_stoppage_cleared_on_shift_change() {
        let catalog = shift_scoped();
        let mut selection = Selection::default();

        selection.select_shift(&catalog, 2.into()).unwrap();
        selection.select_stoppage(&catalog, 6.into()).unwrap();
        selection.select_shift(&catalog, 2.into()).unwrap();
        assert_eq!(selection.stoppage(), Some(6.into()));

        selection.select_shift(&catalog, 1.into()).unwrap();
        assert_eq!(selection.stoppage(), None);
        assert!(!selection.is_complete());
    }

    #[test]
    fn shift_scoped_stoppage_requires_shift() {
        let catalog = shift_scoped();
        let mut selection = Selection::default();

        assert_eq!(
            selection.select_stoppage(&catalog, 5.into()),
            Err(SelectionError::ShiftRequired),
        );

        selection.select_shift(&catalog, 1.into()).unwrap();
        assert_eq!(
            selection.select_stoppage(&catalog, 6.into()),
            Err(SelectionError::UnknownStoppage(6.into())),
        );
    }

    #[test]
    fn refuses_unknown_ids() {
        let catalog = global();
        let mut selection = Selection::default();

        assert_eq!(
            selection.select_shift(&catalog, 9.into()),
            Err(SelectionError::UnknownShift(9.into())),
        );
        assert_eq!(
            selection.select_stoppage(&catalog, 9.into()),
            Err(SelectionError::UnknownStoppage(9.into())),
        );
        assert_eq!(selection, Selection::default());
    }

    #[test]
    fn selects_shift_by_hint() {
        let catalog = global();
        let mut selection = Selection::default();

        assert_eq!(
            selection.select_shift_by_hint(&catalog, "EVEN"),
            Ok(2.into()),
        );
        assert_eq!(
            selection.select_shift_by_hint(&catalog, "Night"),
            Err(SelectionError::NoShiftMatchesHint),
        );
        assert_eq!(selection.shift(), Some(2.into()));
    }

    #[test]
    fn resets_both_choices() {
        let catalog = global();
        let mut selection = Selection::default();
        selection.select_shift(&catalog, 1.into()).unwrap();
        selection.select_stoppage(&catalog, 5.into()).unwrap();
        assert!(selection.is_complete());

        selection.reset();

        assert_eq!(selection.complete(), None);
    }
}
