//! [`Command`] for changing the shift and stoppage [`Selection`].

use common::DateTime;
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::{Selection, Stage};
use crate::{
    domain::{
        registration::{Change, TransitionError},
        session,
        stage::{Redirect, RedirectReason},
    },
    read, ErrorKind, Service,
};

use super::Command;

/// [`Command`] for applying a [`Change`] to the [`Selection`] of a
/// registration.
#[derive(Clone, Debug)]
pub struct UpdateSelection {
    /// [`session::Token`] of the registration.
    pub token: session::Token,

    /// [`Change`] to apply.
    pub change: Change,
}

impl<B> Command<UpdateSelection> for Service<B> {
    type Ok = read::Snapshot;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        UpdateSelection { token, change }: UpdateSelection,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let slot = self.registry().get(&token).await.ok_or_else(|| {
            tracerr::new!(E::Redirected(Redirect::login(
                RedirectReason::UnknownSession
            )))
        })?;

        let mut reg = slot.lock().await;
        reg.touch(DateTime::now().coerce());
        reg.guard_selection()
            .map_err(|r| tracerr::new!(E::Redirected(r)))?;
        _ = reg
            .change_selection(change)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        Ok(read::Snapshot::from(&*reg))
    }
}

/// Error of [`UpdateSelection`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Registration cannot be at [`Stage::Selection`].
    #[display("Redirected to `{}`: {}", _0.to, _0.reason)]
    #[from(ignore)]
    Redirected(#[error(not(source))] Redirect),

    /// [`Change`] is refused.
    #[display("Selection cannot be changed: {_0}")]
    Refused(TransitionError),
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Redirected(r) => ErrorKind::of_redirect(r),
            Self::Refused(_) => ErrorKind::ValidationError,
        }
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{enter_selection::spec::verified, EnterSelection},
        domain::{
            registration::{Change, TransitionError},
            selection::SelectionError,
            session,
        },
        infra::InMemory,
        spec::service,
        Command as _, Service,
    };

    use super::{ExecutionError, UpdateSelection};

    async fn loaded(svc: &Service<InMemory>) -> session::Token {
        let token = verified(svc).await;
        _ = svc
            .execute(EnterSelection {
                token: token.clone(),
            })
            .await
            .unwrap();
        token
    }

    #[tokio::test]
    async fn keeps_only_last_shift() {
        let (svc, _) = service();
        let token = loaded(&svc).await;

        for id in [1, 2] {
            _ = svc
                .execute(UpdateSelection {
                    token: token.clone(),
                    change: Change::Shift(id.into()),
                })
                .await
                .unwrap();
        }
        let snapshot = svc
            .execute(UpdateSelection {
                token,
                change: Change::Stoppage(4.into()),
            })
            .await
            .unwrap();

        assert_eq!(snapshot.selection.shift(), Some(2.into()));
        assert_eq!(snapshot.selection.stoppage(), Some(4.into()));
        assert!(snapshot.can_submit);
    }

    #[tokio::test]
    async fn matches_shift_hint() {
        let (svc, _) = service();
        let token = loaded(&svc).await;

        let snapshot = svc
            .execute(UpdateSelection {
                token: token.clone(),
                change: Change::ShiftHint("evening".into()),
            })
            .await
            .unwrap();
        let err = svc
            .execute(UpdateSelection {
                token,
                change: Change::ShiftHint("night".into()),
            })
            .await
            .unwrap_err();

        assert_eq!(snapshot.selection.shift(), Some(2.into()));
        assert!(matches!(
            err.as_ref(),
            ExecutionError::Refused(TransitionError::Selection(
                SelectionError::NoShiftMatchesHint
            )),
        ));
    }

    #[tokio::test]
    async fn refuses_before_catalog_is_loaded() {
        let (svc, _) = service();
        let token = verified(&svc).await;

        let err = svc
            .execute(UpdateSelection {
                token,
                change: Change::Shift(1.into()),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Refused(TransitionError::CatalogNotLoaded),
        ));
    }
}
