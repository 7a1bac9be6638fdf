//! [`Command`] for entering the selection stage of a registration.

use common::{
    operations::{By, Select},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Stage;
use crate::{
    domain::{
        registration::{self, LoadStart},
        session,
        stage::{Redirect, RedirectReason},
        Catalog,
    },
    infra::{backend, Backend},
    read, ErrorKind, Service,
};

use super::Command;

/// [`Command`] for entering [`Stage::Selection`] of a registration.
///
/// Loads the [`Catalog`] once per arrival: a pending load is reported as
/// loading, and a failed one stays failed until [`ReloadCatalog`].
///
/// [`ReloadCatalog`]: super::ReloadCatalog
#[derive(Clone, Debug)]
pub struct EnterSelection {
    /// [`session::Token`] of the registration, either the original or the
    /// continuation one.
    pub token: session::Token,
}

impl EnterSelection {
    /// Message reported when the registration services gave no reason of a
    /// failed [`Catalog`] fetch.
    pub const FAILURE_MESSAGE: &'static str = "Failed to fetch metadata";

    /// Message reported when the registration services don't know the staff
    /// member.
    pub const NOT_FOUND_MESSAGE: &'static str = "Staff member is not found";
}

impl<B> Command<EnterSelection> for Service<B>
where
    B: Backend<
        Select<By<Option<Catalog>, session::Token>>,
        Ok = Option<Catalog>,
        Err = Traced<backend::Error>,
    >,
{
    type Ok = read::Snapshot;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        EnterSelection { token }: EnterSelection,
    ) -> Result<Self::Ok, Self::Err> {
        self.load_catalog(&token, false).await
    }
}

impl<B> Service<B> {
    /// Loads the [`Catalog`] of the registration reachable by the provided
    /// [`session::Token`], unless it's loaded, loading, or failed without
    /// the `retry` requested.
    pub(crate) async fn load_catalog(
        &self,
        token: &session::Token,
        retry: bool,
    ) -> Result<read::Snapshot, Traced<ExecutionError>>
    where
        B: Backend<
            Select<By<Option<Catalog>, session::Token>>,
            Ok = Option<Catalog>,
            Err = Traced<backend::Error>,
        >,
    {
        use ExecutionError as E;

        let slot = self.registry().get(token).await.ok_or_else(|| {
            tracerr::new!(E::Redirected(Redirect::login(
                RedirectReason::UnknownSession
            )))
        })?;

        let (ticket, target) = {
            let mut reg = slot.lock().await;
            reg.touch(DateTime::now().coerce());
            reg.guard_selection()
                .map_err(|r| tracerr::new!(E::Redirected(r)))?;
            let start = reg
                .begin_load(retry)
                .map_err(tracerr::from_and_wrap!(=> E))?;
            match start {
                LoadStart::Start(ticket) => {
                    (ticket, reg.navigation_token().clone())
                }
                LoadStart::Skip => return Ok(read::Snapshot::from(&*reg)),
            }
        };

        let res = self.backend().execute(Select(By::new(target))).await;

        let mut reg = slot.lock().await;
        match res {
            Ok(Some(catalog)) => {
                let catalog = reg
                    .complete_load(ticket, catalog)
                    .map_err(tracerr::from_and_wrap!(=> E))?;

                log::debug!(
                    "catalog for `{token}` loaded: {} shifts",
                    catalog.shifts.len(),
                );
                Ok(read::Snapshot::from(&*reg))
            }
            Ok(None) => {
                reg.fail_load(ticket, EnterSelection::NOT_FOUND_MESSAGE)
                    .map_err(tracerr::from_and_wrap!(=> E))?;

                log::info!("staff member of `{token}` is not found");
                Err(tracerr::new!(E::StaffNotFound))
            }
            Err(e) => {
                let message = e
                    .as_ref()
                    .message()
                    .unwrap_or(EnterSelection::FAILURE_MESSAGE)
                    .to_owned();
                reg.fail_load(ticket, message)
                    .map_err(tracerr::from_and_wrap!(=> E))?;

                log::warn!("failed to load catalog for `{token}`: {e}");
                Err(e).map_err(tracerr::map_from_and_wrap!(=> E))
            }
        }
    }
}

/// Error of [`EnterSelection`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Backend`] error.
    #[display("`Backend` operation failed: {_0}")]
    Backend(backend::Error),

    /// Result arrived after the registration moved on.
    #[display("{_0}")]
    Discarded(registration::Discarded),

    /// Registration cannot be at [`Stage::Selection`].
    #[display("Redirected to `{}`: {}", _0.to, _0.reason)]
    #[from(ignore)]
    Redirected(#[error(not(source))] Redirect),

    /// [`Catalog`] cannot be loaded right now.
    #[display("Catalog cannot be loaded: {_0}")]
    Refused(registration::TransitionError),

    /// Registration services don't know the staff member.
    #[display("Staff member is not found")]
    StaffNotFound,
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Backend(e) => ErrorKind::of_backend(e),
            Self::Discarded(_) | Self::Refused(_) => ErrorKind::ValidationError,
            Self::Redirected(r) => ErrorKind::of_redirect(r),
            Self::StaffNotFound => ErrorKind::RejectedByService,
        }
    }
}

#[cfg(test)]
pub(crate) mod spec {
    use crate::{
        command::{StartRegistration, VerifyOtp},
        domain::{session, stage::RedirectReason, Stage},
        infra::{backend::memory::Operation, InMemory},
        read::registration::CatalogView,
        spec::service,
        Command as _, Service,
    };

    use super::{EnterSelection, ExecutionError};

    /// Brings the demo registration to the selection stage.
    pub(crate) async fn verified(svc: &Service<InMemory>) -> session::Token {
        let token = session::Token::new("U1").unwrap();
        _ = svc
            .execute(StartRegistration {
                token: token.clone(),
            })
            .await
            .unwrap();
        svc.execute(VerifyOtp {
            token: token.clone(),
            code: "123456".into(),
            serial: Some(1),
        })
        .await
        .unwrap()
        .continuation
    }

    #[tokio::test]
    async fn loads_catalog_once() {
        let (svc, backend) = service();
        let token = verified(&svc).await;

        let first = svc
            .execute(EnterSelection {
                token: token.clone(),
            })
            .await
            .unwrap();
        let second = svc.execute(EnterSelection { token }).await.unwrap();

        for snapshot in [first, second] {
            assert_eq!(snapshot.stage, Stage::Selection);
            let CatalogView::Loaded { catalog, .. } = snapshot.catalog else {
                panic!("catalog is not loaded");
            };
            assert_eq!(catalog.shifts.len(), 2);
        }
        assert_eq!(backend.calls(Operation::Select), 1);
    }

    #[tokio::test]
    async fn stays_failed_until_reload() {
        let (svc, backend) = service();
        let token = verified(&svc).await;
        backend.set_unavailable(true).await;

        let err = svc
            .execute(EnterSelection {
                token: token.clone(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Backend(_)));

        backend.set_unavailable(false).await;
        let snapshot = svc.execute(EnterSelection { token }).await.unwrap();

        assert!(matches!(
            snapshot.catalog,
            CatalogView::Failed { ref message }
                if message == EnterSelection::FAILURE_MESSAGE,
        ));
        assert_eq!(backend.calls(Operation::Select), 1);
    }

    #[tokio::test]
    async fn redirects_unverified_to_login() {
        let (svc, backend) = service();
        let token = session::Token::new("U1").unwrap();
        _ = svc
            .execute(StartRegistration {
                token: token.clone(),
            })
            .await
            .unwrap();

        let err = svc.execute(EnterSelection { token }).await.unwrap_err();

        let ExecutionError::Redirected(r) = err.as_ref() else {
            panic!("not redirected: {err}");
        };
        assert_eq!(r.to, Stage::Login);
        assert_eq!(r.reason, RedirectReason::NotVerified);
        assert_eq!(backend.calls(Operation::Select), 0);
    }
}
