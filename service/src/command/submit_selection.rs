//! [`Command`] for submitting the chosen shift and stoppage.

use common::{operations::Submit, DateTime};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::{Selection, Stage};
use crate::{
    domain::{
        confirmation::Summary,
        registration, session,
        stage::{Navigation, Redirect, RedirectReason},
    },
    infra::{
        backend::{self, Choice, Rejection},
        Backend,
    },
    read, ErrorKind, Service,
};

use super::Command;

/// [`Command`] for submitting the [`Selection`] of a registration.
///
/// At most one submission is in flight per registration, and an incomplete
/// [`Selection`] never reaches the registration services.
#[derive(Clone, Debug)]
pub struct SubmitSelection {
    /// [`session::Token`] of the registration.
    pub token: session::Token,
}

impl SubmitSelection {
    /// Message reported when the registration services gave no reason of a
    /// failure.
    pub const FAILURE_MESSAGE: &'static str =
        "Failed to submit registration. Please try again.";
}

/// Output of [`SubmitSelection`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`Summary`] of the accepted submission.
    pub summary: Summary,

    /// [`Navigation`] entering [`Stage::Confirmation`].
    pub navigation: Navigation,

    /// Registration state after the [`Command`].
    pub registration: read::Snapshot,
}

impl<B> Command<SubmitSelection> for Service<B>
where
    B: Backend<Submit<Choice>, Ok = (), Err = Traced<backend::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        SubmitSelection { token }: SubmitSelection,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let slot = self.registry().get(&token).await.ok_or_else(|| {
            tracerr::new!(E::Redirected(Redirect::login(
                RedirectReason::UnknownSession
            )))
        })?;

        let (ticket, submission, target) = {
            let mut reg = slot.lock().await;
            reg.touch(DateTime::now().coerce());
            reg.guard_selection()
                .map_err(|r| tracerr::new!(E::Redirected(r)))?;
            let (ticket, submission) =
                reg.begin_submit().map_err(tracerr::from_and_wrap!(=> E))?;
            (ticket, submission, reg.navigation_token().clone())
        };

        let choice = Choice {
            token: target.clone(),
            shift: submission.shift.id,
            stoppage: submission.stoppage.id,
        };
        let res = self.backend().execute(Submit(choice)).await;

        let mut reg = slot.lock().await;
        match res {
            Ok(()) => {
                let confirmed = reg
                    .accept_submit(ticket, submission)
                    .map_err(tracerr::from_and_wrap!(=> E))?;
                let summary = confirmed.summary.clone();
                let navigation = Navigation::confirmation(
                    &target,
                    &confirmed.shift,
                    confirmed.stoppage.id,
                );

                log::info!(
                    "registration `{token}` confirmed: `{}` from `{}`",
                    summary.shift_label,
                    summary.stoppage_name,
                );
                Ok(Output {
                    summary,
                    navigation,
                    registration: read::Snapshot::from(&*reg),
                })
            }
            Err(e) => {
                reg.reject_submit(ticket)
                    .map_err(tracerr::from_and_wrap!(=> E))?;
                drop(reg);

                log::warn!("submission of `{token}` failed: {e}");
                Err(e).map_err(tracerr::map_from_and_wrap!(=> E))
            }
        }
    }
}

/// Error of [`SubmitSelection`] [`Command`] execution.
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

    /// [`Selection`] cannot be submitted right now.
    #[display("Selection cannot be submitted: {_0}")]
    Refused(registration::TransitionError),
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Backend(e) => ErrorKind::of_backend(e),
            Self::Discarded(_) | Self::Refused(_) => ErrorKind::ValidationError,
            Self::Redirected(r) => ErrorKind::of_redirect(r),
        }
    }

    /// Returns the [`Rejection`] to show to a staff member, falling back to
    /// [`SubmitSelection::FAILURE_MESSAGE`] if the registration services gave
    /// no reason.
    #[must_use]
    pub fn rejection(&self) -> Option<Rejection> {
        let Self::Backend(e) = self else {
            return None;
        };
        Some(match e {
            backend::Error::Rejected(r) if r.message.is_some() => r.clone(),
            backend::Error::Rejected(r) => Rejection {
                message: Some(SubmitSelection::FAILURE_MESSAGE.into()),
                ..r.clone()
            },
            backend::Error::Malformed(_)
            | backend::Error::EmptyCatalog(_)
            | backend::Error::Unavailable(_) => {
                Rejection::with_message(SubmitSelection::FAILURE_MESSAGE)
            }
            #[cfg(feature = "http")]
            backend::Error::Http(_) => {
                Rejection::with_message(SubmitSelection::FAILURE_MESSAGE)
            }
        })
    }
}
