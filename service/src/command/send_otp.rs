//! [`Command`] for sending an OTP to a staff member.

use std::sync::Arc;

use common::{
    operations::{By, Issue, Start},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        otp, registration, session,
        stage::{Redirect, RedirectReason},
    },
    infra::{backend, Backend, Slot},
    read, task, ErrorKind, Service,
};

use super::Command;

/// [`Command`] for sending an OTP to the staff member of a registration.
///
/// At most one send is in flight per registration.
#[derive(Clone, Debug)]
pub struct SendOtp {
    /// [`session::Token`] of the registration.
    pub token: session::Token,
}

impl SendOtp {
    /// Message reported when the OTP service gave no reason of a failure.
    pub const FAILURE_MESSAGE: &'static str =
        "Failed to send OTP. Please try again.";
}

impl<B> Command<SendOtp> for Service<B>
where
    B: Backend<
        Issue<By<otp::Email, session::Token>>,
        Ok = otp::Email,
        Err = Traced<backend::Error>,
    >,
{
    type Ok = read::Snapshot;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        SendOtp { token }: SendOtp,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let slot = self.registry().get(&token).await.ok_or_else(|| {
            tracerr::new!(E::Redirected(Redirect::login(
                RedirectReason::UnknownSession
            )))
        })?;

        let (ticket, target) = {
            let mut reg = slot.lock().await;
            reg.touch(DateTime::now().coerce());
            reg.guard_login().map_err(|r| tracerr::new!(E::Redirected(r)))?;
            let ticket = reg
                .begin_send(DateTime::now().coerce())
                .map_err(tracerr::from_and_wrap!(=> E))?;
            (ticket, reg.token().clone())
        };

        match self.backend().execute(Issue(By::new(target))).await {
            Ok(email) => {
                let snapshot = {
                    let mut reg = slot.lock().await;
                    _ = reg
                        .complete_send(
                            ticket,
                            &email,
                            DateTime::now().coerce(),
                            self.config().otp_cooldown,
                        )
                        .map_err(tracerr::from_and_wrap!(=> E))?;
                    read::Snapshot::from(&*reg)
                };
                self.start_cooldown(slot).await;

                log::info!(
                    "OTP for registration `{token}` sent to `{}`",
                    email.masked(),
                );
                Ok(snapshot)
            }
            Err(e) => {
                let reason = e
                    .as_ref()
                    .message()
                    .unwrap_or(SendOtp::FAILURE_MESSAGE)
                    .to_owned();
                slot.lock()
                    .await
                    .fail_send(ticket, reason)
                    .map_err(tracerr::from_and_wrap!(=> E))?;

                log::warn!("failed to send OTP for `{token}`: {e}");
                Err(e).map_err(tracerr::map_from_and_wrap!(=> E))
            }
        }
    }
}

impl<B> Service<B> {
    /// Starts a new [`task::OtpCooldown`] for the provided [`Slot`],
    /// replacing the previous one.
    pub(crate) async fn start_cooldown(&self, slot: Arc<Slot>) {
        self.execute(Start(By::<task::OtpCooldown, _>::new(slot)))
            .await
            .unwrap_or_else(|e| match e {});
    }
}

/// Error of [`SendOtp`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Backend`] error.
    #[display("`Backend` operation failed: {_0}")]
    Backend(backend::Error),

    /// Result arrived after the registration moved on.
    #[display("{_0}")]
    Discarded(registration::Discarded),

    /// Registration cannot be at [`Stage::Login`].
    ///
    /// [`Stage::Login`]: crate::domain::Stage::Login
    #[display("Redirected to `{}`: {}", _0.to, _0.reason)]
    #[from(ignore)]
    Redirected(#[error(not(source))] Redirect),

    /// OTP cannot be sent right now.
    #[display("OTP cannot be sent: {_0}")]
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
}
