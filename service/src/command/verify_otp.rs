//! [`Command`] for verifying an OTP typed by a staff member.

use common::{
    operations::{By, Verify},
    DateTime,
};
use derive_more::{Display, Error, From};
use secrecy::SecretBox;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        otp, registration, session,
        stage::{Navigation, Redirect, RedirectReason},
    },
    infra::{
        backend::{self, Attempt},
        Backend,
    },
    read, ErrorKind, Service,
};

use super::Command;

/// [`Command`] for verifying an OTP typed by a staff member.
#[derive(Clone, Debug)]
pub struct VerifyOtp {
    /// [`session::Token`] of the registration.
    pub token: session::Token,

    /// Raw code as typed.
    pub code: String,

    /// Serial of the challenge the code has been typed against, if known.
    pub serial: Option<u32>,
}

impl VerifyOtp {
    /// Field-level message recorded when the OTP service rejects a code.
    pub const REJECTION_MESSAGE: &'static str =
        "The OTP you entered is invalid or has expired.";
}

/// Output of [`VerifyOtp`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Continuation [`session::Token`] to carry further.
    pub continuation: session::Token,

    /// [`Navigation`] entering the selection stage.
    pub navigation: Navigation,

    /// Registration state after the [`Command`].
    pub registration: read::Snapshot,
}

impl<B> Command<VerifyOtp> for Service<B>
where
    B: Backend<
        Verify<By<session::Token, Attempt>>,
        Ok = session::Token,
        Err = Traced<backend::Error>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        VerifyOtp {
            token,
            code,
            serial,
        }: VerifyOtp,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let code = otp::Code::new(code)
            .ok_or_else(|| tracerr::new!(E::InvalidCode))?;

        let slot = self.registry().get(&token).await.ok_or_else(|| {
            tracerr::new!(E::Redirected(Redirect::login(
                RedirectReason::UnknownSession
            )))
        })?;

        let (ticket, target) = {
            let mut reg = slot.lock().await;
            let now = DateTime::now();
            reg.touch(now.coerce());
            reg.guard_login().map_err(|r| tracerr::new!(E::Redirected(r)))?;
            let ticket = reg
                .begin_verify(serial, self.config().otp_lifetime, now)
                .map_err(tracerr::from_and_wrap!(=> E))?;
            (ticket, reg.token().clone())
        };

        let attempt = Attempt {
            token: target,
            code: SecretBox::new(Box::new(code)),
        };
        match self.backend().execute(Verify(By::new(attempt))).await {
            Ok(continuation) => {
                let aliased = continuation != token;
                let registration = {
                    let mut reg = slot.lock().await;
                    if aliased
                        && !self
                            .registry()
                            .alias(continuation.clone(), &slot)
                            .await
                    {
                        reg.abort_verify(ticket)
                            .map_err(tracerr::from_and_wrap!(=> E))?;
                        drop(reg);

                        log::warn!(
                            "continuation `{continuation}` of `{token}` is \
                             bound to another registration",
                        );
                        return Err(tracerr::new!(E::Backend(
                            backend::Error::Malformed(format!(
                                "continuation `{continuation}` is bound to \
                                 another registration",
                            )),
                        )));
                    }
                    if let Err(e) =
                        reg.accept_verify(ticket, continuation.clone())
                    {
                        if aliased {
                            self.registry().unalias(&continuation, &slot).await;
                        }
                        return Err(tracerr::new!(E::Discarded(e)));
                    }
                    read::Snapshot::from(&*reg)
                };
                slot.stop_ticker().await;

                log::info!(
                    "registration `{token}` verified, continuing as \
                     `{continuation}`",
                );
                Ok(Output {
                    navigation: Navigation::selection(&continuation),
                    continuation,
                    registration,
                })
            }
            Err(e) if e.as_ref().is_rejection() => {
                slot.lock()
                    .await
                    .reject_verify(ticket, VerifyOtp::REJECTION_MESSAGE)
                    .map_err(tracerr::from_and_wrap!(=> E))?;

                log::debug!("OTP for `{token}` rejected: {e}");
                Err(e).map_err(tracerr::map_from_and_wrap!(=> E))
            }
            Err(e) => {
                slot.lock()
                    .await
                    .abort_verify(ticket)
                    .map_err(tracerr::from_and_wrap!(=> E))?;

                log::warn!("failed to verify OTP for `{token}`: {e}");
                Err(e).map_err(tracerr::map_from_and_wrap!(=> E))
            }
        }
    }
}

/// Error of [`VerifyOtp`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Backend`] error.
    #[display("`Backend` operation failed: {_0}")]
    Backend(backend::Error),

    /// Result arrived after the registration moved on.
    #[display("{_0}")]
    Discarded(registration::Discarded),

    /// Code is not six digits.
    #[display("OTP must be 6 digits")]
    InvalidCode,

    /// Registration cannot be at the login stage.
    #[display("Redirected to `{}`: {}", _0.to, _0.reason)]
    #[from(ignore)]
    Redirected(#[error(not(source))] Redirect),

    /// Code cannot be verified right now.
    #[display("OTP cannot be verified: {_0}")]
    Refused(registration::TransitionError),
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Backend(e) => ErrorKind::of_backend(e),
            Self::Discarded(_) | Self::InvalidCode | Self::Refused(_) => {
                ErrorKind::ValidationError
            }
            Self::Redirected(r) => ErrorKind::of_redirect(r),
        }
    }
}
