//! [`Command`] for entering the login stage of a registration.

use common::DateTime;
use derive_more::{Display, Error};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Stage;
use crate::{
    domain::{otp::Phase, session, stage::Redirect},
    read, ErrorKind, Service,
};

use super::{send_otp, Command, SendOtp};

/// [`Command`] for entering [`Stage::Login`] of a registration.
///
/// Starts a new registration if there is none for the
/// [`session::Token`], and sends an OTP exactly once: repeated entries
/// never send again.
#[derive(Clone, Debug)]
pub struct StartRegistration {
    /// [`session::Token`] of the registration.
    pub token: session::Token,
}

impl<B> Command<StartRegistration> for Service<B>
where
    Self: Command<
        SendOtp,
        Ok = read::Snapshot,
        Err = Traced<send_otp::ExecutionError>,
    >,
{
    type Ok = read::Snapshot;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        StartRegistration { token }: StartRegistration,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let (slot, created) = self
            .registry()
            .get_or_create(&token, DateTime::now().coerce())
            .await;
        if created {
            log::info!("registration `{token}` started");
        }

        {
            let mut reg = slot.lock().await;
            reg.touch(DateTime::now().coerce());
            reg.guard_login().map_err(|r| tracerr::new!(E::Redirected(r)))?;
            if reg.otp().phase != Phase::Idle {
                return Ok(read::Snapshot::from(&*reg));
            }
        }

        match self.execute(SendOtp { token }).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                use send_otp::ExecutionError as SendError;

                match e.as_ref() {
                    SendError::Redirected(r) => {
                        return Err(tracerr::new!(E::Redirected(r.clone())));
                    }
                    SendError::Backend(_)
                    | SendError::Discarded(_)
                    | SendError::Refused(_) => {
                        log::debug!("automatic OTP send skipped: {e}");
                    }
                }
                Ok(read::Snapshot::from(&*slot.lock().await))
            }
        }
    }
}

/// Error of [`StartRegistration`] [`Command`] execution.
#[derive(Debug, Display, Error)]
pub enum ExecutionError {
    /// Registration is past [`Stage::Login`] or gone.
    #[display("Redirected to `{}`: {}", _0.to, _0.reason)]
    Redirected(#[error(not(source))] Redirect),
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Redirected(r) => ErrorKind::of_redirect(r),
        }
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::{otp, session, Stage},
        infra::backend::memory::Operation,
        spec::service,
        Command as _,
    };

    use super::StartRegistration;

    fn start() -> StartRegistration {
        StartRegistration {
            token: session::Token::new("U1").unwrap(),
        }
    }

    #[tokio::test]
    async fn sends_otp_once_per_registration() {
        let (svc, backend) = service();

        let first = svc.execute(start()).await.unwrap();
        let second = svc.execute(start()).await.unwrap();

        assert_eq!(first.otp.phase, otp::Phase::AwaitingCode);
        assert_eq!(second.otp.phase, otp::Phase::AwaitingCode);
        assert_eq!(second.otp.serial, Some(1));
        assert_eq!(backend.calls(Operation::Issue), 1);
    }

    #[tokio::test]
    async fn stays_at_login_when_send_fails() {
        let (svc, backend) = service();
        backend.set_unavailable(true).await;

        let snapshot = svc.execute(start()).await.unwrap();

        assert_eq!(snapshot.stage, Stage::Login);
        assert_eq!(snapshot.otp.phase, otp::Phase::SendFailed);
        assert_eq!(snapshot.otp.status, Some(otp::Status::Failed));
        assert_eq!(
            snapshot.otp.send_error.as_deref(),
            Some("Failed to send OTP. Please try again."),
        );
        assert!(snapshot.otp.can_resend);
    }
}
