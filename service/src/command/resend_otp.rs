//! [`Command`] for re-sending an OTP.

use common::DateTime;
use tracerr::Traced;

use crate::{
    domain::{
        registration::TransitionError,
        session,
        stage::{Redirect, RedirectReason},
    },
    read, Service,
};

use super::{Command, SendOtp};

pub use super::send_otp::ExecutionError;

/// [`Command`] for re-sending an OTP once the cooldown is over.
///
/// A no-op while the cooldown runs or a send is in flight.
#[derive(Clone, Debug)]
pub struct ResendOtp {
    /// [`session::Token`] of the registration.
    pub token: session::Token,
}

/// Output of [`ResendOtp`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Indicator whether an OTP has been actually re-sent.
    pub resent: bool,

    /// Registration state after the [`Command`].
    pub registration: read::Snapshot,
}

impl<B> Command<ResendOtp> for Service<B>
where
    Self: Command<
        SendOtp,
        Ok = read::Snapshot,
        Err = Traced<ExecutionError>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        ResendOtp { token }: ResendOtp,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let slot = self.registry().get(&token).await.ok_or_else(|| {
            tracerr::new!(E::Redirected(Redirect::login(
                RedirectReason::UnknownSession
            )))
        })?;
        {
            let mut reg = slot.lock().await;
            reg.touch(DateTime::now().coerce());
            reg.guard_login().map_err(|r| tracerr::new!(E::Redirected(r)))?;
            if !reg.can_resend() {
                return Ok(Output {
                    resent: false,
                    registration: read::Snapshot::from(&*reg),
                });
            }
        }

        match self.execute(SendOtp { token }).await {
            Ok(registration) => Ok(Output {
                resent: true,
                registration,
            }),
            Err(e)
                if matches!(
                    e.as_ref(),
                    E::Refused(TransitionError::SendInFlight),
                ) =>
            {
                Ok(Output {
                    resent: false,
                    registration: read::Snapshot::from(&*slot.lock().await),
                })
            }
            Err(e) => Err(e),
        }
    }
}
