//! [`Command`] for abandoning a registration.

use std::convert::Infallible;

use tracing as log;

use crate::{domain::session, Service};

use super::Command;

/// [`Command`] for tearing a registration down.
///
/// Cancels its OTP cooldown and removes it with all its aliases. Results of
/// backend calls still in flight for it are discarded.
#[derive(Clone, Debug)]
pub struct AbandonRegistration {
    /// [`session::Token`] of the registration, either the original or the
    /// continuation one.
    pub token: session::Token,
}

impl<B> Command<AbandonRegistration> for Service<B> {
    /// Indicator whether there was a registration to abandon.
    type Ok = bool;
    type Err = Infallible;

    async fn execute(
        &self,
        AbandonRegistration { token }: AbandonRegistration,
    ) -> Result<Self::Ok, Self::Err> {
        let abandoned = self.registry().discard(&token).await.is_some();
        if abandoned {
            log::info!("registration `{token}` abandoned");
        }
        Ok(abandoned)
    }
}

#[cfg(test)]
mod spec {
    use common::DateTime;

    use crate::{
        command::{
            enter_selection::spec::verified, send_otp, EnterSelection,
            SendOtp, StartRegistration, VerifyOtp,
        },
        domain::{otp, session, Stage},
        infra::backend::memory::Operation,
        spec::service,
        Command as _, ErrorKind,
    };

    use super::AbandonRegistration;

    fn token() -> session::Token {
        session::Token::new("U1").unwrap()
    }

    #[tokio::test]
    async fn removes_registration_with_aliases() {
        let (svc, _) = service();
        _ = verified(&svc).await;

        let first = svc
            .execute(AbandonRegistration { token: token() })
            .await
            .unwrap();
        let second = svc
            .execute(AbandonRegistration { token: token() })
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert!(svc.registry().is_empty().await);
    }

    #[tokio::test]
    async fn discards_send_finished_after_abandonment() {
        let (svc, backend) = service();
        let (slot, _) = svc
            .registry()
            .get_or_create(&token(), DateTime::now().coerce())
            .await;
        let gate = backend.hold(Operation::Issue).await;

        let (sent, abandoned) = tokio::join!(
            svc.execute(SendOtp { token: token() }),
            async {
                tokio::task::yield_now().await;
                let res =
                    svc.execute(AbandonRegistration { token: token() }).await;
                drop(gate);
                res
            },
        );

        assert!(abandoned.unwrap());
        assert!(matches!(
            sent.unwrap_err().as_ref(),
            send_otp::ExecutionError::Discarded(_),
        ));
        let reg = slot.lock().await;
        assert!(reg.otp().challenge.is_none());
        assert_eq!(reg.cooldown_remaining(), 0);
        assert!(svc.registry().get(&token()).await.is_none());
    }

    #[tokio::test]
    async fn discards_verification_finished_after_abandonment() {
        let (svc, backend) = service();
        _ = svc.execute(StartRegistration { token: token() }).await.unwrap();
        let slot = svc.registry().get(&token()).await.unwrap();
        let gate = backend.hold(Operation::Verify).await;

        let (verified, abandoned) = tokio::join!(
            svc.execute(VerifyOtp {
                token: token(),
                code: "123456".into(),
                serial: Some(1),
            }),
            async {
                tokio::task::yield_now().await;
                let res =
                    svc.execute(AbandonRegistration { token: token() }).await;
                drop(gate);
                res
            },
        );

        assert!(abandoned.unwrap());
        assert!(verified.is_err());
        let reg = slot.lock().await;
        assert_eq!(reg.stage(), Stage::Login);
        assert_ne!(reg.otp().phase, otp::Phase::Verified);
        assert!(reg.otp().continuation.is_none());
        assert!(svc.registry().is_empty().await);

        let err = svc
            .execute(EnterSelection { token: token() })
            .await
            .unwrap_err();
        assert_eq!(err.as_ref().kind(), ErrorKind::MissingOrInvalidToken);
    }
}
