//! [`OtpCooldown`] [`Task`].

use std::{
    convert::Infallible,
    sync::{Arc, Weak},
    time::Duration,
};

use common::operations::{By, Perform, Start};
use derive_more::{Display, Error};
use tokio::time::{interval_at, Instant};

use crate::{infra::Slot, Service};

use super::Task;

/// [`Task`] counting the OTP resend cooldown of a single registration down
/// to zero, once per second.
#[derive(Clone, Debug)]
pub struct OtpCooldown {
    /// [`Slot`] of the registration, if still alive.
    slot: Weak<Slot>,
}

impl OtpCooldown {
    /// Period of a single cooldown tick.
    pub const TICK: Duration = Duration::from_secs(1);
}

impl<B> Task<Start<By<OtpCooldown, Arc<Slot>>>> for Service<B> {
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<OtpCooldown, Arc<Slot>>>,
    ) -> Result<Self::Ok, Self::Err> {
        let slot = by.into_inner();
        let task = OtpCooldown {
            slot: Arc::downgrade(&slot),
        };

        let ticker = tokio::spawn(async move {
            let tick = OtpCooldown::TICK;
            let mut interval = interval_at(Instant::now() + tick, tick);
            loop {
                _ = interval.tick().await;
                match task.execute(Perform(())).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });
        slot.replace_ticker(ticker.abort_handle()).await;

        Ok(())
    }
}

impl Task<Perform<()>> for OtpCooldown {
    type Ok = u32;
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let slot = self.slot.upgrade().ok_or(ExecutionError)?;
        let remaining = slot.lock().await.tick_cooldown();
        Ok(remaining)
    }
}

/// Error of [`OtpCooldown`] execution: the registration is gone.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("Registration is gone")]
pub struct ExecutionError;

#[cfg(test)]
mod spec {
    use std::{sync::Arc, time::Duration};

    use common::{
        operations::{By, Start},
        DateTime,
    };

    use crate::{
        domain::{otp, session, Registration},
        infra::Slot,
        spec::service,
        Task as _,
    };

    #[tokio::test(start_paused = true)]
    async fn counts_down_once_per_second() {
        let (svc, _) = service();
        let mut reg = Registration::new(
            session::Token::new("U1").unwrap(),
            DateTime::now().coerce(),
        );
        let now = DateTime::now().coerce();
        let ticket = reg.begin_send(now).unwrap();
        let email = otp::Email::new("user@example.com").unwrap();
        drop(
            reg.complete_send(ticket, &email, now, Duration::from_secs(3))
                .unwrap(),
        );
        let slot = Arc::new(Slot::new(reg));

        svc.execute(Start(By::new(Arc::clone(&slot)))).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        for expected in [2, 1, 0, 0] {
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert_eq!(slot.lock().await.cooldown_remaining(), expected);
        }
        assert!(slot.lock().await.can_resend());
    }
}
