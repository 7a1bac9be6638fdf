//! [`ExpireRegistrations`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Perform, Start};
use smart_default::SmartDefault;
use tokio::time::interval;
use tracing as log;

#[cfg(doc)]
use crate::domain::Registration;
use crate::{domain::registration, Service};

use super::Task;

/// Configuration for [`ExpireRegistrations`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between idle [`Registration`]s checks.
    #[default(time::Duration::from_secs(60))]
    pub interval: time::Duration,

    /// Timeout after which an idle [`Registration`] is abandoned.
    #[default(time::Duration::from_secs(30 * 60))]
    pub timeout: time::Duration,
}

/// [`Task`] for tearing down [`Registration`]s abandoned by staff members.
#[derive(Clone, Copy, Debug)]
pub struct ExpireRegistrations<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<B> Task<Start<By<ExpireRegistrations<Self>, Config>>> for Service<B>
where
    ExpireRegistrations<Service<B>>:
        Task<Perform<()>, Ok = usize, Err: Error>,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<ExpireRegistrations<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = ExpireRegistrations {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::ExpireRegistrations` failed: {e}");
            });
        }
    }
}

impl<B> Task<Perform<()>> for ExpireRegistrations<Service<B>> {
    type Ok = usize;
    type Err = Infallible;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let deadline =
            registration::ActivityDateTime::now() - self.config.timeout;
        let registry = self.service.registry();

        let mut expired = Vec::new();
        for slot in registry.slots().await {
            let reg = slot.lock().await;
            if reg.last_activity() < deadline {
                expired.push(reg.token().clone());
            }
        }

        let mut count = 0;
        for token in expired {
            if registry.discard(&token).await.is_some() {
                log::info!("registration `{token}` expired");
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{operations::Perform, DateTime};

    use crate::{domain::session, spec::service, Task as _};

    use super::{Config, ExpireRegistrations};

    #[tokio::test]
    async fn tears_down_idle_registrations_only() {
        let (svc, _) = service();
        let registry = svc.registry();
        let idle = session::Token::new("U1").unwrap();
        let active = session::Token::new("U2").unwrap();
        let (slot, _) = registry
            .get_or_create(
                &idle,
                (DateTime::now() - Duration::from_secs(31 * 60)).coerce(),
            )
            .await;
        let alias = session::Token::new("17").unwrap();
        assert!(registry.alias(alias, &slot).await);
        _ = registry.get_or_create(&active, DateTime::now().coerce()).await;

        let task = ExpireRegistrations {
            config: Config::default(),
            service: svc.clone(),
        };
        let expired = task.execute(Perform(())).await.unwrap();

        assert_eq!(expired, 1);
        assert!(registry.get(&idle).await.is_none());
        assert!(registry.get(&active).await.is_some());
        assert_eq!(registry.len().await, 1);
    }
}
