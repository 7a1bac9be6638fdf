//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;
pub mod task;

use std::time::Duration;

use common::{
    define_kind,
    operations::{By, Start},
};
use derive_more::{Debug, Error};
use smart_default::SmartDefault;

use domain::{stage::Redirect, Stage};
#[cfg(doc)]
use infra::Backend;
use infra::{backend, Registry};

pub use self::{command::Command, query::Query, task::Task};

/// [`Service`] configuration.
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Time a staff member waits before an OTP may be re-sent.
    #[default(Duration::from_secs(30))]
    pub otp_cooldown: Duration,

    /// Time an OTP stays verifiable after being sent.
    #[default(Duration::from_secs(5 * 60))]
    pub otp_lifetime: Duration,

    /// [`task::ExpireRegistrations`] configuration.
    pub expire_registrations: task::expire_registrations::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<B> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Backend`] of this [`Service`].
    backend: B,

    /// [`Registry`] of registrations in progress.
    registry: Registry,
}

impl<B> Service<B> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(config: Config, backend: B) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::ExpireRegistrations<Self>,
                        task::expire_registrations::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let this = Service {
            config,
            backend,
            registry: Registry::default(),
        };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn("expire_registrations", async move {
            svc.execute(Start(By::new(svc.config().expire_registrations)))
                .await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Backend`] of this [`Service`].
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns [`Registry`] of this [`Service`].
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

define_kind! {
    #[doc = "Kind of a [`Service`] error, deciding how a staff member may \
             recover from it."]
    enum ErrorKind {
        #[doc = "Session token is absent, malformed or unknown, so the \
                 registration restarts from the login."]
        MissingOrInvalidToken = 1,

        #[doc = "Registration services cannot be reached, so the same \
                 action may be retried."]
        ServiceUnavailable = 2,

        #[doc = "Request is refused locally, without reaching the \
                 registration services."]
        ValidationError = 3,

        #[doc = "Registration services refused the request, so it may be \
                 corrected on the same stage."]
        RejectedByService = 4,
    }
}

impl ErrorKind {
    /// Classifies the provided [`Redirect`].
    #[must_use]
    pub fn of_redirect(redirect: &Redirect) -> Self {
        match redirect.to {
            Stage::Login => Self::MissingOrInvalidToken,
            Stage::Selection | Stage::Confirmation => Self::ValidationError,
        }
    }

    /// Classifies the provided [`backend::Error`].
    #[must_use]
    pub fn of_backend(err: &backend::Error) -> Self {
        if err.is_rejection() {
            Self::RejectedByService
        } else {
            Self::ServiceUnavailable
        }
    }
}

#[cfg(test)]
pub(crate) mod spec {
    //! Test fixtures.

    use std::time::Duration;

    use crate::{
        infra::{InMemory, Registry},
        Config, ErrorKind, Service,
    };

    /// Creates a new [`Service`] on top of a demo [`InMemory`] backend.
    pub(crate) fn service() -> (Service<InMemory>, InMemory) {
        let backend = InMemory::demo();
        let service = Service {
            config: Config {
                otp_cooldown: Duration::from_secs(30),
                otp_lifetime: Duration::from_secs(300),
                ..Config::default()
            },
            backend: backend.clone(),
            registry: Registry::default(),
        };
        (service, backend)
    }

    #[test]
    fn defaults_config() {
        let config = Config::default();

        assert_eq!(config.otp_cooldown, Duration::from_secs(30));
        assert_eq!(config.otp_lifetime, Duration::from_secs(300));
        assert_eq!(
            config.expire_registrations.timeout,
            Duration::from_secs(30 * 60),
        );
    }

    #[test]
    fn names_error_kinds_in_screaming_snake_case() {
        assert_eq!(
            ErrorKind::ServiceUnavailable.to_string(),
            "SERVICE_UNAVAILABLE",
        );
        assert_eq!(
            "REJECTED_BY_SERVICE".parse::<ErrorKind>(),
            Ok(ErrorKind::RejectedByService),
        );
        assert_eq!(
            serde_json::to_value(ErrorKind::MissingOrInvalidToken).unwrap(),
            serde_json::json!("MISSING_OR_INVALID_TOKEN"),
        );
        assert_eq!(ErrorKind::ValidationError.u8(), 3);
    }
}
