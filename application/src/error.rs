//! [`Error`]-related definitions.

use std::fmt;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    response::{IntoResponse, Response},
    Json,
};
use derive_more::Error as StdError;
use itertools::Itertools as _;
use serde::Serialize;
use service::{
    domain::{
        registration::TransitionError,
        stage::{Redirect, RedirectReason},
    },
    infra::backend,
};
use tracerr::{Trace, Traced};
use tracing as log;

use crate::api;

/// Defines a new error type.
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_error {
    (
        enum $name:ident {
            $(
                #[code = $code:literal]
                #[status = $status_code:ident]
                #[message = $message:literal]
                $variant:ident
            ),* $(,)?
        }
    ) => {
        /// Error type.
        #[derive(
            Clone,
            Copy,
            Debug,
            ::derive_more::Display,
            ::derive_more::Error
        )]
        #[repr(u16)]
        pub enum $name {
            $(
                #[display($message)]
                #[doc = $message]
                $variant,
            )*
        }

        impl From<$name> for $crate::Error {
            fn from(err: $name) -> Self {
                match err {
                    $(
                        $name::$variant => Self {
                            code: $code,
                            status_code: ::http::StatusCode::$status_code,
                            message: $message.to_string(),
                            field: None,
                            location: None,
                            backtrace: None,
                        },
                    )*
                }
            }
        }
    };
}

/// HTTP API [`Error`].
#[derive(Clone, Debug, StdError)]
pub struct Error {
    /// [`Error`] code.
    pub code: Code,

    /// [`http::StatusCode`] of this [`Error`].
    pub status_code: http::StatusCode,

    /// [`Error`] message.
    pub message: String,

    /// Input field this [`Error`] relates to, if any.
    pub field: Option<String>,

    /// Location to redirect to, if any.
    pub location: Option<String>,

    /// Backtrace of this [`Error`].
    #[error(not(backtrace))]
    pub backtrace: Option<Trace>,
}

impl Error {
    /// Create a new [`Error`] representing an internal server error.
    #[must_use]
    pub fn internal(msg: &impl ToString) -> Self {
        Self {
            code: "INTERNAL_SERVER_ERROR",
            status_code: http::StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            field: None,
            location: None,
            backtrace: None,
        }
    }

    /// Creates a new [`Error`] redirecting to the [`Stage`] of the provided
    /// [`Redirect`].
    ///
    /// [`Stage`]: service::domain::Stage
    #[must_use]
    pub fn redirect(redirect: &Redirect) -> Self {
        let code = match redirect.reason {
            RedirectReason::Token(_) | RedirectReason::UnknownSession => {
                "MISSING_OR_INVALID_TOKEN"
            }
            RedirectReason::NotVerified => "NOT_VERIFIED",
            RedirectReason::AlreadyVerified => "ALREADY_VERIFIED",
            RedirectReason::AlreadyConfirmed => "ALREADY_CONFIRMED",
            RedirectReason::DeepLink(_) => "INVALID_NAVIGATION",
            RedirectReason::UnknownStaff => "STAFF_NOT_FOUND",
        };
        Self {
            code,
            status_code: http::StatusCode::SEE_OTHER,
            message: redirect.reason.to_string(),
            field: None,
            location: Some(api::location(redirect.to, &redirect.navigation)),
            backtrace: None,
        }
    }

    /// Creates a new [`Error`] out of the provided [`backend::Error`],
    /// using the `fallback` message if the registration services gave none.
    #[must_use]
    pub fn backend(err: &backend::Error, fallback: &str) -> Self {
        let message = err.message().unwrap_or(fallback).to_owned();
        match err {
            backend::Error::Rejected(r) => Self {
                field: r.field.clone(),
                message,
                ..BackendError::Rejected.into()
            },
            backend::Error::Malformed(_) | backend::Error::EmptyCatalog(_) => {
                Self {
                    message,
                    ..BackendError::Malformed.into()
                }
            }
            backend::Error::Unavailable(_) | backend::Error::Http(_) => Self {
                message,
                ..BackendError::Unavailable.into()
            },
        }
    }

    /// Creates a new [`Error`] out of the provided locally refused
    /// [`TransitionError`].
    #[must_use]
    pub fn refused(err: &TransitionError) -> Self {
        let kind = match err {
            TransitionError::SendInFlight
            | TransitionError::VerifyInFlight
            | TransitionError::SubmissionInFlight => RefusalError::InFlight,
            TransitionError::StaleCode | TransitionError::ChallengeExpired => {
                RefusalError::Otp
            }
            TransitionError::IncompleteSelection
            | TransitionError::Selection(_) => RefusalError::Selection,
            TransitionError::AlreadyVerified
            | TransitionError::NotVerified
            | TransitionError::AlreadyConfirmed
            | TransitionError::NoChallenge
            | TransitionError::CatalogNotLoaded => RefusalError::Stage,
        };
        let field = match kind {
            RefusalError::Otp => Some("otp".to_owned()),
            RefusalError::Discarded
            | RefusalError::InFlight
            | RefusalError::Selection
            | RefusalError::Stage => None,
        };
        Self {
            message: err.to_string(),
            field,
            ..kind.into()
        }
    }

    /// Creates a new [`Error`] for a result arriving after the registration
    /// moved on.
    #[must_use]
    pub fn discarded() -> Self {
        RefusalError::Discarded.into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            code,
            status_code: _,
            message,
            field: _,
            location,
            backtrace,
        } = self;

        write!(f, "[{code}]: {message}")?;
        if let Some(location) = location {
            write!(f, " -> {location}")?;
        }
        write!(
            f,
            "{}",
            backtrace
                .iter()
                .format_with("\n", |trace, f| f(&format_args!("{trace}"))),
        )
    }
}

/// JSON body of an [`Error`] response.
#[derive(Debug, Serialize)]
struct Body<'e> {
    /// [`Error`] code.
    code: Code,

    /// [`Error`] message.
    message: &'e str,

    /// Input field the [`Error`] relates to.
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'e str>,

    /// Location to go to.
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'e str>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            log::error!("{self}");
        }

        let body = Json(Body {
            code: self.code,
            message: &self.message,
            field: self.field.as_deref(),
            location: self.location.as_deref(),
        });
        match self
            .location
            .as_deref()
            .and_then(|l| http::HeaderValue::from_str(l).ok())
        {
            Some(location) => (
                self.status_code,
                [(http::header::LOCATION, location)],
                body,
            )
                .into_response(),
            None => (self.status_code, body).into_response(),
        }
    }
}

/// [`Error`] code.
pub type Code = &'static str;

/// Helper trait for converting types into [`Error`]s.
pub trait AsError {
    /// Tries to convert the type into an [`Error`].
    ///
    /// [`None`] is returned if the type cannot be converted into an [`Error`].
    fn try_as_error(&self) -> Option<Error>;

    /// Converts the type into an [`Error`].
    fn as_error(&self) -> Error
    where
        Self: fmt::Display,
    {
        self.try_as_error()
            .unwrap_or_else(|| Error::internal(&self))
    }

    /// Converts the type into an [`Error`] by consuming it.
    fn into_error(self) -> Error
    where
        Self: fmt::Display + Sized,
    {
        self.as_error()
    }
}

impl<E: AsError> AsError for Traced<E> {
    fn try_as_error(&self) -> Option<Error> {
        let mut error = self.as_ref().try_as_error()?;
        error.backtrace = Some(self.trace().clone());
        Some(error)
    }
}

impl AsError for JsonRejection {
    fn try_as_error(&self) -> Option<Error> {
        Some(Error {
            message: self.body_text(),
            ..RequestError::Body.into()
        })
    }
}

impl AsError for QueryRejection {
    fn try_as_error(&self) -> Option<Error> {
        Some(Error {
            message: self.body_text(),
            ..RequestError::Query.into()
        })
    }
}

define_error! {
    enum RequestError {
        #[code = "INVALID_BODY"]
        #[status = BAD_REQUEST]
        #[message = "Request body is invalid"]
        Body,

        #[code = "INVALID_QUERY"]
        #[status = BAD_REQUEST]
        #[message = "Request query is invalid"]
        Query,
    }
}

define_error! {
    enum BackendError {
        #[code = "REJECTED_BY_SERVICE"]
        #[status = UNPROCESSABLE_ENTITY]
        #[message = "Request is rejected by the registration services"]
        Rejected,

        #[code = "BAD_GATEWAY"]
        #[status = BAD_GATEWAY]
        #[message = "Registration services answered unexpectedly"]
        Malformed,

        #[code = "SERVICE_UNAVAILABLE"]
        #[status = SERVICE_UNAVAILABLE]
        #[message = "Registration services are unavailable"]
        Unavailable,
    }
}

define_error! {
    enum RefusalError {
        #[code = "IN_PROGRESS"]
        #[status = CONFLICT]
        #[message = "Another request is in progress"]
        InFlight,

        #[code = "DISCARDED"]
        #[status = CONFLICT]
        #[message = "Result arrived after the registration moved on"]
        Discarded,

        #[code = "INVALID_OTP"]
        #[status = BAD_REQUEST]
        #[message = "OTP cannot be verified"]
        Otp,

        #[code = "INVALID_SELECTION"]
        #[status = BAD_REQUEST]
        #[message = "Selection is invalid"]
        Selection,

        #[code = "VALIDATION_ERROR"]
        #[status = BAD_REQUEST]
        #[message = "Request is not allowed at this stage"]
        Stage,
    }
}

#[cfg(test)]
mod spec {
    use service::{
        domain::{
            registration::TransitionError,
            session,
            stage::{Navigation, Redirect, RedirectReason},
        },
        infra::backend::{self, Rejection},
    };

    use super::Error;

    #[test]
    fn redirects_to_login_on_missing_token() {
        let err = Error::redirect(&Redirect::login(RedirectReason::Token(
            session::ResolveError::Missing,
        )));

        assert_eq!(err.status_code, http::StatusCode::SEE_OTHER);
        assert_eq!(err.code, "MISSING_OR_INVALID_TOKEN");
        assert_eq!(err.location.as_deref(), Some("/"));
    }

    #[test]
    fn redirects_to_confirmation_with_navigation() {
        let err = Error::redirect(&Redirect::confirmation(Navigation {
            user_id: Some("U1".into()),
            shift: Some("Morning Shift".into()),
            stoppage_id: Some("3".into()),
        }));

        assert_eq!(err.code, "ALREADY_CONFIRMED");
        assert_eq!(
            err.location.as_deref(),
            Some("/confirmation?userId=U1&shift=Morning+Shift&stoppageId=3"),
        );
    }

    #[test]
    fn surfaces_rejection_message_and_field() {
        let err = Error::backend(
            &backend::Error::Rejected(Rejection {
                status: Some(400),
                message: Some("Shift is full".into()),
                field: Some("shift".into()),
            }),
            "fallback",
        );

        assert_eq!(err.status_code, http::StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.message, "Shift is full");
        assert_eq!(err.field.as_deref(), Some("shift"));

        let err = Error::backend(
            &backend::Error::Unavailable("connection refused".into()),
            "fallback",
        );

        assert_eq!(err.status_code, http::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.message, "fallback");
    }

    #[test]
    fn classifies_refusals() {
        let err = Error::refused(&TransitionError::SubmissionInFlight);
        assert_eq!(err.status_code, http::StatusCode::CONFLICT);

        let err = Error::refused(&TransitionError::StaleCode);
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "INVALID_OTP");
        assert_eq!(err.field.as_deref(), Some("otp"));

        let err = Error::refused(&TransitionError::VerifyInFlight);
        assert_eq!(err.code, "IN_PROGRESS");
        assert_eq!(err.field, None);
    }

    #[test]
    fn reports_discarded_results_as_conflict() {
        let err = Error::discarded();

        assert_eq!(err.status_code, http::StatusCode::CONFLICT);
        assert_eq!(err.code, "DISCARDED");
        assert_eq!(err.field, None);
        assert_eq!(err.location, None);
    }
}
