//! [`Backend`]-related implementations.

#[cfg(feature = "http")]
pub mod http;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod payload;

use derive_more::{Display, Error as StdError, From};
use secrecy::SecretBox;

use crate::domain::{catalog::EmptyCatalogError, otp, session, shift, stoppage};

#[cfg(feature = "http")]
pub use self::http::Http;
#[cfg(any(test, feature = "memory"))]
pub use self::memory::InMemory;

/// Registration services operation.
///
/// Implemented for:
/// - `Issue<By<otp::Email, session::Token>>`: sends an OTP, returning the
///   address it was delivered to;
/// - `Verify<By<session::Token, Attempt>>`: verifies an OTP, returning the
///   continuation [`session::Token`];
/// - `Select<By<Option<Catalog>, session::Token>>`: fetches the [`Catalog`]
///   of a staff member, if any;
/// - `Submit<Choice>`: submits the chosen shift and stoppage.
///
/// [`Catalog`]: crate::domain::Catalog
pub use common::Handler as Backend;

/// OTP verification attempt.
#[derive(Debug)]
pub struct Attempt {
    /// [`session::Token`] the OTP has been sent for.
    pub token: session::Token,

    /// Typed [`otp::Code`].
    pub code: SecretBox<otp::Code>,
}

/// Shift and stoppage chosen by a staff member.
#[derive(Clone, Debug)]
pub struct Choice {
    /// [`session::Token`] of the registration.
    pub token: session::Token,

    /// Chosen [`shift::Id`].
    pub shift: shift::Id,

    /// Chosen [`stoppage::Id`].
    pub stoppage: stoppage::Id,
}

/// [`Backend`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// Request has been answered with a non-successful status.
    #[display("Request rejected: {_0}")]
    Rejected(Rejection),

    /// Response is not understood.
    #[display("Malformed response: {_0}")]
    #[from(ignore)]
    Malformed(#[error(not(source))] String),

    /// Fetched [`Catalog`] offers nothing to choose from.
    ///
    /// [`Catalog`]: crate::domain::Catalog
    #[display("Empty catalog: {_0}")]
    EmptyCatalog(EmptyCatalogError),

    /// Registration services cannot be reached.
    #[display("Service unavailable: {_0}")]
    #[from(ignore)]
    Unavailable(#[error(not(source))] String),

    #[cfg(feature = "http")]
    /// HTTP transport error.
    #[display("HTTP request failed: {_0}")]
    Http(reqwest::Error),
}

impl Error {
    /// Returns the message to show to a staff member, if the registration
    /// services provided one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Rejected(r) => r.message.as_deref(),
            Self::Malformed(_)
            | Self::EmptyCatalog(_)
            | Self::Unavailable(_) => None,
            #[cfg(feature = "http")]
            Self::Http(_) => None,
        }
    }

    /// Indicates whether this [`Error`] is a rejection rather than an
    /// availability failure.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Non-successful answer of the registration services.
#[derive(Clone, Debug, Default, Display, Eq, PartialEq, StdError)]
#[display("{}", message.as_deref().unwrap_or("no details"))]
pub struct Rejection {
    /// HTTP status code, if any.
    pub status: Option<u16>,

    /// First message provided by the registration services, if any.
    pub message: Option<String>,

    /// Field the `message` relates to, if any.
    pub field: Option<String>,
}

impl Rejection {
    /// Creates a new [`Rejection`] carrying the provided `message`.
    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}
