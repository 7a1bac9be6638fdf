//! Registration session [`Token`] definitions.

use std::{str::FromStr, sync::LazyLock};

use derive_more::{AsRef, Display, Error};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Opaque token identifying a registration session.
///
/// Bound once at entry (from the registration link), never changed
/// afterwards.
#[derive(
    AsRef, Clone, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[as_ref(str)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
    /// Creates a new [`Token`] if the given `token` is well-formed.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        Self::check(&token).then_some(Self(token))
    }

    /// Resolves a raw `token` taken from a link or a navigation query.
    ///
    /// # Errors
    ///
    /// Fails closed if the `token` is absent, empty or malformed.
    pub fn resolve(token: Option<&str>) -> Result<Self, ResolveError> {
        match token {
            None | Some("") => Err(ResolveError::Missing),
            Some(t) => Self::new(t).ok_or(ResolveError::Malformed),
        }
    }

    /// Checks whether the given `token` is a valid [`Token`].
    fn check(token: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Token`] invariants:
        /// - Must start with an alphanumeric character;
        /// - Must contain only alphanumerics, `-` and `_`;
        /// - Must be between 1 and 128 characters long.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,127}$")
                .expect("valid regex")
        });

        REGEX.is_match(token.as_ref())
    }
}

impl FromStr for Token {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(Some(s))
    }
}

impl TryFrom<String> for Token {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(ResolveError::Missing);
        }
        Self::new(value).ok_or(ResolveError::Malformed)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

/// Error of resolving a [`Token`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
pub enum ResolveError {
    /// [`Token`] is absent or empty.
    #[display("Session token is missing")]
    Missing,

    /// [`Token`] doesn't match the expected shape.
    #[display("Session token is malformed")]
    Malformed,
}

#[cfg(test)]
mod spec {
    use super::{ResolveError, Token};

    #[test]
    fn resolves_well_formed_tokens() {
        for raw in ["U1", "729dcec1-d2d5-4400-9eb9-b68d160a56d8", "a_b"] {
            assert_eq!(
                Token::resolve(Some(raw)).map(String::from).as_deref(),
                Ok(raw),
            );
        }
    }

    #[test]
    fn fails_closed_on_missing_tokens() {
        assert_eq!(Token::resolve(None), Err(ResolveError::Missing));
        assert_eq!(Token::resolve(Some("")), Err(ResolveError::Missing));
    }

    #[test]
    fn fails_closed_on_malformed_tokens() {
        for raw in [" ", " U1", "U1 ", "-U1", "U/1", "U1?x=1", "ü1"] {
            assert_eq!(
                Token::resolve(Some(raw)),
                Err(ResolveError::Malformed),
                "{raw:?}",
            );
        }
        assert_eq!(
            Token::resolve(Some(&"a".repeat(129))),
            Err(ResolveError::Malformed),
        );
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<Token>(r#""U1""#).is_ok());
        assert!(serde_json::from_str::<Token>(r#""""#).is_err());
        assert!(serde_json::from_str::<Token>(r#""U 1""#).is_err());
    }
}
