//! [`Context`]-related definitions.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query, RawPathParams},
    RequestPartsExt as _,
};
use service::domain::{
    session,
    stage::{Navigation, Redirect, RedirectReason},
};

use crate::{AsError as _, Error, Service};

/// Request context of a registration step.
#[derive(Debug)]
pub struct Context {
    /// [`Service`] instance.
    service: Service,

    /// Parts of the HTTP request.
    parts: http::request::Parts,
}

impl Context {
    /// Returns [`Service`] instance of this [`Context`].
    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Returns the [`Navigation`] query of the HTTP request.
    ///
    /// # Errors
    ///
    /// Errors if the query cannot be parsed.
    pub async fn navigation(&self) -> Result<Navigation, Error> {
        self.parts
            .clone()
            .extract::<Query<Navigation>>()
            .await
            .map(|Query(nav)| nav)
            .map_err(|e| e.into_error())
    }

    /// Resolves the [`session::Token`] of the HTTP request, taken either from
    /// the `user_id` path segment or from the `userId` query parameter.
    ///
    /// Records the resolved token as `user_id` of the current span.
    ///
    /// # Errors
    ///
    /// Redirects to the login if the token is missing or malformed.
    pub async fn token(&self) -> Result<session::Token, Error> {
        let from_path = self
            .parts
            .clone()
            .extract::<RawPathParams>()
            .await
            .ok()
            .and_then(|params| {
                params
                    .iter()
                    .find(|(key, _)| *key == "user_id")
                    .map(|(_, value)| value.to_owned())
            });
        let raw = match from_path {
            Some(raw) => Some(raw),
            None => self.navigation().await?.user_id,
        };

        let token = session::Token::resolve(raw.as_deref()).map_err(|e| {
            Error::redirect(&Redirect::login(RedirectReason::Token(e)))
        })?;
        _ = tracing::Span::current()
            .record("user_id", tracing::field::display(&token));
        Ok(token)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let service = parts
            .extensions
            .get::<Service>()
            .cloned()
            .ok_or_else(|| Error::internal(&"missing `Service` extension"))?;

        Ok(Self {
            service,
            parts: parts.clone(),
        })
    }
}
