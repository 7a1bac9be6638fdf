//! HTTP [`Backend`] implementation.

use common::operations::{By, Issue, Select, Submit, Verify};
use reqwest::StatusCode;
use secrecy::ExposeSecret as _;
use tracerr::Traced;
use tracing as log;
use url::Url;

use crate::domain::{otp, session, Catalog};

use super::{
    payload::{self, Failure},
    Attempt, Backend, Choice, Error,
};

/// [`Backend`] talking to the registration services over HTTP.
#[derive(Clone, Debug)]
pub struct Http {
    /// Underlying HTTP client.
    client: reqwest::Client,

    /// Base [`Url`] of the registration services.
    base: Url,
}

impl Http {
    /// Default base [`Url`] of the registration services.
    pub const DEFAULT_URL: &'static str = "https://glatrnp.in/transport";

    /// Creates a new [`Http`] backend with the provided base [`Url`].
    ///
    /// # Errors
    ///
    /// If the provided [`Url`] cannot have paths appended, or the HTTP client
    /// fails to initialize.
    pub fn new(base: Url) -> Result<Self, Traced<Error>> {
        if base.cannot_be_a_base() {
            return Err(tracerr::new!(Error::Malformed(format!(
                "`{base}` cannot be a base URL",
            ))));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("transport-pass/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(tracerr::from_and_wrap!())?;
        Ok(Self { client, base })
    }

    /// Returns the endpoint [`Url`] under the base one, with a trailing
    /// slash.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, Traced<Error>> {
        let mut url = self.base.clone();
        _ = url
            .path_segments_mut()
            .map_err(|()| {
                tracerr::new!(Error::Malformed(format!(
                    "`{}` cannot be a base URL",
                    self.base,
                )))
            })?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    /// Sends the provided request, turning non-successful answers into
    /// [`Error::Rejected`], or into [`Error::Unavailable`] when the
    /// registration services are failing rather than refusing.
    async fn send(
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, Traced<Error>> {
        let response = request.send().await.map_err(|e| {
            tracerr::new!(if e.is_connect() || e.is_timeout() {
                Error::Unavailable(e.to_string())
            } else {
                Error::Http(e)
            })
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let failure =
            serde_json::from_slice::<Failure>(&body).unwrap_or_default();
        log::debug!(
            "registration services answered `{status}`: {:?}",
            failure.message,
        );
        if Self::is_outage(status) {
            return Err(tracerr::new!(Error::Unavailable(format!(
                "`{status}`: {}",
                failure.message.as_deref().unwrap_or("no details"),
            ))));
        }
        Err(tracerr::new!(Error::Rejected(
            failure.into_rejection(Some(status.as_u16())),
        )))
    }

    /// Indicates whether the provided non-successful `status` means the
    /// request may succeed if retried as is.
    fn is_outage(status: StatusCode) -> bool {
        status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
    }
}

impl Backend<Issue<By<otp::Email, session::Token>>> for Http {
    type Ok = otp::Email;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Issue(by): Issue<By<otp::Email, session::Token>>,
    ) -> Result<Self::Ok, Self::Err> {
        let token = by.into_inner();
        let url = self.endpoint(&["registration", token.as_ref()])?;

        let sent = Self::send(self.client.get(url))
            .await?
            .json::<payload::OtpSent>()
            .await
            .map_err(tracerr::from_and_wrap!())?;
        otp::Email::try_from(sent).map_err(tracerr::wrap!())
    }
}

impl Backend<Verify<By<session::Token, Attempt>>> for Http {
    type Ok = session::Token;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Verify(by): Verify<By<session::Token, Attempt>>,
    ) -> Result<Self::Ok, Self::Err> {
        let Attempt { token, code } = by.into_inner();
        let url =
            self.endpoint(&["registration", token.as_ref(), "verify"])?;

        let body = Self::send(self.client.post(url).json(
            &payload::VerifyRequest {
                otp: code.expose_secret().as_ref(),
            },
        ))
        .await?
        .bytes()
        .await
        .map_err(tracerr::from_and_wrap!())?;

        let verified = if body.iter().all(u8::is_ascii_whitespace) {
            payload::OtpVerified::default()
        } else {
            serde_json::from_slice(&body).map_err(|e| {
                tracerr::new!(Error::Malformed(e.to_string()))
            })?
        };
        Ok(verified.continuation(&token))
    }
}

impl Backend<Select<By<Option<Catalog>, session::Token>>> for Http {
    type Ok = Option<Catalog>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Catalog>, session::Token>>,
    ) -> Result<Self::Ok, Self::Err> {
        let token = by.into_inner();
        let url = self.endpoint(&["metadata"])?;

        let response = match Self::send(self.client.post(url).json(
            &payload::MetadataRequest {
                suggestion_id: token.as_ref(),
            },
        ))
        .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return match e.as_ref() {
                    Error::Rejected(r)
                        if r.status == Some(StatusCode::NOT_FOUND.as_u16()) =>
                    {
                        Ok(None)
                    }
                    _ => Err(e),
                };
            }
        };

        let metadata = response
            .json::<payload::Metadata>()
            .await
            .map_err(tracerr::from_and_wrap!())?;
        Catalog::try_from(metadata)
            .map(Some)
            .map_err(tracerr::wrap!())
    }
}

impl Backend<Submit<Choice>> for Http {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Submit(choice): Submit<Choice>,
    ) -> Result<Self::Ok, Self::Err> {
        let url = self.endpoint(&[
            "registration",
            choice.token.as_ref(),
            "submit",
        ])?;

        drop(
            Self::send(self.client.post(url).json(&payload::SubmitRequest {
                shift: choice.shift,
                location: choice.stoppage,
            }))
            .await?,
        );
        Ok(())
    }
}
