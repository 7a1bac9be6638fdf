//! Login stage endpoints: OTP exchange.

use axum::{extract::rejection::JsonRejection, Json};
use serde::{Deserialize, Serialize};
use service::{
    command::{
        self, send_otp, start_registration, verify_otp, AbandonRegistration,
        ResendOtp, StartRegistration, VerifyOtp,
    },
    domain::{
        session,
        stage::{Redirect, RedirectReason},
        Stage,
    },
    read, Command as _,
};

use crate::{api, define_error, AsError, Context, Error};

/// Answers a registration link lacking its token.
#[expect(
    clippy::unused_async,
    reason = "`async` is required to match signature"
)]
pub async fn missing_token() -> Error {
    Error::redirect(&Redirect::login(RedirectReason::Token(
        session::ResolveError::Missing,
    )))
}

/// Starts (or resumes) the registration, sending an OTP on the first
/// arrival.
///
/// # Errors
///
/// Redirects away if the registration is past the login.
#[tracing::instrument(
    skip_all,
    fields(http.handler = "start", user_id = tracing::field::Empty),
)]
pub async fn start(ctx: Context) -> Result<Json<read::Snapshot>, Error> {
    let token = ctx.token().await?;

    ctx.service()
        .execute(StartRegistration { token })
        .await
        .map(Json)
        .map_err(AsError::into_error)
}

/// Output of the [`resend`] endpoint.
#[derive(Debug, Serialize)]
pub struct Resent {
    /// Indicator whether an OTP has actually been re-sent.
    pub resent: bool,

    /// Registration after the attempt.
    pub registration: read::Snapshot,
}

/// Re-sends the OTP once the cooldown is over.
///
/// # Errors
///
/// Possible error codes:
/// - `REJECTED_BY_SERVICE` - the registration services refused to send;
/// - `SERVICE_UNAVAILABLE` - the registration services cannot be reached.
#[tracing::instrument(
    skip_all,
    fields(http.handler = "resend", user_id = tracing::field::Empty),
)]
pub async fn resend(ctx: Context) -> Result<Json<Resent>, Error> {
    let token = ctx.token().await?;

    let command::resend_otp::Output {
        resent,
        registration,
    } = ctx
        .service()
        .execute(ResendOtp { token })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(Resent {
        resent,
        registration,
    }))
}

/// Body of the [`verify`] endpoint.
#[derive(Debug, Deserialize)]
pub struct Code {
    /// Code typed by the staff member.
    pub otp: String,

    /// Serial of the challenge the code was typed against.
    #[serde(default)]
    pub serial: Option<u32>,
}

/// Verifies the typed OTP and moves the registration to the selection.
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_OTP` - the code is malformed, stale, expired or rejected;
/// - `IN_PROGRESS` - another send or verification is in flight;
/// - `SERVICE_UNAVAILABLE` - the registration services cannot be reached.
#[tracing::instrument(
    skip_all,
    fields(http.handler = "verify", user_id = tracing::field::Empty),
)]
pub async fn verify(
    ctx: Context,
    body: Result<Json<Code>, JsonRejection>,
) -> Result<Json<api::Next>, Error> {
    let token = ctx.token().await?;
    let Json(Code { otp, serial }) = body.map_err(AsError::into_error)?;

    let verify_otp::Output {
        continuation,
        navigation,
        registration,
    } = ctx
        .service()
        .execute(VerifyOtp {
            token,
            code: otp,
            serial,
        })
        .await
        .map_err(AsError::into_error)?;

    tracing::debug!("verified, continuing as `{continuation}`");
    Ok(Json(api::Next {
        location: api::location(Stage::Selection, &navigation),
        summary: None,
        registration,
    }))
}

/// Output of the [`abandon`] endpoint.
#[derive(Debug, Serialize)]
pub struct Abandoned {
    /// Indicator whether a registration was in progress.
    pub abandoned: bool,
}

/// Tears the registration down.
///
/// # Errors
///
/// Redirects to the login if the token is missing or malformed.
#[tracing::instrument(
    skip_all,
    fields(http.handler = "abandon", user_id = tracing::field::Empty),
)]
pub async fn abandon(ctx: Context) -> Result<Json<Abandoned>, Error> {
    let token = ctx.token().await?;

    let abandoned = ctx
        .service()
        .execute(AbandonRegistration { token })
        .await
        .unwrap_or_else(|e| match e {});

    Ok(Json(Abandoned { abandoned }))
}

define_error! {
    enum OtpError {
        #[code = "INVALID_OTP"]
        #[status = BAD_REQUEST]
        #[message = "OTP must be 6 digits"]
        Malformed,

        #[code = "INVALID_OTP"]
        #[status = UNPROCESSABLE_ENTITY]
        #[message = "The OTP you entered is invalid or has expired."]
        Rejected,
    }
}

impl AsError for start_registration::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Redirected(r) => Some(Error::redirect(r)),
        }
    }
}

impl AsError for send_otp::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Backend(e) => {
                Some(Error::backend(e, command::SendOtp::FAILURE_MESSAGE))
            }
            Self::Discarded(_) => Some(Error::discarded()),
            Self::Redirected(r) => Some(Error::redirect(r)),
            Self::Refused(e) => Some(Error::refused(e)),
        }
    }
}

impl AsError for verify_otp::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        let with_field = |err: Error| Error {
            field: Some("otp".to_owned()),
            ..err
        };
        match self {
            Self::Backend(e) if e.is_rejection() => {
                Some(with_field(OtpError::Rejected.into()))
            }
            Self::Backend(e) => Some(Error::backend(
                e,
                "Failed to verify OTP. Please try again.",
            )),
            Self::Discarded(_) => Some(Error::discarded()),
            Self::InvalidCode => Some(with_field(OtpError::Malformed.into())),
            Self::Redirected(r) => Some(Error::redirect(r)),
            Self::Refused(e) => Some(Error::refused(e)),
        }
    }
}

#[cfg(test)]
mod spec {
    use http::{Method, StatusCode};
    use serde_json::json;

    use crate::api::spec::{app, call};

    #[tokio::test]
    async fn redirects_missing_token_to_root() {
        let app = app();

        let (status, location, _) =
            call(&app, Method::GET, "/register", None).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/"));

        let (status, location, body) =
            call(&app, Method::GET, "/register/bad%20token", None).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/"));
        assert_eq!(body["code"], json!("MISSING_OR_INVALID_TOKEN"));
    }

    #[tokio::test]
    async fn sends_otp_on_arrival() {
        let app = app();

        let (status, _, body) =
            call(&app, Method::GET, "/register/U1", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"], json!("LOGIN"));
        assert_eq!(body["otp"]["phase"], json!("AWAITING_CODE"));
        assert_eq!(body["otp"]["canResend"], json!(false));

        let (status, _, body) =
            call(&app, Method::POST, "/register/U1/resend", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["resent"], json!(false));
    }

    #[tokio::test]
    async fn rejects_wrong_code_on_the_otp_field() {
        let app = app();
        _ = call(&app, Method::GET, "/register/U1", None).await;

        let (status, _, body) = call(
            &app,
            Method::POST,
            "/register/U1/verify",
            Some(json!({"otp": "12ab56"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], json!("otp"));

        let (status, _, body) = call(
            &app,
            Method::POST,
            "/register/U1/verify",
            Some(json!({"otp": "000000"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], json!("INVALID_OTP"));
        assert_eq!(
            body["message"],
            json!("The OTP you entered is invalid or has expired."),
        );
    }

    #[tokio::test]
    async fn moves_to_selection_on_valid_code() {
        let app = app();
        _ = call(&app, Method::GET, "/register/U1", None).await;

        let (status, _, body) = call(
            &app,
            Method::POST,
            "/register/U1/verify",
            Some(json!({"otp": "123456", "serial": 1})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["location"], json!("/selection?userId=U1"));
        assert_eq!(body["registration"]["stage"], json!("SELECTION"));

        let (status, location, _) =
            call(&app, Method::GET, "/register/U1", None).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/selection?userId=U1"));
    }

    #[tokio::test]
    async fn abandons_registration() {
        let app = app();
        _ = call(&app, Method::GET, "/register/U1", None).await;

        let (_, _, body) =
            call(&app, Method::DELETE, "/register/U1", None).await;
        assert_eq!(body["abandoned"], json!(true));

        let (_, _, body) =
            call(&app, Method::DELETE, "/register/U1", None).await;
        assert_eq!(body["abandoned"], json!(false));
    }
}
