//! Confirmation stage endpoint.

use axum::Json;
use serde::Serialize;
use service::{
    command::EnterSelection,
    domain::confirmation::Summary,
    query::{enter_confirmation, EnterConfirmation},
    Query as _,
};

use crate::{AsError, Context, Error};

/// Output of the [`enter`] endpoint.
#[derive(Debug, Serialize)]
pub struct Confirmation {
    /// [`Summary`] of the accepted registration.
    #[serde(flatten)]
    pub summary: Summary,

    /// Indicator whether the [`Summary`] has been rebuilt from the
    /// navigation query alone.
    pub resumed: bool,
}

/// Shows the accepted registration, resuming it from the navigation query if
/// needed.
///
/// # Errors
///
/// Redirects to the login if the navigation query is incomplete or the staff
/// member is unknown.
#[tracing::instrument(
    skip_all,
    fields(http.handler = "enter_confirmation", user_id = tracing::field::Empty),
)]
pub async fn enter(ctx: Context) -> Result<Json<Confirmation>, Error> {
    let navigation = ctx.navigation().await?;
    if let Some(user_id) = &navigation.user_id {
        _ = tracing::Span::current().record("user_id", user_id.as_str());
    }

    let enter_confirmation::Output { summary, resumed } = ctx
        .service()
        .execute(EnterConfirmation { navigation })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(Confirmation { summary, resumed }))
}

impl AsError for enter_confirmation::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Backend(e) => {
                Some(Error::backend(e, EnterSelection::FAILURE_MESSAGE))
            }
            Self::Redirected(r) => Some(Error::redirect(r)),
        }
    }
}

#[cfg(test)]
mod spec {
    use http::{Method, StatusCode};
    use serde_json::json;

    use crate::api::spec::{app, call};

    #[tokio::test]
    async fn redirects_incomplete_navigation_to_login() {
        let app = app();

        for uri in [
            "/confirmation?userId=U1&shift=Morning",
            "/confirmation?shift=Morning&stoppageId=3",
            "/confirmation?userId=U1&stoppageId=3",
        ] {
            let (status, location, body) =
                call(&app, Method::GET, uri, None).await;

            assert_eq!(status, StatusCode::SEE_OTHER, "{uri}");
            assert_eq!(location.as_deref(), Some("/"), "{uri}");
            assert_eq!(body["code"], json!("INVALID_NAVIGATION"), "{uri}");
        }
    }

    #[tokio::test]
    async fn resumes_from_navigation() {
        let app = app();

        let (status, _, body) = call(
            &app,
            Method::GET,
            "/confirmation?userId=U1&shift=2&stoppageId=99",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "staffName": "John Doe",
                "shiftLabel": "Evening",
                "stoppageName": "ID: 99",
                "resumed": true,
            }),
        );
    }

    #[tokio::test]
    async fn redirects_unknown_staff_to_login() {
        let app = app();

        let (status, location, body) = call(
            &app,
            Method::GET,
            "/confirmation?userId=U404&shift=Morning&stoppageId=3",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/"));
        assert_eq!(body["code"], json!("STAFF_NOT_FOUND"));
    }
}
