//! Selection stage endpoints: catalog loading, shift and stoppage choice,
//! submission.

use axum::{extract::rejection::JsonRejection, Json};
use serde::Deserialize;
use service::{
    command::{
        enter_selection, submit_selection, update_selection, EnterSelection,
        ReloadCatalog, SubmitSelection, UpdateSelection,
    },
    domain::{registration::Change, shift, stoppage, Stage},
    read, Command as _,
};

use crate::{api, define_error, AsError, Context, Error};

/// Enters the selection, loading the catalog on the first arrival.
///
/// # Errors
///
/// Possible error codes:
/// - `STAFF_NOT_FOUND` - the registration services don't know the staff
///                       member;
/// - `SERVICE_UNAVAILABLE` - the registration services cannot be reached.
#[tracing::instrument(
    skip_all,
    fields(http.handler = "enter_selection", user_id = tracing::field::Empty),
)]
pub async fn enter(ctx: Context) -> Result<Json<read::Snapshot>, Error> {
    let token = ctx.token().await?;

    ctx.service()
        .execute(EnterSelection { token })
        .await
        .map(Json)
        .map_err(AsError::into_error)
}

/// Retries loading the catalog after a failure.
///
/// # Errors
///
/// Same as [`enter`].
#[tracing::instrument(
    skip_all,
    fields(http.handler = "reload_catalog", user_id = tracing::field::Empty),
)]
pub async fn reload(ctx: Context) -> Result<Json<read::Snapshot>, Error> {
    let token = ctx.token().await?;

    ctx.service()
        .execute(ReloadCatalog { token })
        .await
        .map(Json)
        .map_err(AsError::into_error)
}

/// Body choosing a catalog entry by its ID.
#[derive(Debug, Deserialize)]
pub struct Choose<Id> {
    /// ID of the entry to choose.
    pub id: Id,
}

/// Body choosing a shift by a suggested name.
#[derive(Debug, Deserialize)]
pub struct Hint {
    /// Suggested shift name.
    pub hint: String,
}

/// Chooses a shift.
///
/// # Errors
///
/// With `INVALID_SELECTION` if the shift is not in the catalog.
#[tracing::instrument(
    skip_all,
    fields(http.handler = "select_shift", user_id = tracing::field::Empty),
)]
pub async fn shift(
    ctx: Context,
    body: Result<Json<Choose<shift::Id>>, JsonRejection>,
) -> Result<Json<read::Snapshot>, Error> {
    let Json(Choose { id }) = body.map_err(AsError::into_error)?;
    change(&ctx, Change::Shift(id)).await
}

/// Chooses the first shift matching a suggested name.
///
/// # Errors
///
/// With `INVALID_SELECTION` if no shift matches.
#[tracing::instrument(
    skip_all,
    fields(http.handler = "hint_shift", user_id = tracing::field::Empty),
)]
pub async fn shift_hint(
    ctx: Context,
    body: Result<Json<Hint>, JsonRejection>,
) -> Result<Json<read::Snapshot>, Error> {
    let Json(Hint { hint }) = body.map_err(AsError::into_error)?;
    change(&ctx, Change::ShiftHint(hint)).await
}

/// Chooses a stoppage.
///
/// # Errors
///
/// With `INVALID_SELECTION` if the stoppage is not offered for the chosen
/// shift.
#[tracing::instrument(
    skip_all,
    fields(http.handler = "select_stoppage", user_id = tracing::field::Empty),
)]
pub async fn stoppage(
    ctx: Context,
    body: Result<Json<Choose<stoppage::Id>>, JsonRejection>,
) -> Result<Json<read::Snapshot>, Error> {
    let Json(Choose { id }) = body.map_err(AsError::into_error)?;
    change(&ctx, Change::Stoppage(id)).await
}

/// Forgets both choices.
///
/// # Errors
///
/// Redirects away if the registration is not at the selection.
#[tracing::instrument(
    skip_all,
    fields(http.handler = "reset_selection", user_id = tracing::field::Empty),
)]
pub async fn reset(ctx: Context) -> Result<Json<read::Snapshot>, Error> {
    change(&ctx, Change::Reset).await
}

/// Applies the provided [`Change`] to the selection.
async fn change(
    ctx: &Context,
    change: Change,
) -> Result<Json<read::Snapshot>, Error> {
    let token = ctx.token().await?;

    ctx.service()
        .execute(UpdateSelection { token, change })
        .await
        .map(Json)
        .map_err(AsError::into_error)
}

/// Submits the selection and moves the registration to the confirmation.
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_SELECTION` - a shift or a stoppage is not chosen;
/// - `IN_PROGRESS` - another submission is in flight;
/// - `REJECTED_BY_SERVICE` - the registration services refused the choice;
/// - `SERVICE_UNAVAILABLE` - the registration services cannot be reached.
#[tracing::instrument(
    skip_all,
    fields(http.handler = "submit", user_id = tracing::field::Empty),
)]
pub async fn submit(ctx: Context) -> Result<Json<api::Next>, Error> {
    let token = ctx.token().await?;

    let submit_selection::Output {
        summary,
        navigation,
        registration,
    } = ctx
        .service()
        .execute(SubmitSelection { token })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(api::Next {
        location: api::location(Stage::Confirmation, &navigation),
        summary: Some(summary),
        registration,
    }))
}

define_error! {
    enum CatalogError {
        #[code = "STAFF_NOT_FOUND"]
        #[status = UNPROCESSABLE_ENTITY]
        #[message = "Staff member is not found"]
        StaffNotFound,
    }
}

impl AsError for enter_selection::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Backend(e) => {
                Some(Error::backend(e, EnterSelection::FAILURE_MESSAGE))
            }
            Self::Discarded(_) => Some(Error::discarded()),
            Self::Redirected(r) => Some(Error::redirect(r)),
            Self::Refused(e) => Some(Error::refused(e)),
            Self::StaffNotFound => Some(CatalogError::StaffNotFound.into()),
        }
    }
}

impl AsError for update_selection::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Redirected(r) => Some(Error::redirect(r)),
            Self::Refused(e) => Some(Error::refused(e)),
        }
    }
}

impl AsError for submit_selection::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Backend(e) => {
                Some(Error::backend(e, SubmitSelection::FAILURE_MESSAGE))
            }
            Self::Discarded(_) => Some(Error::discarded()),
            Self::Redirected(r) => Some(Error::redirect(r)),
            Self::Refused(e) => Some(Error::refused(e)),
        }
    }
}

#[cfg(test)]
mod spec {
    use axum::Router;
    use http::{Method, StatusCode};
    use serde_json::json;

    use crate::api::spec::{app, call};

    async fn verified(app: &Router) {
        _ = call(app, Method::GET, "/register/U1", None).await;
        let (status, _, _) = call(
            app,
            Method::POST,
            "/register/U1/verify",
            Some(json!({"otp": "123456"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn redirects_unverified_to_login() {
        let app = app();
        _ = call(&app, Method::GET, "/register/U1", None).await;

        let (status, location, body) =
            call(&app, Method::GET, "/selection?userId=U1", None).await;

        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/"));
        assert_eq!(body["code"], json!("NOT_VERIFIED"));

        let (status, location, _) =
            call(&app, Method::GET, "/selection", None).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn registers_a_seat() {
        let app = app();
        verified(&app).await;

        let (status, _, body) =
            call(&app, Method::GET, "/selection?userId=U1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["catalog"]["state"], json!("LOADED"));
        assert_eq!(body["canSubmit"], json!(false));

        for (path, id) in [("shift", 1), ("stoppage", 3)] {
            let (status, _, _) = call(
                &app,
                Method::PUT,
                &format!("/selection/{path}?userId=U1"),
                Some(json!({"id": id})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, _, body) =
            call(&app, Method::POST, "/selection/submit?userId=U1", None)
                .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["location"],
            json!("/confirmation?userId=U1&shift=Morning&stoppageId=3"),
        );
        assert_eq!(
            body["summary"],
            json!({
                "staffName": "John Doe",
                "shiftLabel": "Morning",
                "stoppageName": "Akabar Pur",
            }),
        );
    }

    #[tokio::test]
    async fn refuses_incomplete_submission() {
        let app = app();
        verified(&app).await;
        _ = call(&app, Method::GET, "/selection?userId=U1", None).await;

        let (status, _, body) = call(
            &app,
            Method::PUT,
            "/selection/shift-hint?userId=U1",
            Some(json!({"hint": "even"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selection"]["shift"], json!(2));

        let (status, _, body) =
            call(&app, Method::POST, "/selection/submit?userId=U1", None)
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("INVALID_SELECTION"));
    }

    #[tokio::test]
    async fn rejects_unknown_shift() {
        let app = app();
        verified(&app).await;
        _ = call(&app, Method::GET, "/selection?userId=U1", None).await;

        let (status, _, body) = call(
            &app,
            Method::PUT,
            "/selection/shift?userId=U1",
            Some(json!({"id": 42})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("INVALID_SELECTION"));

        let (status, _, body) = call(
            &app,
            Method::PUT,
            "/selection/shift?userId=U1",
            Some(json!({"id": "morning"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("INVALID_BODY"));
    }
}
