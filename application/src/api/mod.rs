//! HTTP API definitions.

pub mod confirmation;
pub mod login;
pub mod selection;

use axum::{
    routing::{get, post, put},
    Extension, Router,
};
use serde::Serialize;
use service::{
    domain::{confirmation::Summary, stage::Navigation, Stage},
    read,
};
use url::form_urlencoded;

use crate::Service;

/// Creates a new [`Router`] serving the HTTP API on top of the provided
/// [`Service`].
pub fn router(service: Service) -> Router {
    Router::new()
        .route("/register", get(login::missing_token))
        .route(
            "/register/:user_id",
            get(login::start).delete(login::abandon),
        )
        .route("/register/:user_id/resend", post(login::resend))
        .route("/register/:user_id/verify", post(login::verify))
        .route(
            "/selection",
            get(selection::enter).delete(selection::reset),
        )
        .route("/selection/reload", post(selection::reload))
        .route("/selection/shift", put(selection::shift))
        .route("/selection/shift-hint", put(selection::shift_hint))
        .route("/selection/stoppage", put(selection::stoppage))
        .route("/selection/submit", post(selection::submit))
        .route("/confirmation", get(confirmation::enter))
        .layer(Extension(service))
}

/// Returns the location of the provided [`Stage`] entered with the provided
/// [`Navigation`].
#[must_use]
pub fn location(stage: Stage, navigation: &Navigation) -> String {
    let path = match stage {
        Stage::Login => return "/".to_owned(),
        Stage::Selection => "/selection",
        Stage::Confirmation => "/confirmation",
    };

    let mut query = form_urlencoded::Serializer::new(String::new());
    let params = [
        ("userId", &navigation.user_id),
        ("shift", &navigation.shift),
        ("stoppageId", &navigation.stoppage_id),
    ];
    for (key, value) in params {
        if let Some(value) = value {
            _ = query.append_pair(key, value);
        }
    }
    let query = query.finish();

    if query.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{query}")
    }
}

/// Result of a step moving the registration to the next [`Stage`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Next {
    /// Location of the next [`Stage`].
    pub location: String,

    /// [`Summary`] of the accepted registration, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,

    /// Registration after the step.
    pub registration: read::Snapshot,
}
