//! [`Registration`] read model definition.

use serde::Serialize;

use crate::domain::{
    confirmation::Summary,
    otp::{self, MaskedEmail, Phase},
    registration::CatalogState,
    session, Catalog, Registration, Selection, Stage, Stoppage,
};

/// Point-in-time view of a [`Registration`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// [`session::Token`] of the [`Registration`].
    pub user_id: session::Token,

    /// Current [`Stage`].
    pub stage: Stage,

    /// OTP exchange view.
    pub otp: Otp,

    /// [`Catalog`] loading view.
    pub catalog: CatalogView,

    /// Current [`Selection`].
    pub selection: Selection,

    /// Indicator whether a submission is in flight.
    pub submitting: bool,

    /// Indicator whether submission is allowed right now.
    pub can_submit: bool,

    /// [`Summary`] of the accepted submission, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

/// OTP exchange view of a [`Snapshot`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Otp {
    /// Current [`Phase`].
    pub phase: Phase,

    /// [`otp::Status`] of the current challenge, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<otp::Status>,

    /// Serial of the current challenge, to be echoed on verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<u32>,

    /// [`MaskedEmail`] the code has been delivered to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<MaskedEmail>,

    /// Whole seconds left until a resend is allowed.
    pub cooldown_remaining: u32,

    /// Indicator whether a resend is allowed right now.
    pub can_resend: bool,

    /// Indicator whether a verification is in flight.
    pub verifying: bool,

    /// Field-level error of the last verification attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_error: Option<String>,

    /// Error of the last send attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_error: Option<String>,
}

/// [`Catalog`] loading view of a [`Snapshot`].
#[derive(Clone, Debug, Serialize)]
#[serde(
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase",
    tag = "state"
)]
pub enum CatalogView {
    /// Nothing has been requested yet.
    NotLoaded,

    /// Load is in flight.
    Loading,

    /// [`Catalog`] is loaded.
    Loaded {
        /// Loaded [`Catalog`].
        #[serde(flatten)]
        catalog: Catalog,

        /// [`Stoppage`]s selectable for the chosen shift.
        selectable: Vec<Stoppage>,
    },

    /// Load failed.
    Failed {
        /// Failure message.
        message: String,
    },
}

impl From<&Registration> for Snapshot {
    fn from(reg: &Registration) -> Self {
        let otp = reg.otp();
        let challenge = otp.challenge.as_ref();
        let selection = *reg.selection();

        Self {
            user_id: reg.token().clone(),
            stage: reg.stage(),
            otp: Otp {
                phase: otp.phase,
                status: challenge.map(|c| c.status),
                serial: challenge.map(|c| c.serial),
                destination: challenge.and_then(|c| c.destination.clone()),
                cooldown_remaining: reg.cooldown_remaining(),
                can_resend: reg.can_resend(),
                verifying: otp.verifying,
                field_error: otp.field_error.clone(),
                send_error: otp.send_error.clone(),
            },
            catalog: match reg.catalog() {
                CatalogState::NotLoaded => CatalogView::NotLoaded,
                CatalogState::Loading => CatalogView::Loading,
                CatalogState::Loaded(catalog) => CatalogView::Loaded {
                    selectable: catalog
                        .stoppages_for(selection.shift())
                        .to_vec(),
                    catalog: Catalog::clone(catalog),
                },
                CatalogState::Failed(message) => CatalogView::Failed {
                    message: message.clone(),
                },
            },
            selection,
            submitting: reg.is_submitting(),
            can_submit: reg.can_submit(),
            summary: reg.confirmed().map(|c| c.summary.clone()),
        }
    }
}

#[cfg(test)]
mod spec {
    use common::DateTime;
    use serde_json::json;

    use crate::domain::{session, Registration};

    use super::Snapshot;

    #[test]
    fn serializes_fresh_registration() {
        let reg = Registration::new(
            session::Token::new("U1").unwrap(),
            DateTime::now().coerce(),
        );

        let json = serde_json::to_value(Snapshot::from(&reg)).unwrap();

        assert_eq!(json["userId"], json!("U1"));
        assert_eq!(json["stage"], json!("LOGIN"));
        assert_eq!(json["otp"]["phase"], json!("IDLE"));
        assert_eq!(json["otp"]["cooldownRemaining"], json!(0));
        assert_eq!(json["catalog"], json!({"state": "NOT_LOADED"}));
        assert_eq!(json["selection"], json!({"shift": null, "stoppage": null}));
        assert!(json.get("summary").is_none());
    }
}
