//! Registration [`Stage`]s and the navigation contract between them.

use common::define_kind;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

use super::{session, shift, stoppage, Catalog, Shift};

define_kind! {
    #[doc = "Coarse-grained phase of a registration session."]
    enum Stage {
        #[doc = "Identity verification by OTP."]
        Login = 1,

        #[doc = "Shift and stoppage selection."]
        Selection = 2,

        #[doc = "Registration accepted."]
        Confirmation = 3,
    }
}

/// Navigation query carried between [`Stage`]s.
///
/// The only state that survives a page reload: losing it forces a restart
/// from [`Stage::Login`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    /// Raw [`session::Token`] of the registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Submitted shift, either its label or its ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift: Option<String>,

    /// Submitted [`stoppage::Id`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stoppage_id: Option<String>,
}

impl Navigation {
    /// Creates a [`Navigation`] entering [`Stage::Selection`].
    #[must_use]
    pub fn selection(token: &session::Token) -> Self {
        Self {
            user_id: Some(token.to_string()),
            ..Self::default()
        }
    }

    /// Creates a [`Navigation`] entering [`Stage::Confirmation`].
    #[must_use]
    pub fn confirmation(
        token: &session::Token,
        shift: &Shift,
        stoppage: stoppage::Id,
    ) -> Self {
        Self {
            user_id: Some(token.to_string()),
            shift: Some(shift.label.clone()),
            stoppage_id: Some(stoppage.to_string()),
        }
    }

    /// Resolves the [`session::Token`] of this [`Navigation`].
    ///
    /// # Errors
    ///
    /// If the token is absent or malformed.
    pub fn token(&self) -> Result<session::Token, session::ResolveError> {
        session::Token::resolve(self.user_id.as_deref())
    }

    /// Parses this [`Navigation`] as a [`Stage::Confirmation`] deep link.
    ///
    /// # Errors
    ///
    /// If any of the three values is absent or malformed.
    pub fn deep_link(&self) -> Result<DeepLink, InvalidDeepLink> {
        let token = self.token().map_err(|_| InvalidDeepLink::Token)?;
        let shift = self
            .shift
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(InvalidDeepLink::Shift)?
            .to_owned();
        let stoppage = self
            .stoppage_id
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or(InvalidDeepLink::Stoppage)?
            .into();

        Ok(DeepLink {
            token,
            shift,
            stoppage,
        })
    }
}

/// Validated [`Stage::Confirmation`] deep link.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeepLink {
    /// [`session::Token`] of the registration.
    pub token: session::Token,

    /// Shift label or ID as carried by the link.
    pub shift: String,

    /// [`stoppage::Id`] carried by the link.
    pub stoppage: stoppage::Id,
}

impl DeepLink {
    /// Finds the [`Shift`] this [`DeepLink`] refers to, by label first and by
    /// ID second.
    #[must_use]
    pub fn shift_in<'c>(&self, catalog: &'c Catalog) -> Option<&'c Shift> {
        catalog.shift_by_label(&self.shift).or_else(|| {
            self.shift
                .parse::<i64>()
                .ok()
                .and_then(|id| catalog.shift(shift::Id::from(id)))
        })
    }
}

/// Error of parsing a [`DeepLink`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
pub enum InvalidDeepLink {
    /// `userId` is absent or malformed.
    #[display("`userId` is missing or malformed")]
    Token,

    /// `shift` is absent.
    #[display("`shift` is missing")]
    Shift,

    /// `stoppageId` is absent or malformed.
    #[display("`stoppageId` is missing or malformed")]
    Stoppage,
}

/// Redirection issued by a [`Stage`] guard.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Redirect {
    /// [`Stage`] to go to.
    pub to: Stage,

    /// Reason of this [`Redirect`].
    pub reason: RedirectReason,

    /// [`Navigation`] to enter the [`Stage`] with.
    pub navigation: Navigation,
}

impl Redirect {
    /// Creates a [`Redirect`] to [`Stage::Login`].
    #[must_use]
    pub fn login(reason: RedirectReason) -> Self {
        Self {
            to: Stage::Login,
            reason,
            navigation: Navigation::default(),
        }
    }

    /// Creates a [`Redirect`] to [`Stage::Confirmation`] of an already
    /// confirmed registration.
    #[must_use]
    pub fn confirmation(navigation: Navigation) -> Self {
        Self {
            to: Stage::Confirmation,
            reason: RedirectReason::AlreadyConfirmed,
            navigation,
        }
    }
}

/// Reason of a [`Redirect`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum RedirectReason {
    /// Session token is absent or malformed.
    #[display("{_0}")]
    Token(session::ResolveError),

    /// No registration is in progress for the token.
    #[display("No registration is in progress")]
    UnknownSession,

    /// OTP hasn't been verified yet.
    #[display("Identity is not verified")]
    NotVerified,

    /// OTP has already been verified.
    #[display("Identity is already verified")]
    AlreadyVerified,

    /// Registration is already confirmed.
    #[display("Registration is already confirmed")]
    AlreadyConfirmed,

    /// Deep link lacks a required value.
    #[display("{_0}")]
    DeepLink(InvalidDeepLink),

    /// Staff member of the deep link doesn't exist.
    #[display("Staff member is not found")]
    UnknownStaff,
}
