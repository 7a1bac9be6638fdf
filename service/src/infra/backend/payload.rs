//! Wire payloads of the registration services and their normalization into
//! the domain model.
//!
//! The services have answered with several payload generations over time,
//! so every variant is accepted here and nothing past this module ever sees
//! them.

use std::{collections::BTreeMap, fmt};

use derive_more::Display;
use serde::{
    de::{self, IgnoredAny},
    Deserialize, Deserializer, Serialize,
};

use crate::domain::{
    catalog::Stoppages, otp, session, shift, staff, stoppage, Catalog, Shift,
    Stoppage,
};

use super::{Error, Rejection};

/// Identifier encoded either as a JSON number or as a JSON string.
#[derive(Clone, Debug, Deserialize, Display, Eq, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    /// Numeric form.
    Number(i64),

    /// Textual form.
    Text(String),
}

impl Scalar {
    /// Interprets this [`Scalar`] as an integer identifier.
    ///
    /// # Errors
    ///
    /// If this [`Scalar`] is a non-numeric string.
    pub fn as_id(&self) -> Result<i64, Error> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::Malformed(format!("`{s}` is not an ID"))),
        }
    }
}

/// Answer of an OTP send.
#[derive(Clone, Debug, Deserialize)]
pub struct OtpSent {
    /// Address the OTP has been delivered to, plain or already masked.
    pub email: String,
}

impl TryFrom<OtpSent> for otp::Email {
    type Error = Error;

    fn try_from(sent: OtpSent) -> Result<Self, Self::Error> {
        otp::Email::new(sent.email.trim()).ok_or_else(|| {
            Error::Malformed(format!("`{}` is not an e-mail", sent.email))
        })
    }
}

/// Answer of an OTP verification.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct OtpVerified {
    /// Continuation identifier, if it differs from the verified token.
    #[serde(default, alias = "userId")]
    pub user_id: Option<Scalar>,
}

impl OtpVerified {
    /// Resolves the continuation [`session::Token`], falling back to the
    /// `verified` one.
    #[must_use]
    pub fn continuation(&self, verified: &session::Token) -> session::Token {
        self.user_id
            .as_ref()
            .and_then(|id| session::Token::new(id.to_string()))
            .unwrap_or_else(|| verified.clone())
    }
}

/// Request of a [`Catalog`].
#[derive(Clone, Copy, Debug, Serialize)]
pub struct MetadataRequest<'a> {
    /// Token of the registration.
    pub suggestion_id: &'a str,
}

/// Answer of a [`Catalog`] request.
#[derive(Clone, Debug, Deserialize)]
pub struct Metadata {
    /// Staff member description.
    pub staff: Staff,

    /// Offered shifts.
    #[serde(default)]
    pub shifts: Vec<ShiftEntry>,

    /// Offered stoppages serving every shift.
    #[serde(default)]
    pub locations: Vec<Location>,
}

/// Staff member description.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Staff {
    /// Current generation with a split name.
    Split {
        /// Given name.
        first_name: String,

        /// Family name.
        #[serde(default)]
        last_name: String,

        /// Employee identifier.
        #[serde(default)]
        employee_id: Option<Scalar>,

        /// Department name.
        #[serde(default)]
        department: String,
    },

    /// Legacy generation with a single name.
    Legacy {
        /// Full name.
        name: String,

        /// Enrollment identifier.
        #[serde(default, rename = "enrollmentId")]
        enrollment_id: Option<Scalar>,

        /// Department name.
        #[serde(default)]
        department: String,
    },
}

impl From<Staff> for staff::Profile {
    fn from(staff: Staff) -> Self {
        match staff {
            Staff::Split {
                first_name,
                last_name,
                employee_id,
                department,
            } => Self {
                first_name,
                last_name,
                employee_id: employee_id.map(|id| id.to_string()).unwrap_or_default(),
                department,
            },
            Staff::Legacy {
                name,
                enrollment_id,
                department,
            } => {
                let name = name.trim();
                let (first, last) =
                    name.split_once(char::is_whitespace).unwrap_or((name, ""));
                Self {
                    first_name: first.to_owned(),
                    last_name: last.trim().to_owned(),
                    employee_id: enrollment_id
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                    department,
                }
            }
        }
    }
}

/// Offered shift.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ShiftEntry {
    /// Shift carrying its own identifier.
    Labeled {
        /// Shift identifier.
        id: Scalar,

        /// Shift label, formerly named `time`.
        #[serde(alias = "time")]
        label: String,

        /// Stoppages serving only this shift.
        #[serde(default)]
        locations: Option<Vec<Location>>,
    },

    /// Legacy bare label, identified by its 1-based position.
    Bare(String),
}

/// Offered stoppage.
#[derive(Clone, Debug, Deserialize)]
pub struct Location {
    /// Stoppage identifier.
    pub id: Scalar,

    /// Stoppage name.
    pub name: String,
}

impl TryFrom<Location> for Stoppage {
    type Error = Error;

    fn try_from(location: Location) -> Result<Self, Self::Error> {
        Ok(Self {
            id: stoppage::Id::from(location.id.as_id()?),
            name: location.name,
        })
    }
}

impl TryFrom<Metadata> for Catalog {
    type Error = Error;

    /// Normalizes any [`Metadata`] generation into a [`Catalog`].
    ///
    /// Stoppages are shift-scoped as soon as any shift carries its own list.
    fn try_from(metadata: Metadata) -> Result<Self, Self::Error> {
        let Metadata {
            staff,
            shifts: entries,
            locations,
        } = metadata;

        let mut shifts = Vec::with_capacity(entries.len());
        let mut scoped = BTreeMap::new();
        let mut is_scoped = false;
        for (n, entry) in (1..).zip(entries) {
            let (shift, own) = match entry {
                ShiftEntry::Labeled {
                    id,
                    label,
                    locations,
                } => (
                    Shift {
                        id: shift::Id::from(id.as_id()?),
                        label,
                    },
                    locations,
                ),
                ShiftEntry::Bare(label) => (
                    Shift {
                        id: shift::Id::from(n),
                        label,
                    },
                    None,
                ),
            };
            if let Some(own) = own {
                is_scoped = true;
                let own = own
                    .into_iter()
                    .map(Stoppage::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                drop(scoped.insert(shift.id, own));
            }
            shifts.push(shift);
        }

        let stoppages = if is_scoped {
            for s in &shifts {
                _ = scoped.entry(s.id).or_default();
            }
            Stoppages::ByShift(scoped)
        } else {
            Stoppages::Global(
                locations
                    .into_iter()
                    .map(Stoppage::try_from)
                    .collect::<Result<_, _>>()?,
            )
        };

        Ok(Self::new(staff.into(), shifts, stoppages)?)
    }
}

/// Request of a verification.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct VerifyRequest<'a> {
    /// Typed OTP code.
    pub otp: &'a str,
}

/// Request of a submission.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct SubmitRequest {
    /// Chosen shift.
    pub shift: shift::Id,

    /// Chosen stoppage.
    pub location: stoppage::Id,
}

/// Body of a non-successful answer.
///
/// Carries either a general `error` message or per-field message lists,
/// like `{"shift": ["This shift is full."]}`. A general message wins over
/// field ones, otherwise the first field in the document wins.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Failure {
    /// First message found.
    pub message: Option<String>,

    /// Field the `message` relates to, if it's not a general one.
    pub field: Option<String>,
}

impl Failure {
    /// Keys holding a general message.
    const GENERAL: [&'static str; 3] = ["error", "detail", "message"];

    /// Converts this [`Failure`] into a [`Rejection`] with the provided
    /// HTTP `status`.
    #[must_use]
    pub fn into_rejection(self, status: Option<u16>) -> Rejection {
        Rejection {
            status,
            message: self.message,
            field: self.field,
        }
    }
}

impl<'de> Deserialize<'de> for Failure {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;

        impl<'de> de::Visitor<'de> for Visitor {
            type Value = Failure;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an error object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut general = None;
                let mut by_field = None;
                while let Some((key, value)) =
                    map.next_entry::<String, Messages>()?
                {
                    let Some(msg) = value.first() else {
                        continue;
                    };
                    if Failure::GENERAL.contains(&key.as_str()) {
                        if general.is_none() {
                            general = Some(msg.to_owned());
                        }
                    } else if by_field.is_none() {
                        by_field = Some((key, msg.to_owned()));
                    }
                }

                Ok(match (general, by_field) {
                    (Some(message), _) => Failure {
                        message: Some(message),
                        field: None,
                    },
                    (None, Some((field, message))) => Failure {
                        message: Some(message),
                        field: Some(field),
                    },
                    (None, None) => Failure::default(),
                })
            }
        }

        deserializer.deserialize_map(Visitor)
    }
}

/// Message value of a [`Failure`] entry.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum Messages {
    /// Single message.
    Text(String),

    /// List of messages.
    List(Vec<Messages>),

    /// Anything else, carrying no message.
    Other(IgnoredAny),
}

impl Messages {
    /// Returns the first non-blank message, if any.
    fn first(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.trim()).filter(|s| !s.is_empty()),
            Self::List(all) => all.iter().find_map(Self::first),
            Self::Other(_) => None,
        }
    }
}

#[cfg(test)]
mod spec {
    use serde_json::json;

    use crate::{
        domain::{
            catalog::{EmptyCatalogError, Stoppages},
            otp, session, Catalog,
        },
        infra::backend::Error,
    };

    use super::{Failure, Metadata, OtpSent, OtpVerified};

    fn catalog(payload: serde_json::Value) -> Result<Catalog, Error> {
        serde_json::from_value::<Metadata>(payload)
            .unwrap()
            .try_into()
    }

    #[test]
    fn normalizes_current_payload() {
        let catalog = catalog(json!({
            "staff": {
                "first_name": "John",
                "last_name": "Doe",
                "employee_id": 42,
                "department": "Computer Science",
            },
            "shifts": [
                {"id": 1, "label": "Morning"},
                {"id": "2", "label": "Evening"},
            ],
            "locations": [
                {"id": 5, "name": "Central Station"},
                {"id": "6", "name": "Anand Van"},
            ],
        }))
        .unwrap();

        assert_eq!(catalog.profile.name().to_string(), "John Doe");
        assert_eq!(catalog.profile.employee_id, "42");
        assert_eq!(catalog.shifts.len(), 2);
        assert_eq!(catalog.shift(2.into()).unwrap().label, "Evening");
        assert!(!catalog.is_shift_scoped());
        assert_eq!(
            catalog.stoppage(None, 6.into()).map(|s| s.name.as_str()),
            Some("Anand Van"),
        );
    }

    #[test]
    fn normalizes_legacy_payload() {
        let catalog = catalog(json!({
            "staff": {
                "name": "John  Doe",
                "enrollmentId": "E123456",
                "department": "Computer Science",
            },
            "shifts": ["Morning", "Evening", "Night"],
            "locations": [{"id": "3", "name": "Akabar Pur"}],
        }))
        .unwrap();

        assert_eq!(catalog.profile.first_name, "John");
        assert_eq!(catalog.profile.last_name, "Doe");
        assert_eq!(catalog.profile.employee_id, "E123456");
        assert_eq!(
            catalog
                .shifts
                .iter()
                .map(|s| (i64::from(s.id), s.label.as_str()))
                .collect::<Vec<_>>(),
            [(1, "Morning"), (2, "Evening"), (3, "Night")],
        );
    }

    #[test]
    fn normalizes_time_labeled_shifts() {
        let catalog = catalog(json!({
            "staff": {"first_name": "John", "last_name": "Doe"},
            "shifts": [{"id": 7, "time": "08:00 AM"}],
            "locations": [{"id": 3, "name": "Akabar Pur"}],
        }))
        .unwrap();

        assert_eq!(catalog.shift(7.into()).unwrap().label, "08:00 AM");
    }

    #[test]
    fn scopes_stoppages_by_shift_when_shifts_carry_them() {
        let catalog = catalog(json!({
            "staff": {"first_name": "John", "last_name": "Doe"},
            "shifts": [
                {"id": 1, "label": "Morning", "locations": [
                    {"id": 5, "name": "Central Station"},
                ]},
                {"id": 2, "label": "Evening"},
            ],
        }))
        .unwrap();

        let Stoppages::ByShift(by_shift) = &catalog.stoppages else {
            panic!("stoppages must be shift-scoped");
        };
        assert_eq!(by_shift.len(), 2);
        assert_eq!(catalog.stoppages_for(Some(1.into())).len(), 1);
        assert!(catalog.stoppages_for(Some(2.into())).is_empty());
    }

    #[test]
    fn refuses_empty_catalogs() {
        let no_shifts = catalog(json!({
            "staff": {"first_name": "John"},
            "shifts": [],
            "locations": [{"id": 5, "name": "Central Station"}],
        }));
        let no_stoppages = catalog(json!({
            "staff": {"first_name": "John"},
            "shifts": [{"id": 1, "label": "Morning"}],
        }));

        assert!(matches!(
            no_shifts,
            Err(Error::EmptyCatalog(EmptyCatalogError::NoShifts)),
        ));
        assert!(matches!(
            no_stoppages,
            Err(Error::EmptyCatalog(EmptyCatalogError::NoStoppages)),
        ));
    }

    #[test]
    fn refuses_non_numeric_ids() {
        let res = catalog(json!({
            "staff": {"first_name": "John"},
            "shifts": [{"id": "morning", "label": "Morning"}],
            "locations": [{"id": 5, "name": "Central Station"}],
        }));

        assert!(matches!(res, Err(Error::Malformed(_))));
    }

    #[test]
    fn picks_general_failure_message_first() {
        let failure = serde_json::from_value::<Failure>(json!({
            "shift": ["This shift is full."],
            "error": "Registration is closed.",
        }))
        .unwrap();

        assert_eq!(failure.message.as_deref(), Some("Registration is closed."));
        assert_eq!(failure.field, None);
    }

    #[test]
    fn picks_first_field_failure_message() {
        let failure = serde_json::from_str::<Failure>(
            r#"{"status": 3, "location": [], "shift": ["This shift is full.", "x"], "zone": ["y"]}"#,
        )
        .unwrap();

        assert_eq!(failure.message.as_deref(), Some("This shift is full."));
        assert_eq!(failure.field.as_deref(), Some("shift"));
        assert_eq!(
            serde_json::from_value::<Failure>(json!({})).unwrap(),
            Failure::default(),
        );
    }

    #[test]
    fn parses_otp_answers() {
        let token = session::Token::new("U1").unwrap();
        let sent: OtpSent =
            serde_json::from_value(json!({"email": "user@example.com"}))
                .unwrap();
        let masked: OtpSent =
            serde_json::from_value(json!({"email": "u***@example.com"}))
                .unwrap();

        assert_eq!(
            otp::Email::try_from(sent).unwrap().masked().to_string(),
            "use***@example.com",
        );
        assert_eq!(
            otp::Email::try_from(masked).unwrap().masked().to_string(),
            "u***@example.com",
        );
        assert_eq!(
            serde_json::from_value::<OtpVerified>(json!({}))
                .unwrap()
                .continuation(&token),
            token,
        );
        assert_eq!(
            serde_json::from_value::<OtpVerified>(json!({"user_id": 17}))
                .unwrap()
                .continuation(&token)
                .to_string(),
            "17",
        );
    }
}
