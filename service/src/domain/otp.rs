//! One-time password definitions.

use std::{str::FromStr, sync::LazyLock, time::Duration};

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf};
use derive_more::{AsRef, Display};
use regex::Regex;
use secrecy::{zeroize::Zeroize, CloneableSecret};
use serde::Serialize;

use super::session;

/// Six-digit one-time password typed by a staff member.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Code(String);

impl Code {
    /// Creates a new [`Code`] if the given `code` is exactly six digits.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code = code.into();
        Self::check(&code).then_some(Self(code))
    }

    /// Checks whether the given `code` is a valid [`Code`].
    fn check(code: impl AsRef<str>) -> bool {
        static REGEX: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^\d{6}$").expect("valid regex"));

        let code = code.as_ref();
        code.is_ascii() && REGEX.is_match(code)
    }
}

impl AsRef<str> for Code {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Code {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("OTP must be 6 digits")
    }
}

impl CloneableSecret for Code {}
impl Zeroize for Code {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// E-mail address an OTP is delivered to, as reported by the OTP service.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
pub struct Email(String);

impl Email {
    /// Creates a new [`Email`] if the given `address` has a non-empty local
    /// part and a non-empty domain.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Option<Self> {
        let address = address.into();
        let (local, domain) = address.split_once('@')?;
        (!local.is_empty() && !domain.is_empty() && !domain.contains('@'))
            .then_some(Self(address))
    }

    /// Masks this [`Email`] for display.
    ///
    /// At most three leading characters of the local part stay visible and
    /// at least one is always hidden. Addresses already masked by the OTP
    /// service are kept as is.
    #[must_use]
    pub fn masked(&self) -> MaskedEmail {
        let Some((local, domain)) = self.0.split_once('@') else {
            return MaskedEmail("***".to_owned());
        };
        if local.contains('*') {
            return MaskedEmail(self.0.clone());
        }

        let visible = local.chars().count().saturating_sub(1).min(3);
        let head = local.chars().take(visible).collect::<String>();
        MaskedEmail(format!("{head}***@{domain}"))
    }
}

/// Masked [`Email`] safe to show to a staff member.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq, Serialize)]
#[as_ref(str)]
#[serde(transparent)]
pub struct MaskedEmail(String);

define_kind! {
    #[doc = "Status of an OTP [`Challenge`]."]
    enum Status {
        #[doc = "Code has been delivered and awaits verification."]
        Pending = 1,

        #[doc = "Code has been verified."]
        Verified = 2,

        #[doc = "Delivering the code failed."]
        Failed = 3,

        #[doc = "Code outlived its lifetime and must be re-sent."]
        Expired = 4,
    }
}

define_kind! {
    #[doc = "Phase of the OTP exchange of a registration session."]
    enum Phase {
        #[doc = "Nothing has been sent yet."]
        Idle = 1,

        #[doc = "Code is being sent."]
        Sending = 2,

        #[doc = "Code has been sent and awaits verification."]
        AwaitingCode = 3,

        #[doc = "Sending the code failed."]
        SendFailed = 4,

        #[doc = "Code has been verified."]
        Verified = 5,
    }
}

/// OTP challenge issued for a registration session.
#[derive(Clone, Debug)]
pub struct Challenge {
    /// [`session::Token`] this [`Challenge`] targets.
    pub token: session::Token,

    /// [`MaskedEmail`] the code has been delivered to.
    pub destination: Option<MaskedEmail>,

    /// [`DateTime`] when the code has been issued.
    pub issued_at: IssuanceDateTime,

    /// Whole seconds left until a resend is allowed.
    pub cooldown_remaining: u32,

    /// [`Status`] of this [`Challenge`].
    pub status: Status,

    /// Number of successful sends for this session.
    ///
    /// Codes typed against an older serial are stale.
    pub serial: u32,
}

impl Challenge {
    /// Checks whether this [`Challenge`] outlived the provided `lifetime` at
    /// the provided moment.
    #[must_use]
    pub fn is_expired_at<T: ?Sized>(
        &self,
        lifetime: Duration,
        now: DateTimeOf<T>,
    ) -> bool {
        self.issued_at.elapsed_until(now) >= lifetime
    }
}

/// [`DateTime`] when a [`Challenge`] code was issued.
pub type IssuanceDateTime = DateTimeOf<(Challenge, unit::Issuance)>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use super::{Challenge, Code, Email, IssuanceDateTime, Status};
    use crate::domain::session;

    #[test]
    fn accepts_only_six_digit_codes() {
        assert!(Code::new("123456").is_some());
        assert!(Code::new("000000").is_some());

        for code in ["", "12345", "1234567", "12345a", " 23456", "١٢٣٤٥٦"] {
            assert!(Code::new(code).is_none(), "{code:?}");
        }
    }

    #[test]
    fn masks_local_part() {
        let mask = |s: &str| Email::new(s).unwrap().masked().to_string();

        assert_eq!(mask("user@example.com"), "use***@example.com");
        assert_eq!(mask("u1@example.com"), "u***@example.com");
        assert_eq!(mask("u@example.com"), "***@example.com");
        assert_eq!(mask("u***@example.com"), "u***@example.com");
    }

    #[test]
    fn rejects_addresses_without_domain() {
        assert!(Email::new("user").is_none());
        assert!(Email::new("@example.com").is_none());
        assert!(Email::new("user@").is_none());
        assert!(Email::new("a@b@c").is_none());
    }

    #[test]
    fn expires_after_lifetime() {
        let issued_at = IssuanceDateTime::from_unix_timestamp(100).unwrap();
        let challenge = Challenge {
            token: session::Token::new("U1").unwrap(),
            destination: None,
            issued_at,
            cooldown_remaining: 0,
            status: Status::Pending,
            serial: 1,
        };
        let lifetime = Duration::from_secs(300);

        assert!(!challenge.is_expired_at(lifetime, issued_at));
        assert!(!challenge
            .is_expired_at(lifetime, issued_at + Duration::from_secs(299)));
        assert!(challenge
            .is_expired_at(lifetime, issued_at + Duration::from_secs(300)));
    }
}
