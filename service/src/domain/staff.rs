//! Staff [`Profile`] definitions.

use derive_more::Display;
use serde::Serialize;

/// Read-only snapshot of a staff member fetched once per session.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Profile {
    /// First name of the staff member.
    pub first_name: String,

    /// Last name of the staff member.
    pub last_name: String,

    /// Employee ID of the staff member.
    pub employee_id: String,

    /// Department the staff member belongs to.
    pub department: String,
}

impl Profile {
    /// Returns the full [`Name`] of the staff member.
    #[must_use]
    pub fn name(&self) -> Name {
        let full = match (self.first_name.trim(), self.last_name.trim()) {
            (first, "") => first.to_owned(),
            ("", last) => last.to_owned(),
            (first, last) => format!("{first} {last}"),
        };
        Name(full)
    }
}

/// Full name of a staff member.
#[derive(Clone, Debug, Display, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Name(String);

#[cfg(test)]
mod spec {
    use super::Profile;

    fn profile(first_name: &str, last_name: &str) -> Profile {
        Profile {
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            employee_id: "E123456".to_owned(),
            department: "Computer Science".to_owned(),
        }
    }

    #[test]
    fn joins_name_parts() {
        assert_eq!(profile("John", "Doe").name().to_string(), "John Doe");
        assert_eq!(profile("John", "").name().to_string(), "John");
        assert_eq!(profile(" ", "Doe").name().to_string(), "Doe");
    }
}
