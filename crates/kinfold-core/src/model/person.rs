use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{ParseEnumError, normalize};

/// Prefix for generated person identifiers.
pub const PERSON_ID_PREFIX: &str = "p-";

const GENERATED_ID_HEX_LEN: usize = 12;

/// Opaque person identifier.
///
/// Generated ids look like `p-3f9a01c2b7de`, but any non-empty string is
/// accepted so records imported from elsewhere keep their original ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    /// Derive a fresh id from the person's names and creation time.
    ///
    /// A random salt keeps two people with the same name created in the same
    /// microsecond apart.
    #[must_use]
    pub fn generate(first_name: &str, last_name: &str, created_at_us: i64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(first_name.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(last_name.as_bytes());
        hasher.update(&created_at_us.to_le_bytes());
        hasher.update(&rand::random::<u64>().to_le_bytes());
        let hex = hasher.finalize().to_hex();
        Self(format!("{PERSON_ID_PREFIX}{}", &hex.as_str()[..GENERATED_ID_HEX_LEN]))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersonId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PersonId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for PersonId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToSql for PersonId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for PersonId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        String::column_result(value).map(Self)
    }
}

/// Recorded sex of a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    #[default]
    Other,
}

impl Sex {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            "other" | "o" | "x" => Ok(Self::Other),
            _ => Err(ParseEnumError {
                expected: "sex",
                got: s.to_string(),
            }),
        }
    }
}

/// A stored person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maiden_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub sex: Sex,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub born: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub died: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl Person {
    /// Full display name: given names, surname, then maiden name and alias
    /// when recorded.
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut name = self.first_name.clone();
        if let Some(middle) = self.middle_name.as_deref().filter(|m| !m.is_empty()) {
            name.push(' ');
            name.push_str(middle);
        }
        name.push(' ');
        name.push_str(&self.last_name);
        if let Some(maiden) = self.maiden_name.as_deref().filter(|m| !m.is_empty()) {
            name.push_str(" (née ");
            name.push_str(maiden);
            name.push(')');
        }
        if let Some(alias) = self.alias.as_deref().filter(|a| !a.is_empty()) {
            name.push_str(" \"");
            name.push_str(alias);
            name.push('"');
        }
        name
    }

    /// Lifespan as `born–died`, `b. born`, or `None` when nothing is known.
    #[must_use]
    pub fn lifespan(&self) -> Option<String> {
        match (self.born, self.died) {
            (Some(b), Some(d)) => Some(format!("{b}–{d}")),
            (Some(b), None) => Some(format!("b. {b}")),
            (None, Some(d)) => Some(format!("d. {d}")),
            (None, None) => None,
        }
    }
}

/// Fields for creating a person. `id` is generated when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPerson {
    pub id: Option<PersonId>,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub maiden_name: Option<String>,
    pub alias: Option<String>,
    pub sex: Sex,
    pub born: Option<NaiveDate>,
    pub died: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl NewPerson {
    #[must_use]
    pub fn named(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }
}

/// Partial update. `None` leaves a column unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonUpdate {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub maiden_name: Option<String>,
    pub alias: Option<String>,
    pub sex: Option<Sex>,
    pub born: Option<NaiveDate>,
    pub died: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl PersonUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.middle_name.is_none()
            && self.last_name.is_none()
            && self.maiden_name.is_none()
            && self.alias.is_none()
            && self.sex.is_none()
            && self.born.is_none()
            && self.died.is_none()
            && self.email.is_none()
            && self.phone_number.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(first: &str, last: &str) -> Person {
        Person {
            id: PersonId::from("p-test"),
            first_name: first.to_string(),
            middle_name: None,
            last_name: last.to_string(),
            maiden_name: None,
            alias: None,
            sex: Sex::Other,
            born: None,
            died: None,
            email: None,
            phone_number: None,
            created_at_us: 0,
            updated_at_us: 0,
        }
    }

    #[test]
    fn generated_ids_have_prefix_and_fixed_length() {
        let id = PersonId::generate("Ada", "Lovelace", 1_000);
        assert!(id.as_str().starts_with(PERSON_ID_PREFIX));
        assert_eq!(id.as_str().len(), PERSON_ID_PREFIX.len() + GENERATED_ID_HEX_LEN);
        assert!(id.as_str()[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_differ_for_same_input() {
        let a = PersonId::generate("Ada", "Lovelace", 1_000);
        let b = PersonId::generate("Ada", "Lovelace", 1_000);
        assert_ne!(a, b);
    }

    #[test]
    fn sex_parses_case_insensitively() {
        assert_eq!("male".parse::<Sex>().unwrap(), Sex::Male);
        assert_eq!(" FEMALE ".parse::<Sex>().unwrap(), Sex::Female);
        assert_eq!("o".parse::<Sex>().unwrap(), Sex::Other);
        let err = "unknown".parse::<Sex>().unwrap_err();
        assert_eq!(err.to_string(), "invalid sex: 'unknown'");
    }

    #[test]
    fn sex_serializes_as_stored_enum_value() {
        assert_eq!(serde_json::to_string(&Sex::Female).unwrap(), "\"Female\"");
        assert_eq!(Sex::default(), Sex::Other);
    }

    #[test]
    fn display_name_includes_optional_parts() {
        let mut p = person("Mary", "Smith");
        assert_eq!(p.display_name(), "Mary Smith");

        p.middle_name = Some("Anne".into());
        p.maiden_name = Some("Jones".into());
        p.alias = Some("Molly".into());
        assert_eq!(p.display_name(), "Mary Anne Smith (née Jones) \"Molly\"");
    }

    #[test]
    fn lifespan_formats_known_dates() {
        let mut p = person("Tom", "Smith");
        assert_eq!(p.lifespan(), None);
        p.born = NaiveDate::from_ymd_opt(1901, 2, 3);
        assert_eq!(p.lifespan().as_deref(), Some("b. 1901-02-03"));
        p.died = NaiveDate::from_ymd_opt(1980, 7, 1);
        assert_eq!(p.lifespan().as_deref(), Some("1901-02-03–1980-07-01"));
    }

    #[test]
    fn person_update_empty_detection() {
        assert!(PersonUpdate::default().is_empty());
        let update = PersonUpdate {
            alias: Some("Bob".into()),
            ..PersonUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
