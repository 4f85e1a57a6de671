use crate::output::CliError;
use chrono::NaiveDate;
use kinfold_core::model::person::Sex;
use kinfold_core::model::tie::TieKind;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_PERSON_ID_LEN: usize = 64;
pub const MAX_RELATION_LEN: usize = 40;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: &'static str,
    pub value: String,
    pub reason: String,
    pub suggestion: String,
    pub code: &'static str,
}

impl ValidationError {
    pub fn new(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
        suggestion: impl Into<String>,
        code: &'static str,
    ) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
            suggestion: suggestion.into(),
            code,
        }
    }

    pub fn to_cli_error(&self) -> CliError {
        CliError::with_details(
            format!("invalid {} '{}': {}", self.field, self.value, self.reason),
            self.suggestion.clone(),
            self.code,
        )
    }
}

/// First, middle, last and maiden names plus aliases.
pub fn validate_name(field: &'static str, s: &str) -> Result<(), ValidationError> {
    if s.trim() != s {
        return Err(ValidationError::new(
            field,
            s,
            "must not start or end with whitespace",
            "trim leading/trailing whitespace",
            "invalid_name",
        ));
    }
    if s.is_empty() {
        return Err(ValidationError::new(
            field,
            s,
            "must not be empty",
            "provide a non-empty value",
            "invalid_name",
        ));
    }
    if s.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(
            field,
            s,
            format!("must be <= {MAX_NAME_LEN} characters"),
            "shorten the name",
            "invalid_name",
        ));
    }
    if s.chars().any(char::is_control) {
        return Err(ValidationError::new(
            field,
            s,
            "must not contain control characters",
            "remove control characters from the name",
            "invalid_name",
        ));
    }
    Ok(())
}

/// Person ids are opaque, but they travel through shells and JSON, so keep
/// them to a conservative character set.
pub fn validate_person_id(s: &str) -> Result<(), ValidationError> {
    if s.is_empty() || s.len() > MAX_PERSON_ID_LEN {
        return Err(ValidationError::new(
            "person_id",
            s,
            format!("must be 1..={MAX_PERSON_ID_LEN} characters"),
            "use an id printed by `kf person add` or `kf person list`",
            "invalid_person_id",
        ));
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ValidationError::new(
            "person_id",
            s,
            "may only contain ASCII letters, digits, '-', '_' and '.'",
            "use ids like p-3f9a01c2b7de",
            "invalid_person_id",
        ));
    }
    Ok(())
}

/// Calendar dates are stored as ISO `YYYY-MM-DD`.
pub fn validate_date(field: &'static str, s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| {
        ValidationError::new(
            field,
            s,
            e.to_string(),
            "use an ISO date like 1952-03-14",
            "invalid_date",
        )
    })
}

/// `died` may not precede `born` when both are known.
pub fn validate_lifespan(
    born: Option<NaiveDate>,
    died: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    if let (Some(born), Some(died)) = (born, died) {
        if died < born {
            return Err(ValidationError::new(
                "died",
                died.to_string(),
                format!("is before the birth date {born}"),
                "check --born and --died",
                "invalid_date",
            ));
        }
    }
    Ok(())
}

/// Loose shape check: one `@` with text on both sides and a dot in the
/// domain.
pub fn validate_email(s: &str) -> Result<(), ValidationError> {
    let valid = match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !s.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new(
            "email",
            s,
            "is not an email address",
            "use an address like ada@example.org",
            "invalid_email",
        ))
    }
}

pub fn validate_phone(s: &str) -> Result<(), ValidationError> {
    let digits = s.chars().filter(char::is_ascii_digit).count();
    let allowed = s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
    if allowed && digits >= 3 {
        Ok(())
    } else {
        Err(ValidationError::new(
            "phone_number",
            s,
            "must contain at least 3 digits and only +-(). separators",
            "use a number like +1 555 0100",
            "invalid_phone",
        ))
    }
}

/// Relation and tie type names.
pub fn validate_relation_name(field: &'static str, s: &str) -> Result<(), ValidationError> {
    let ok = !s.is_empty()
        && s.len() <= MAX_RELATION_LEN
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-'));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            s,
            format!("must be 1..={MAX_RELATION_LEN} lowercase letters, digits, '_' or '-'"),
            "use names like step_parent or godparent",
            "invalid_relation",
        ))
    }
}

pub fn validate_sex(s: &str) -> Result<Sex, ValidationError> {
    s.parse::<Sex>().map_err(|_| {
        ValidationError::new(
            "sex",
            s,
            "unknown value",
            "use one of: male, female, other",
            "invalid_sex",
        )
    })
}

pub fn validate_kind(s: &str) -> Result<TieKind, ValidationError> {
    s.parse::<TieKind>().map_err(|_| {
        ValidationError::new(
            "kind",
            s,
            "unknown tie kind",
            "use one of: parent_child, partnership",
            "invalid_kind",
        )
    })
}
