use std::fmt;

use crate::model::person::PersonId;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    PersonNotFound,
    TieNotFound,
    RelationNotFound,
    InvalidTie,
    InvalidEnumValue,
    RecordInUse,
    BackendUnavailable,
    CorruptStore,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::PersonNotFound => "E2001",
            Self::TieNotFound => "E2002",
            Self::RelationNotFound => "E2003",
            Self::InvalidTie => "E2004",
            Self::InvalidEnumValue => "E2005",
            Self::RecordInUse => "E2006",
            Self::BackendUnavailable => "E3001",
            Self::CorruptStore => "E3002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Family tree not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::PersonNotFound => "Person not found",
            Self::TieNotFound => "Tie not found",
            Self::RelationNotFound => "Tie relation not found",
            Self::InvalidTie => "Invalid tie",
            Self::InvalidEnumValue => "Invalid sex/kind value",
            Self::RecordInUse => "Record is still referenced",
            Self::BackendUnavailable => "Backend unavailable",
            Self::CorruptStore => "Corrupt SQLite store",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `kf init` to create a family tree here."),
            Self::ConfigParseError => Some("Fix syntax in .kinfold/config.toml and retry."),
            Self::PersonNotFound | Self::TieNotFound => None,
            Self::RelationNotFound => Some("Use `kf relation list` to see known relations."),
            Self::InvalidTie => Some(
                "A tie needs three distinct people; partnership ties take only --a and --b.",
            ),
            Self::InvalidEnumValue => Some("Use one of the documented sex/kind values."),
            Self::RecordInUse => {
                Some("Remove the ties that use it first. Built-in relations are never removable.")
            }
            Self::BackendUnavailable => Some("Check that .kinfold/kinfold.db is readable and retry."),
            Self::CorruptStore => Some("Restore .kinfold/kinfold.db from a backup."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure reported by a [`TieStore`](crate::store::TieStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The SQLite backend rejected or failed the query.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The backend could not be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The record was rejected before it reached storage.
    #[error("invalid record: {0}")]
    Invalid(String),
    /// The record cannot be removed while other rows reference it.
    #[error("in use: {0}")]
    InUse(String),
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Sqlite(_) | Self::Unavailable(_) => ErrorCode::BackendUnavailable,
            Self::Invalid(_) => ErrorCode::InvalidTie,
            Self::InUse(_) => ErrorCode::RecordInUse,
        }
    }
}

/// Errors produced by the kinship resolver.
///
/// An empty relationship list is a successful result, so callers can tell
/// "nobody recorded" apart from both variants here.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The store call itself failed.
    #[error("backend unavailable while resolving {operation}: {source}")]
    BackendUnavailable {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
    /// A person the operation depends on does not exist.
    #[error("person not found: '{0}'")]
    NotFound(PersonId),
}

impl ResolveError {
    /// Adapter for `map_err` at store call sites.
    pub fn backend(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::BackendUnavailable { operation, source }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::BackendUnavailable { .. } => ErrorCode::BackendUnavailable,
            Self::NotFound(_) => ErrorCode::PersonNotFound,
        }
    }
}
