//! Ties: the ternary rows that link people.
//!
//! Storage keeps one row shape `{person_a, person_b, person_c?}` for every
//! tie. The relation a row uses carries a [`TieKind`], and rows are lifted
//! into a [`TieLink`] so callers never infer meaning from column positions:
//!
//! - `ParentChild`: `person_a` is the child of `person_b` (and `person_c`
//!   when present).
//! - `Partnership`: `person_a` and `person_b` form a union; `person_c` must
//!   be absent.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::person::PersonId;
use super::{ParseEnumError, normalize};
use crate::error::StoreError;

/// Discriminator carried by every tie relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieKind {
    ParentChild,
    Partnership,
}

impl TieKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParentChild => "parent_child",
            Self::Partnership => "partnership",
        }
    }
}

impl fmt::Display for TieKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TieKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "parent_child" | "parent-child" | "parent" => Ok(Self::ParentChild),
            "partnership" | "partner" => Ok(Self::Partnership),
            _ => Err(ParseEnumError {
                expected: "tie kind",
                got: s.to_string(),
            }),
        }
    }
}

/// The meaning of a tie row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TieLink {
    ParentChild {
        child: PersonId,
        parent: PersonId,
        #[serde(skip_serializing_if = "Option::is_none")]
        other_parent: Option<PersonId>,
    },
    Partnership { partner: PersonId, other: PersonId },
}

impl TieLink {
    /// Lift stored columns into a link, enforcing the per-kind shape.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when a person repeats within the row or
    /// a partnership row carries a third person.
    pub fn from_columns(
        kind: TieKind,
        person_a: PersonId,
        person_b: PersonId,
        person_c: Option<PersonId>,
    ) -> Result<Self, StoreError> {
        if person_a == person_b
            || person_c.as_ref().is_some_and(|c| *c == person_a || *c == person_b)
        {
            return Err(StoreError::Invalid(format!(
                "tie repeats a person: a={person_a} b={person_b} c={}",
                person_c.as_ref().map_or("-", PersonId::as_str)
            )));
        }

        match kind {
            TieKind::ParentChild => Ok(Self::ParentChild {
                child: person_a,
                parent: person_b,
                other_parent: person_c,
            }),
            TieKind::Partnership => match person_c {
                None => Ok(Self::Partnership {
                    partner: person_a,
                    other: person_b,
                }),
                Some(c) => Err(StoreError::Invalid(format!(
                    "partnership tie between {person_a} and {person_b} cannot name a third person ({c})"
                ))),
            },
        }
    }

    #[must_use]
    pub const fn kind(&self) -> TieKind {
        match self {
            Self::ParentChild { .. } => TieKind::ParentChild,
            Self::Partnership { .. } => TieKind::Partnership,
        }
    }

    /// Stored `person_a` column.
    #[must_use]
    pub const fn person_a(&self) -> &PersonId {
        match self {
            Self::ParentChild { child, .. } => child,
            Self::Partnership { partner, .. } => partner,
        }
    }

    /// Stored `person_b` column.
    #[must_use]
    pub const fn person_b(&self) -> &PersonId {
        match self {
            Self::ParentChild { parent, .. } => parent,
            Self::Partnership { other, .. } => other,
        }
    }

    /// Stored `person_c` column.
    #[must_use]
    pub const fn person_c(&self) -> Option<&PersonId> {
        match self {
            Self::ParentChild { other_parent, .. } => other_parent.as_ref(),
            Self::Partnership { .. } => None,
        }
    }

    /// The partner of `id` recorded by this link, if any.
    ///
    /// Co-parents of a parent-child link count as partners of each other;
    /// the child of the link has no partner through it.
    #[must_use]
    pub fn partner_of(&self, id: &PersonId) -> Option<&PersonId> {
        match self {
            Self::ParentChild {
                parent,
                other_parent,
                ..
            } => {
                if parent == id {
                    other_parent.as_ref()
                } else if other_parent.as_ref() == Some(id) {
                    Some(parent)
                } else {
                    None
                }
            }
            Self::Partnership { partner, other } => {
                if partner == id {
                    Some(other)
                } else if other == id {
                    Some(partner)
                } else {
                    None
                }
            }
        }
    }

    /// `true` when this is a parent-child link whose parents are the
    /// unordered pair `{first, second}`.
    #[must_use]
    pub fn has_parents(&self, first: &PersonId, second: Option<&PersonId>) -> bool {
        let Self::ParentChild {
            parent,
            other_parent,
            ..
        } = self
        else {
            return false;
        };
        let other_parent = other_parent.as_ref();
        (parent == first && other_parent == second)
            || (second == Some(parent) && other_parent == Some(first))
    }
}

/// A stored tie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tie {
    pub id: i64,
    pub relation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tie_type: Option<String>,
    pub link: TieLink,
    pub created_at_us: i64,
}

impl Tie {
    #[must_use]
    pub const fn kind(&self) -> TieKind {
        self.link.kind()
    }

    /// `true` when `id` occupies any of the three person columns.
    #[must_use]
    pub fn involves(&self, id: &PersonId) -> bool {
        self.link.person_a() == id
            || self.link.person_b() == id
            || self.link.person_c() == Some(id)
    }
}

/// Fields for inserting a tie. The kind comes from the relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTie {
    pub person_a: PersonId,
    pub person_b: PersonId,
    pub person_c: Option<PersonId>,
    pub relation: String,
    pub tie_type: Option<String>,
}

impl NewTie {
    /// Parent-child tie using the seeded `parent` relation.
    #[must_use]
    pub fn child_of(child: &PersonId, parent: &PersonId, other_parent: Option<&PersonId>) -> Self {
        Self {
            person_a: child.clone(),
            person_b: parent.clone(),
            person_c: other_parent.cloned(),
            relation: RELATION_PARENT.to_string(),
            tie_type: None,
        }
    }

    /// Partnership tie using the seeded `partner` relation.
    #[must_use]
    pub fn partners(a: &PersonId, b: &PersonId) -> Self {
        Self {
            person_a: a.clone(),
            person_b: b.clone(),
            person_c: None,
            relation: RELATION_PARTNER.to_string(),
            tie_type: None,
        }
    }

    /// Validate against the relation's kind and produce the link.
    ///
    /// # Errors
    ///
    /// See [`TieLink::from_columns`].
    pub fn link(&self, kind: TieKind) -> Result<TieLink, StoreError> {
        TieLink::from_columns(
            kind,
            self.person_a.clone(),
            self.person_b.clone(),
            self.person_c.clone(),
        )
    }
}

/// Seeded parent-child relation.
pub const RELATION_PARENT: &str = "parent";
/// Seeded partnership relation.
pub const RELATION_PARTNER: &str = "partner";

/// A named tie relation and the kind of every tie that uses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieRelation {
    pub name: String,
    pub kind: TieKind,
    pub removeable: bool,
    pub created_at_us: i64,
}

/// A free-form tie qualifier such as "married" or "divorced".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieType {
    pub name: String,
    pub created_at_us: i64,
}
