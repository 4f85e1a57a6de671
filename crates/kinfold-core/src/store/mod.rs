//! Data-access seam between the kinship resolver and a record backend.
//!
//! The resolver only needs four capabilities: look one person up, look many
//! people up at once, query ties with a small predicate language, and insert
//! a tie. [`TieStore`] names them; `rusqlite::Connection` implements it in
//! [`crate::db::query`], and [`memory::MemoryStore`] implements it in memory
//! for tests and fixtures.

pub mod memory;

use crate::error::StoreError;
use crate::model::person::{Person, PersonId};
use crate::model::tie::{NewTie, Tie, TieKind};

/// Column-level tie predicate.
///
/// Only [`TieFilter::Pair`] looks at the relation kind; the other variants
/// match every kind and callers inspect [`Tie::link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TieFilter {
    /// `person_a = id`.
    Subject(PersonId),
    /// `id` appears in any of the three person columns.
    Involving(PersonId),
    /// Parent-child rows whose `(person_b, person_c)` equals
    /// `(first, second)` in either order. Partnership rows never match.
    ///
    /// With `second = None` only `person_b = first AND person_c IS NULL`
    /// matches. Rows whose `person_a` equals `exclude` are dropped.
    Pair {
        first: PersonId,
        second: Option<PersonId>,
        exclude: Option<PersonId>,
    },
}

impl TieFilter {
    /// Evaluate the predicate against an in-memory tie.
    #[must_use]
    pub fn matches(&self, tie: &Tie) -> bool {
        let link = &tie.link;
        match self {
            Self::Subject(id) => link.person_a() == id,
            Self::Involving(id) => tie.involves(id),
            Self::Pair {
                first,
                second,
                exclude,
            } => {
                if link.kind() != TieKind::ParentChild
                    || exclude.as_ref() == Some(link.person_a())
                {
                    return false;
                }
                let second = second.as_ref();
                let forward = link.person_b() == first && link.person_c() == second;
                let reverse = second == Some(link.person_b()) && link.person_c() == Some(first);
                forward || reverse
            }
        }
    }
}

/// Record backend consumed by [`crate::graph::kinship::Resolver`].
pub trait TieStore {
    /// Fetch one person by id. A missing person is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend call fails.
    fn person(&self, id: &PersonId) -> Result<Option<Person>, StoreError>;

    /// Fetch every person whose id is in `ids`, in any order. Missing ids are
    /// absent from the result; duplicates in `ids` are allowed.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend call fails.
    fn people(&self, ids: &[PersonId]) -> Result<Vec<Person>, StoreError>;

    /// Query ties matching `filter`, ordered by tie id.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend call fails.
    fn ties(&self, filter: &TieFilter) -> Result<Vec<Tie>, StoreError>;

    /// Insert a tie and return the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the tie breaks its relation's
    /// shape rules, or a backend error.
    fn insert_tie(&self, tie: &NewTie) -> Result<Tie, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::TieFilter;
    use crate::model::person::PersonId;
    use crate::model::tie::{Tie, TieKind, TieLink};

    fn tie(kind: TieKind, a: &str, b: &str, c: Option<&str>) -> Tie {
        Tie {
            id: 1,
            relation: "parent".into(),
            tie_type: None,
            link: TieLink::from_columns(kind, a.into(), b.into(), c.map(PersonId::from)).unwrap(),
            created_at_us: 0,
        }
    }

    fn pair(first: &str, second: Option<&str>, exclude: Option<&str>) -> TieFilter {
        TieFilter::Pair {
            first: first.into(),
            second: second.map(PersonId::from),
            exclude: exclude.map(PersonId::from),
        }
    }

    #[test]
    fn subject_matches_person_a_only() {
        let t = tie(TieKind::ParentChild, "c", "m", Some("f"));
        assert!(TieFilter::Subject("c".into()).matches(&t));
        assert!(!TieFilter::Subject("m".into()).matches(&t));
    }

    #[test]
    fn involving_matches_any_column() {
        let t = tie(TieKind::ParentChild, "c", "m", Some("f"));
        for id in ["c", "m", "f"] {
            assert!(TieFilter::Involving(id.into()).matches(&t), "{id}");
        }
        assert!(!TieFilter::Involving("x".into()).matches(&t));
    }

    #[test]
    fn pair_matches_both_orders_and_honours_exclude() {
        let t = tie(TieKind::ParentChild, "c", "m", Some("f"));
        assert!(pair("m", Some("f"), None).matches(&t));
        assert!(pair("f", Some("m"), None).matches(&t));
        assert!(!pair("m", Some("f"), Some("c")).matches(&t));
        assert!(!pair("m", None, None).matches(&t));
    }

    #[test]
    fn pair_without_second_matches_single_parent_rows() {
        let t = tie(TieKind::ParentChild, "c", "m", None);
        assert!(pair("m", None, None).matches(&t));
        assert!(!pair("m", Some("f"), None).matches(&t));
    }

    #[test]
    fn pair_skips_partnership_rows() {
        let union = tie(TieKind::Partnership, "x", "m", None);
        assert!(!pair("m", None, None).matches(&union));
        assert!(!pair("x", None, None).matches(&union));
        assert!(TieFilter::Involving("m".into()).matches(&union));
    }
}
