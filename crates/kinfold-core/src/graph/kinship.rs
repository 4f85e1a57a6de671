//! Kinship resolution over tie rows.
//!
//! Nothing here is persisted: parents, siblings, partners and children are
//! computed per call from the ties a [`TieStore`] returns.
//!
//! # Query plan
//!
//! Every operation issues one tie query, then resolves all referenced people
//! with a single batched [`TieStore::people`] call and reorders the result to
//! tie-row order. [`Resolver::children`] repeats the sibling query once per
//! partner.
//!
//! # Failure model
//!
//! - A failed store call is [`ResolveError::BackendUnavailable`].
//! - A referenced person that no longer exists is skipped, logged at `warn`,
//!   and reported in the view's `unresolved` list.
//! - Nobody recorded is an empty view, never an error.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kinfold_core::{Resolver, PersonId};
//!
//! let conn = kinfold_core::db::open_store(&path)?;
//! let resolver = Resolver::new(&conn);
//! let parents = resolver.parents(&PersonId::from("p-3f9a01c2b7de"))?;
//! ```

#![allow(clippy::module_name_repetitions)]

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::ResolveError;
use crate::model::person::{Person, PersonId};
use crate::model::tie::TieLink;
use crate::store::{TieFilter, TieStore};

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Parents of a person, one slot per parent-child tie in row order.
///
/// `parent_b[i]` and `parent_c[i]` only line up while every id resolved;
/// skipped ids are listed in `unresolved` instead. Repeated ties repeat
/// their parents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Parents {
    pub parent_b: Vec<Person>,
    pub parent_c: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<PersonId>,
}

impl Parents {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent_b.is_empty() && self.parent_c.is_empty()
    }
}

/// Distinct partners of a person in first-seen tie order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Partners {
    pub partner: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<PersonId>,
}

impl Partners {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partner.is_empty()
    }
}

/// Children shared with one partner.
///
/// `complete` is `false` when the sibling query for this partner failed
/// and `children` was left empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartnerChildren {
    pub partner: Person,
    pub children: Vec<Person>,
    pub complete: bool,
}

/// Children of a person grouped by the partner they were had with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Children {
    pub partners: Vec<PartnerChildren>,
}

impl Children {
    /// `true` when every partner's children were resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.partners.iter().all(|entry| entry.complete)
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.partners.iter().map(|entry| entry.children.len()).sum()
    }
}

/// Siblings through one parent pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiblingSet {
    pub parent: Person,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_parent: Option<Person>,
    pub siblings: Vec<Person>,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Read-only kinship queries against an injected store.
#[derive(Debug)]
pub struct Resolver<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: TieStore + ?Sized> Resolver<'s, S> {
    pub const fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Parents of `id` from every parent-child tie naming it as the child.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::BackendUnavailable`] when a store call fails.
    #[instrument(skip(self))]
    pub fn parents(&self, id: &PersonId) -> Result<Parents, ResolveError> {
        let ties = self
            .store
            .ties(&TieFilter::Subject(id.clone()))
            .map_err(ResolveError::backend("parents"))?;

        let slots: Vec<(&PersonId, Option<&PersonId>)> = ties
            .iter()
            .filter_map(|tie| match &tie.link {
                TieLink::ParentChild {
                    parent,
                    other_parent,
                    ..
                } => Some((parent, other_parent.as_ref())),
                TieLink::Partnership { .. } => None,
            })
            .collect();

        let wanted = slots.iter().flat_map(|(b, c)| std::iter::once(*b).chain(*c));
        let found = self.fetch(wanted, "parents")?;

        let mut parents = Parents::default();
        for (b, c) in slots {
            match found.get(b) {
                Some(person) => parents.parent_b.push(person.clone()),
                None => parents.unresolved.push(b.clone()),
            }
            if let Some(c) = c {
                match found.get(c) {
                    Some(person) => parents.parent_c.push(person.clone()),
                    None => parents.unresolved.push(c.clone()),
                }
            }
        }

        note_unresolved("parents", id, &parents.unresolved);
        debug!(
            parent_b = parents.parent_b.len(),
            parent_c = parents.parent_c.len(),
            "resolved parents"
        );
        Ok(parents)
    }

    /// Other children of the unordered parent pair `{parent_b, parent_c}`,
    /// excluding `id` itself.
    ///
    /// Argument order of the two parents never changes the result. Each
    /// sibling appears once even when duplicate ties record them.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::BackendUnavailable`] when a store call fails.
    #[instrument(skip(self, parent_b, parent_c), fields(parent_b = %parent_b.id))]
    pub fn siblings(
        &self,
        id: &PersonId,
        parent_b: &Person,
        parent_c: Option<&Person>,
    ) -> Result<Vec<Person>, ResolveError> {
        let first = &parent_b.id;
        let second = parent_c.map(|p| &p.id);
        let ties = self
            .store
            .ties(&TieFilter::Pair {
                first: first.clone(),
                second: second.cloned(),
                exclude: Some(id.clone()),
            })
            .map_err(ResolveError::backend("siblings"))?;

        let mut seen = HashSet::new();
        let order: Vec<&PersonId> = ties
            .iter()
            .filter(|tie| tie.link.has_parents(first, second))
            .map(|tie| tie.link.person_a())
            .filter(|child| *child != id && seen.insert(*child))
            .collect();

        let found = self.fetch(order.iter().copied(), "siblings")?;
        let (siblings, unresolved) = in_order(&order, &found);

        note_unresolved("siblings", id, &unresolved);
        debug!(siblings = siblings.len(), "resolved siblings");
        Ok(siblings)
    }

    /// Distinct partners of `id`: co-parents from parent-child ties and the
    /// other half of every partnership tie.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::BackendUnavailable`] when a store call fails.
    #[instrument(skip(self))]
    pub fn partners(&self, id: &PersonId) -> Result<Partners, ResolveError> {
        let ties = self
            .store
            .ties(&TieFilter::Involving(id.clone()))
            .map_err(ResolveError::backend("partners"))?;

        let mut seen = HashSet::new();
        let order: Vec<&PersonId> = ties
            .iter()
            .filter_map(|tie| tie.link.partner_of(id))
            .filter(|partner| seen.insert(*partner))
            .collect();

        let found = self.fetch(order.iter().copied(), "partners")?;
        let (partner, unresolved) = in_order(&order, &found);

        note_unresolved("partners", id, &unresolved);
        debug!(partners = partner.len(), "resolved partners");
        Ok(Partners {
            partner,
            unresolved,
        })
    }

    /// Children of `id`, grouped per partner.
    ///
    /// A failed sibling query for one partner leaves that entry empty and
    /// marked incomplete; the other partners still resolve.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::BackendUnavailable`] when the partner or
    /// caller lookup fails, and [`ResolveError::NotFound`] when `id` itself
    /// does not exist.
    #[instrument(skip(self))]
    pub fn children(&self, id: &PersonId) -> Result<Children, ResolveError> {
        let partners = self.partners(id)?;
        let caller = self
            .store
            .person(id)
            .map_err(ResolveError::backend("children"))?
            .ok_or_else(|| ResolveError::NotFound(id.clone()))?;

        let mut children = Children::default();
        for partner in partners.partner {
            let entry = match self.siblings(id, &caller, Some(&partner)) {
                Ok(kids) => PartnerChildren {
                    partner,
                    children: kids,
                    complete: true,
                },
                Err(error) => {
                    warn!(
                        person = %id,
                        partner = %partner.id,
                        "children with partner unavailable: {error}"
                    );
                    PartnerChildren {
                        partner,
                        children: Vec::new(),
                        complete: false,
                    }
                }
            };
            children.partners.push(entry);
        }

        debug!(
            partners = children.partners.len(),
            children = children.child_count(),
            "resolved children"
        );
        Ok(children)
    }

    /// Siblings of `id` through each distinct parent pair it has.
    ///
    /// Pairs whose parents no longer resolve are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::BackendUnavailable`] when a store call fails.
    #[instrument(skip(self))]
    pub fn siblings_of(&self, id: &PersonId) -> Result<Vec<SiblingSet>, ResolveError> {
        let ties = self
            .store
            .ties(&TieFilter::Subject(id.clone()))
            .map_err(ResolveError::backend("siblings"))?;

        let mut seen = HashSet::new();
        let pairs: Vec<(&PersonId, Option<&PersonId>)> = ties
            .iter()
            .filter_map(|tie| match &tie.link {
                TieLink::ParentChild {
                    parent,
                    other_parent,
                    ..
                } => Some((parent, other_parent.as_ref())),
                TieLink::Partnership { .. } => None,
            })
            .filter(|(b, c)| seen.insert(pair_key(*b, *c)))
            .collect();

        let wanted = pairs.iter().flat_map(|(b, c)| std::iter::once(*b).chain(*c));
        let found = self.fetch(wanted, "siblings")?;

        let mut sets = Vec::with_capacity(pairs.len());
        for (b, c) in pairs {
            let Some(parent) = found.get(b) else {
                note_unresolved("siblings", id, std::slice::from_ref(b));
                continue;
            };
            let other_parent = match c {
                Some(c) => match found.get(c) {
                    Some(person) => Some(person),
                    None => {
                        note_unresolved("siblings", id, std::slice::from_ref(c));
                        continue;
                    }
                },
                None => None,
            };
            let siblings = self.siblings(id, parent, other_parent)?;
            sets.push(SiblingSet {
                parent: parent.clone(),
                other_parent: other_parent.cloned(),
                siblings,
            });
        }
        Ok(sets)
    }

    /// One batched lookup for every distinct id in `ids`.
    fn fetch<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a PersonId>,
        operation: &'static str,
    ) -> Result<HashMap<PersonId, Person>, ResolveError> {
        let mut seen = HashSet::new();
        let ids: Vec<PersonId> = ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let people = self
            .store
            .people(&ids)
            .map_err(ResolveError::backend(operation))?;
        Ok(people.into_iter().map(|p| (p.id.clone(), p)).collect())
    }
}

/// Reorder fetched people to `order`, splitting out ids that did not resolve.
fn in_order(
    order: &[&PersonId],
    found: &HashMap<PersonId, Person>,
) -> (Vec<Person>, Vec<PersonId>) {
    let mut resolved = Vec::with_capacity(order.len());
    let mut unresolved = Vec::new();
    for id in order {
        match found.get(*id) {
            Some(person) => resolved.push(person.clone()),
            None => unresolved.push((*id).clone()),
        }
    }
    (resolved, unresolved)
}

fn pair_key<'a>(
    b: &'a PersonId,
    c: Option<&'a PersonId>,
) -> (&'a PersonId, Option<&'a PersonId>) {
    match c {
        Some(c) if c < b => (c, Some(b)),
        _ => (b, c),
    }
}

fn note_unresolved(operation: &str, origin: &PersonId, missing: &[PersonId]) {
    for id in missing {
        warn!(operation, person = %origin, missing = %id, "tie references unknown person");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tie::NewTie;
    use crate::store::memory::{FailOn, MemoryStore};

    fn ids(people: &[Person]) -> Vec<&str> {
        people.iter().map(|p| p.id.as_str()).collect()
    }

    fn child_of(store: &MemoryStore, child: &str, parent: &str, other: Option<&str>) {
        let other = other.map(PersonId::from);
        store
            .insert_tie(&NewTie::child_of(
                &child.into(),
                &parent.into(),
                other.as_ref(),
            ))
            .unwrap();
    }

    /// M and F with children C1 and C2.
    fn nuclear_family() -> MemoryStore {
        let store = MemoryStore::new();
        for id in ["m", "f", "c1", "c2"] {
            store.add_named(id);
        }
        child_of(&store, "c1", "m", Some("f"));
        child_of(&store, "c2", "m", Some("f"));
        store
    }

    // -----------------------------------------------------------------------
    // Parents
    // -----------------------------------------------------------------------

    #[test]
    fn parents_without_ties_is_empty_not_error() {
        let store = MemoryStore::new();
        store.add_named("loner");
        let parents = Resolver::new(&store).parents(&"loner".into()).unwrap();
        assert!(parents.is_empty());
        assert!(parents.unresolved.is_empty());
    }

    #[test]
    fn parents_of_unknown_person_is_empty() {
        let store = nuclear_family();
        let parents = Resolver::new(&store).parents(&"ghost".into()).unwrap();
        assert_eq!(parents, Parents::default());
    }

    #[test]
    fn parents_resolves_both_slots() {
        let store = nuclear_family();
        let parents = Resolver::new(&store).parents(&"c1".into()).unwrap();
        assert_eq!(ids(&parents.parent_b), ["m"]);
        assert_eq!(ids(&parents.parent_c), ["f"]);
    }

    #[test]
    fn parents_keeps_row_order_and_repeats() {
        let store = nuclear_family();
        store.add_named("step");
        child_of(&store, "c1", "step", None);
        child_of(&store, "c1", "m", Some("f"));

        let parents = Resolver::new(&store).parents(&"c1".into()).unwrap();
        assert_eq!(ids(&parents.parent_b), ["m", "step", "m"]);
        assert_eq!(ids(&parents.parent_c), ["f", "f"]);
    }

    #[test]
    fn parents_skips_missing_parent_and_reports_it() {
        let store = nuclear_family();
        store.forget_person(&"f".into());

        let parents = Resolver::new(&store).parents(&"c1".into()).unwrap();
        assert_eq!(ids(&parents.parent_b), ["m"]);
        assert!(parents.parent_c.is_empty());
        assert_eq!(parents.unresolved, vec![PersonId::from("f")]);
    }

    #[test]
    fn parents_ignores_partnership_ties() {
        let store = nuclear_family();
        store
            .insert_tie(&NewTie::partners(&"c1".into(), &"c2".into()))
            .unwrap();
        let parents = Resolver::new(&store).parents(&"c1".into()).unwrap();
        assert_eq!(ids(&parents.parent_b), ["m"]);
    }

    #[test]
    fn parents_uses_one_tie_query_and_one_batched_lookup() {
        let store = nuclear_family();
        store.add_named("step");
        child_of(&store, "c1", "step", None);
        let before = store.calls();
        Resolver::new(&store).parents(&"c1".into()).unwrap();
        assert_eq!(store.calls() - before, 2);
    }

    #[test]
    fn empty_views_skip_the_person_lookup() {
        let store = MemoryStore::new();
        store.add_named("loner");
        Resolver::new(&store).partners(&"loner".into()).unwrap();
        assert_eq!(store.calls(), 1);
    }

    #[test]
    fn parents_backend_failure_is_distinct_from_empty() {
        let store = nuclear_family();
        store.fail(FailOn::TieQuery);
        let err = Resolver::new(&store).parents(&"c1".into()).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::BackendUnavailable {
                operation: "parents",
                ..
            }
        ));
    }

    #[test]
    fn parents_lookup_failure_is_backend_error() {
        let store = nuclear_family();
        store.fail(FailOn::PersonLookup);
        let err = Resolver::new(&store).parents(&"c1".into()).unwrap_err();
        assert!(matches!(err, ResolveError::BackendUnavailable { .. }));
    }

    // -----------------------------------------------------------------------
    // Siblings
    // -----------------------------------------------------------------------

    fn person(store: &MemoryStore, id: &str) -> Person {
        store.person(&id.into()).unwrap().unwrap()
    }

    #[test]
    fn siblings_excludes_self() {
        let store = nuclear_family();
        let (m, f) = (person(&store, "m"), person(&store, "f"));
        let siblings = Resolver::new(&store)
            .siblings(&"c1".into(), &m, Some(&f))
            .unwrap();
        assert_eq!(ids(&siblings), ["c2"]);
    }

    #[test]
    fn siblings_are_symmetric_in_parent_order() {
        let store = nuclear_family();
        store.add_named("c3");
        child_of(&store, "c3", "f", Some("m"));
        let (m, f) = (person(&store, "m"), person(&store, "f"));
        let resolver = Resolver::new(&store);

        let forward = resolver.siblings(&"c1".into(), &m, Some(&f)).unwrap();
        let reverse = resolver.siblings(&"c1".into(), &f, Some(&m)).unwrap();
        assert_eq!(ids(&forward), ["c2", "c3"]);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn siblings_dedupe_reversed_duplicate_rows() {
        let store = nuclear_family();
        child_of(&store, "c2", "f", Some("m"));
        let (m, f) = (person(&store, "m"), person(&store, "f"));

        let siblings = Resolver::new(&store)
            .siblings(&"c1".into(), &m, Some(&f))
            .unwrap();
        assert_eq!(ids(&siblings), ["c2"]);
    }

    #[test]
    fn half_siblings_are_not_full_siblings() {
        let store = nuclear_family();
        store.add_named("other");
        store.add_named("half");
        child_of(&store, "half", "m", Some("other"));
        let (m, f) = (person(&store, "m"), person(&store, "f"));

        let siblings = Resolver::new(&store)
            .siblings(&"c1".into(), &m, Some(&f))
            .unwrap();
        assert_eq!(ids(&siblings), ["c2"]);
    }

    #[test]
    fn single_parent_siblings() {
        let store = MemoryStore::new();
        for id in ["mum", "a", "b", "dad"] {
            store.add_named(id);
        }
        child_of(&store, "a", "mum", None);
        child_of(&store, "b", "mum", None);
        child_of(&store, "dad", "mum", Some("a"));
        let mum = person(&store, "mum");

        let siblings = Resolver::new(&store)
            .siblings(&"a".into(), &mum, None)
            .unwrap();
        assert_eq!(ids(&siblings), ["b"]);
    }

    #[test]
    fn siblings_empty_when_only_child() {
        let store = MemoryStore::new();
        for id in ["m", "f", "only"] {
            store.add_named(id);
        }
        child_of(&store, "only", "m", Some("f"));
        let (m, f) = (person(&store, "m"), person(&store, "f"));
        let siblings = Resolver::new(&store)
            .siblings(&"only".into(), &m, Some(&f))
            .unwrap();
        assert!(siblings.is_empty());
    }

    #[test]
    fn siblings_failure_is_backend_error() {
        let store = nuclear_family();
        let (m, f) = (person(&store, "m"), person(&store, "f"));
        store.fail(FailOn::TieQuery);
        let err = Resolver::new(&store)
            .siblings(&"c1".into(), &m, Some(&f))
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::BackendUnavailable {
                operation: "siblings",
                ..
            }
        ));
    }

    #[test]
    fn siblings_of_groups_by_parent_pair() {
        let store = nuclear_family();
        store.add_named("step");
        store.add_named("half");
        child_of(&store, "c1", "step", None);
        child_of(&store, "half", "step", None);
        // Same pair again, reversed: must not produce a second set.
        child_of(&store, "c1", "f", Some("m"));

        let sets = Resolver::new(&store).siblings_of(&"c1".into()).unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].parent.id.as_str(), "m");
        assert_eq!(
            sets[0].other_parent.as_ref().map(|p| p.id.as_str()),
            Some("f")
        );
        assert_eq!(ids(&sets[0].siblings), ["c2"]);
        assert_eq!(sets[1].parent.id.as_str(), "step");
        assert!(sets[1].other_parent.is_none());
        assert_eq!(ids(&sets[1].siblings), ["half"]);
    }

    #[test]
    fn siblings_of_skips_pairs_with_missing_parent() {
        let store = nuclear_family();
        store.forget_person(&"f".into());
        let sets = Resolver::new(&store).siblings_of(&"c1".into()).unwrap();
        assert!(sets.is_empty());
    }

    // -----------------------------------------------------------------------
    // Partners
    // -----------------------------------------------------------------------

    #[test]
    fn partners_dedupes_across_children() {
        let store = nuclear_family();
        let partners = Resolver::new(&store).partners(&"m".into()).unwrap();
        assert_eq!(ids(&partners.partner), ["f"]);
    }

    #[test]
    fn partners_found_from_either_column() {
        let store = nuclear_family();
        let partners = Resolver::new(&store).partners(&"f".into()).unwrap();
        assert_eq!(ids(&partners.partner), ["m"]);
    }

    #[test]
    fn partners_include_explicit_partnerships_and_keep_order() {
        let store = nuclear_family();
        store.add_named("second");
        store.add_named("third");
        store
            .insert_tie(&NewTie::partners(&"second".into(), &"m".into()))
            .unwrap();
        store
            .insert_tie(&NewTie::partners(&"m".into(), &"third".into()))
            .unwrap();
        store
            .insert_tie(&NewTie::partners(&"m".into(), &"f".into()))
            .unwrap();

        let partners = Resolver::new(&store).partners(&"m".into()).unwrap();
        assert_eq!(ids(&partners.partner), ["f", "second", "third"]);
    }

    #[test]
    fn child_has_no_partner_through_parent_ties() {
        let store = nuclear_family();
        let partners = Resolver::new(&store).partners(&"c1".into()).unwrap();
        assert!(partners.is_empty());
    }

    #[test]
    fn single_parent_tie_yields_no_partner() {
        let store = MemoryStore::new();
        store.add_named("mum");
        store.add_named("kid");
        child_of(&store, "kid", "mum", None);
        let partners = Resolver::new(&store).partners(&"mum".into()).unwrap();
        assert!(partners.is_empty());
        assert!(partners.unresolved.is_empty());
    }

    #[test]
    fn partners_reports_missing_partner() {
        let store = nuclear_family();
        store.forget_person(&"f".into());
        let partners = Resolver::new(&store).partners(&"m".into()).unwrap();
        assert!(partners.partner.is_empty());
        assert_eq!(partners.unresolved, vec![PersonId::from("f")]);
    }

    // -----------------------------------------------------------------------
    // Children
    // -----------------------------------------------------------------------

    #[test]
    fn children_grouped_per_partner() {
        let store = nuclear_family();
        store.add_named("second");
        store.add_named("c3");
        child_of(&store, "c3", "second", Some("m"));

        let children = Resolver::new(&store).children(&"m".into()).unwrap();
        assert_eq!(children.partners.len(), 2);
        assert_eq!(children.partners[0].partner.id.as_str(), "f");
        assert_eq!(ids(&children.partners[0].children), ["c1", "c2"]);
        assert_eq!(children.partners[1].partner.id.as_str(), "second");
        assert_eq!(ids(&children.partners[1].children), ["c3"]);
        assert!(children.is_complete());
        assert_eq!(children.child_count(), 3);
    }

    #[test]
    fn children_include_childless_partnerships() {
        let store = nuclear_family();
        store.add_named("new");
        store
            .insert_tie(&NewTie::partners(&"m".into(), &"new".into()))
            .unwrap();
        let children = Resolver::new(&store).children(&"m".into()).unwrap();
        let last = children.partners.last().unwrap();
        assert_eq!(last.partner.id.as_str(), "new");
        assert!(last.children.is_empty());
        assert!(last.complete);
    }

    #[test]
    fn children_match_siblings_for_each_partner() {
        let store = nuclear_family();
        let resolver = Resolver::new(&store);
        let me = person(&store, "m");
        let partners = resolver.partners(&"m".into()).unwrap();
        let children = resolver.children(&"m".into()).unwrap();

        assert_eq!(children.partners.len(), partners.partner.len());
        for (entry, partner) in children.partners.iter().zip(&partners.partner) {
            let expected = resolver
                .siblings(&"m".into(), &me, Some(partner))
                .unwrap();
            assert_eq!(entry.children, expected);
        }
    }

    #[test]
    fn children_of_missing_person_is_not_found() {
        let store = nuclear_family();
        store.forget_person(&"m".into());
        let err = Resolver::new(&store).children(&"m".into()).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(id) if id.as_str() == "m"));
    }

    #[test]
    fn children_partial_failure_keeps_other_partners() {
        let store = nuclear_family();
        store.add_named("second");
        store.add_named("c3");
        child_of(&store, "c3", "second", Some("m"));
        store.fail(FailOn::PairWith("f".into()));

        let children = Resolver::new(&store).children(&"m".into()).unwrap();
        assert_eq!(children.partners.len(), 2);
        assert!(!children.partners[0].complete);
        assert!(children.partners[0].children.is_empty());
        assert!(children.partners[1].complete);
        assert_eq!(ids(&children.partners[1].children), ["c3"]);
        assert!(!children.is_complete());
    }

    #[test]
    fn children_partner_query_failure_propagates() {
        let store = nuclear_family();
        store.fail(FailOn::TieQuery);
        let err = Resolver::new(&store).children(&"m".into()).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::BackendUnavailable {
                operation: "partners",
                ..
            }
        ));
    }

    #[test]
    fn views_serialize_with_expected_keys() {
        let store = nuclear_family();
        let resolver = Resolver::new(&store);
        let parents = serde_json::to_value(resolver.parents(&"c1".into()).unwrap()).unwrap();
        assert!(parents.get("parent_b").is_some());
        assert!(parents.get("parent_c").is_some());
        assert!(parents.get("unresolved").is_none());

        let children = serde_json::to_value(resolver.children(&"m".into()).unwrap()).unwrap();
        assert_eq!(children["partners"][0]["partner"]["id"], "f");
        assert_eq!(children["partners"][0]["children"][1]["id"], "c2");
    }

    #[test]
    fn pair_key_is_order_independent() {
        let (a, b) = (PersonId::from("a"), PersonId::from("b"));
        assert_eq!(pair_key(&a, Some(&b)), pair_key(&b, Some(&a)));
        assert_ne!(pair_key(&a, None), pair_key(&a, Some(&b)));
    }
}
