//! In-memory [`TieStore`] with failure injection.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};

use super::{TieFilter, TieStore};
use crate::error::StoreError;
use crate::model::person::{NewPerson, Person, PersonId};
use crate::model::tie::{NewTie, RELATION_PARENT, RELATION_PARTNER, Tie, TieKind};

/// Which store calls should fail with [`StoreError::Unavailable`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailOn {
    /// Single and batched person lookups.
    PersonLookup,
    /// Every tie query.
    TieQuery,
    /// Pair queries naming this person as either parent.
    PairWith(PersonId),
    Insert,
}

/// Store backed by ordinary collections.
///
/// Relations default to the same four the SQLite schema seeds. Timestamps
/// come from a counter so fixtures are deterministic.
#[derive(Debug)]
pub struct MemoryStore {
    people: RefCell<BTreeMap<PersonId, Person>>,
    ties: RefCell<Vec<Tie>>,
    relations: RefCell<BTreeMap<String, TieKind>>,
    failures: RefCell<HashSet<FailOn>>,
    clock: Cell<i64>,
    calls: Cell<usize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let relations = [
            (RELATION_PARENT, TieKind::ParentChild),
            ("adoptive", TieKind::ParentChild),
            (RELATION_PARTNER, TieKind::Partnership),
            ("spouse", TieKind::Partnership),
        ]
        .into_iter()
        .map(|(name, kind)| (name.to_string(), kind))
        .collect();

        Self {
            people: RefCell::default(),
            ties: RefCell::default(),
            relations: RefCell::new(relations),
            failures: RefCell::default(),
            clock: Cell::new(0),
            calls: Cell::new(0),
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&self) -> i64 {
        let next = self.clock.get() + 1;
        self.clock.set(next);
        next
    }

    fn record_call(&self) {
        self.calls.set(self.calls.get() + 1);
    }

    fn check(&self, fail: &FailOn) -> Result<(), StoreError> {
        if self.failures.borrow().contains(fail) {
            return Err(StoreError::Unavailable(format!("injected failure: {fail:?}")));
        }
        Ok(())
    }

    /// Add a person and return the stored record.
    pub fn add_person(&self, new: NewPerson) -> Person {
        let now = self.tick();
        let id = new
            .id
            .unwrap_or_else(|| PersonId::generate(&new.first_name, &new.last_name, now));
        let person = Person {
            id: id.clone(),
            first_name: new.first_name,
            middle_name: new.middle_name,
            last_name: new.last_name,
            maiden_name: new.maiden_name,
            alias: new.alias,
            sex: new.sex,
            born: new.born,
            died: new.died,
            email: new.email,
            phone_number: new.phone_number,
            created_at_us: now,
            updated_at_us: now,
        };
        self.people.borrow_mut().insert(id, person.clone());
        person
    }

    /// Add a person with a fixed id and a first name equal to it.
    pub fn add_named(&self, id: &str) -> Person {
        self.add_person(NewPerson {
            id: Some(PersonId::from(id)),
            ..NewPerson::named(id, "Test")
        })
    }

    /// Remove a person without touching ties that reference them.
    pub fn forget_person(&self, id: &PersonId) -> Option<Person> {
        self.people.borrow_mut().remove(id)
    }

    /// Register an extra relation name.
    pub fn add_relation(&self, name: &str, kind: TieKind) {
        self.relations.borrow_mut().insert(name.to_string(), kind);
    }

    /// Make matching calls fail until [`MemoryStore::heal`] is called.
    pub fn fail(&self, on: FailOn) {
        self.failures.borrow_mut().insert(on);
    }

    pub fn heal(&self) {
        self.failures.borrow_mut().clear();
    }

    /// Number of store calls served so far, including failed ones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl TieStore for MemoryStore {
    fn person(&self, id: &PersonId) -> Result<Option<Person>, StoreError> {
        self.record_call();
        self.check(&FailOn::PersonLookup)?;
        Ok(self.people.borrow().get(id).cloned())
    }

    fn people(&self, ids: &[PersonId]) -> Result<Vec<Person>, StoreError> {
        self.record_call();
        self.check(&FailOn::PersonLookup)?;
        let wanted: HashSet<&PersonId> = ids.iter().collect();
        Ok(self
            .people
            .borrow()
            .values()
            .filter(|p| wanted.contains(&p.id))
            .cloned()
            .collect())
    }

    fn ties(&self, filter: &TieFilter) -> Result<Vec<Tie>, StoreError> {
        self.record_call();
        self.check(&FailOn::TieQuery)?;
        if let TieFilter::Pair { first, second, .. } = filter {
            self.check(&FailOn::PairWith(first.clone()))?;
            if let Some(second) = second {
                self.check(&FailOn::PairWith(second.clone()))?;
            }
        }
        // Vec order is insertion order, which is tie id order.
        Ok(self
            .ties
            .borrow()
            .iter()
            .filter(|tie| filter.matches(tie))
            .cloned()
            .collect())
    }

    fn insert_tie(&self, tie: &NewTie) -> Result<Tie, StoreError> {
        self.record_call();
        self.check(&FailOn::Insert)?;
        let kind = self
            .relations
            .borrow()
            .get(&tie.relation)
            .copied()
            .ok_or_else(|| StoreError::Invalid(format!("unknown tie relation '{}'", tie.relation)))?;
        let link = tie.link(kind)?;

        let mut ties = self.ties.borrow_mut();
        let id = ties.last().map_or(1, |last| last.id + 1);
        let stored = Tie {
            id,
            relation: tie.relation.clone(),
            tie_type: tie.tie_type.clone(),
            link,
            created_at_us: self.tick(),
        };
        ties.push(stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_ties_get_increasing_ids() {
        let store = MemoryStore::new();
        let m = store.add_named("m");
        let f = store.add_named("f");
        let c = store.add_named("c");

        let first = store
            .insert_tie(&NewTie::child_of(&c.id, &m.id, Some(&f.id)))
            .unwrap();
        let second = store.insert_tie(&NewTie::partners(&m.id, &f.id)).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(second.kind(), TieKind::Partnership);
    }

    #[test]
    fn unknown_relation_is_invalid() {
        let store = MemoryStore::new();
        let mut tie = NewTie::partners(&"a".into(), &"b".into());
        tie.relation = "nemesis".into();
        assert!(matches!(store.insert_tie(&tie), Err(StoreError::Invalid(_))));

        store.add_relation("nemesis", TieKind::Partnership);
        assert!(store.insert_tie(&tie).is_ok());
    }

    #[test]
    fn injected_failures_until_healed() {
        let store = MemoryStore::new();
        store.add_named("a");
        store.fail(FailOn::PersonLookup);
        assert!(matches!(
            store.person(&"a".into()),
            Err(StoreError::Unavailable(_))
        ));
        store.heal();
        assert!(store.person(&"a".into()).unwrap().is_some());
        assert_eq!(store.calls(), 2);
    }

    #[test]
    fn people_skips_missing_ids() {
        let store = MemoryStore::new();
        store.add_named("a");
        store.add_named("b");
        let found = store
            .people(&["a".into(), "zzz".into(), "a".into()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "a");
    }
}
