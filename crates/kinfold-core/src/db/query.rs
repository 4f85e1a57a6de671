//! Query helpers for the family tree store.
//!
//! Public functions take a shared `&Connection` and return `anyhow::Result`
//! with typed records. The same statements back the [`TieStore`] impl for
//! `Connection`, which reports [`StoreError`] instead so the resolver can
//! tell a failed backend apart from an empty answer.

use anyhow::{Context, Result, bail};
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, params, params_from_iter};
use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::error::StoreError;
use crate::model::person::{NewPerson, Person, PersonId, PersonUpdate, Sex};
use crate::model::tie::{NewTie, Tie, TieKind, TieLink, TieRelation, TieType};
use crate::store::{TieFilter, TieStore};

/// Largest number of ids bound into one `IN (...)` list.
pub const LOOKUP_CHUNK: usize = 500;

const PERSON_COLUMNS: &str = "person_id, first_name, middle_name, last_name, maiden_name, \
     alias, sex, born, died, email, phone_number, created_at_us, updated_at_us";

const TIE_SELECT: &str = "SELECT t.tie_id, t.person_a, t.person_b, t.person_c, t.tie_relation, \
     t.tie_type, t.created_at_us, r.kind \
     FROM tie t JOIN tie_relation r ON r.tie_relation = t.tie_relation";

// ---------------------------------------------------------------------------
// Sorting and filters
// ---------------------------------------------------------------------------

/// Sort column for person listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersonSort {
    #[default]
    FirstName,
    LastName,
    Born,
    Created,
}

impl PersonSort {
    const fn column(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Born => "born",
            Self::Created => "created_at_us",
        }
    }
}

impl fmt::Display for PersonSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstName => f.write_str("first_name"),
            Self::LastName => f.write_str("last_name"),
            Self::Born => f.write_str("born"),
            Self::Created => f.write_str("created"),
        }
    }
}

impl FromStr for PersonSort {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_name" | "first-name" | "first" | "name" => Ok(Self::FirstName),
            "last_name" | "last-name" | "last" | "surname" => Ok(Self::LastName),
            "born" | "birth" | "age" => Ok(Self::Born),
            "created" | "created_at" | "newest" => Ok(Self::Created),
            other => bail!(
                "unknown sort column '{other}': expected one of first_name, last_name, born, created"
            ),
        }
    }
}

/// Filter criteria for person listings.
#[derive(Debug, Clone)]
pub struct PersonFilter {
    /// Case-insensitive substring matched against every name column and alias.
    pub search: Option<String>,
    pub sort: PersonSort,
    pub ascending: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Default for PersonFilter {
    fn default() -> Self {
        Self {
            search: None,
            sort: PersonSort::default(),
            ascending: true,
            limit: None,
            offset: None,
        }
    }
}

fn limit_clause(limit: Option<u32>, offset: Option<u32>) -> String {
    match (limit, offset) {
        (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
        (Some(limit), None) => format!(" LIMIT {limit}"),
        (None, Some(offset)) => format!(" LIMIT -1 OFFSET {offset}"),
        (None, None) => String::new(),
    }
}

fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

// ---------------------------------------------------------------------------
// People
// ---------------------------------------------------------------------------

/// Insert a person, generating an id when none is supplied.
///
/// # Errors
///
/// Returns an error if the id is already taken or the insert fails.
pub fn insert_person(conn: &Connection, new: &NewPerson) -> Result<Person> {
    let now = now_us();
    let id = new
        .id
        .clone()
        .unwrap_or_else(|| PersonId::generate(&new.first_name, &new.last_name, now));

    let person = Person {
        id,
        first_name: new.first_name.clone(),
        middle_name: new.middle_name.clone(),
        last_name: new.last_name.clone(),
        maiden_name: new.maiden_name.clone(),
        alias: new.alias.clone(),
        sex: new.sex,
        born: new.born,
        died: new.died,
        email: new.email.clone(),
        phone_number: new.phone_number.clone(),
        created_at_us: now,
        updated_at_us: now,
    };

    conn.execute(
        &format!(
            "INSERT INTO person ({PERSON_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            person.id,
            person.first_name,
            person.middle_name,
            person.last_name,
            person.maiden_name,
            person.alias,
            person.sex.as_str(),
            person.born,
            person.died,
            person.email,
            person.phone_number,
            person.created_at_us,
            person.updated_at_us,
        ],
    )
    .with_context(|| format!("insert person '{}'", person.id))?;

    Ok(person)
}

/// Fetch one person. A missing id is `Ok(None)`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_person(conn: &Connection, id: &PersonId) -> Result<Option<Person>> {
    select_person(conn, id).with_context(|| format!("get_person for '{id}'"))
}

/// Fetch every person in `ids` with one query per [`LOOKUP_CHUNK`] ids.
/// Missing ids are absent from the result, which follows no particular order.
///
/// # Errors
///
/// Returns an error if any chunk query fails.
pub fn get_people(conn: &Connection, ids: &[PersonId]) -> Result<Vec<Person>> {
    select_people(conn, ids).context("get_people batched lookup")
}

/// List people matching `filter`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_people(conn: &Connection, filter: &PersonFilter) -> Result<Vec<Person>> {
    let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();
    let mut where_clause = String::new();

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        param_values.push(Box::new(search.to_lowercase()));
        let n = param_values.len();
        where_clause = format!(
            " WHERE instr(lower(first_name), ?{n}) > 0 \
             OR instr(lower(coalesce(middle_name, '')), ?{n}) > 0 \
             OR instr(lower(last_name), ?{n}) > 0 \
             OR instr(lower(coalesce(maiden_name, '')), ?{n}) > 0 \
             OR instr(lower(coalesce(alias, '')), ?{n}) > 0"
        );
    }

    let direction = if filter.ascending { "ASC" } else { "DESC" };
    let column = filter.sort.column();
    let sql = format!(
        "SELECT {PERSON_COLUMNS} FROM person{where_clause} \
         ORDER BY {column} IS NULL, {column} {direction}, person_id ASC{}",
        limit_clause(filter.limit, filter.offset)
    );

    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("prepare list_people query: {sql}"))?;
    let params_ref: Vec<&dyn ToSql> = param_values.iter().map(AsRef::as_ref).collect();
    let rows = stmt
        .query_map(params_from_iter(params_ref), row_to_person)
        .context("execute list_people query")?;

    let mut people = Vec::new();
    for row in rows {
        people.push(row.context("read list_people row")?);
    }
    Ok(people)
}

/// Apply a partial update. Returns the updated person, or `None` when the id
/// does not exist.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn update_person(
    conn: &Connection,
    id: &PersonId,
    update: &PersonUpdate,
) -> Result<Option<Person>> {
    if update.is_empty() {
        return get_person(conn, id);
    }

    let mut sets: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();
    let mut set = |column: &str, value: Box<dyn ToSql>| {
        param_values.push(value);
        sets.push(format!("{column} = ?{}", param_values.len()));
    };

    if let Some(v) = &update.first_name {
        set("first_name", Box::new(v.clone()));
    }
    if let Some(v) = &update.middle_name {
        set("middle_name", Box::new(v.clone()));
    }
    if let Some(v) = &update.last_name {
        set("last_name", Box::new(v.clone()));
    }
    if let Some(v) = &update.maiden_name {
        set("maiden_name", Box::new(v.clone()));
    }
    if let Some(v) = &update.alias {
        set("alias", Box::new(v.clone()));
    }
    if let Some(v) = update.sex {
        set("sex", Box::new(v.as_str()));
    }
    if let Some(v) = update.born {
        set("born", Box::new(v));
    }
    if let Some(v) = update.died {
        set("died", Box::new(v));
    }
    if let Some(v) = &update.email {
        set("email", Box::new(v.clone()));
    }
    if let Some(v) = &update.phone_number {
        set("phone_number", Box::new(v.clone()));
    }
    set("updated_at_us", Box::new(now_us()));
    param_values.push(Box::new(id.clone()));

    let sql = format!(
        "UPDATE person SET {} WHERE person_id = ?{}",
        sets.join(", "),
        param_values.len()
    );
    let params_ref: Vec<&dyn ToSql> = param_values.iter().map(AsRef::as_ref).collect();
    let changed = conn
        .execute(&sql, params_from_iter(params_ref))
        .with_context(|| format!("update person '{id}'"))?;

    if changed == 0 {
        return Ok(None);
    }
    get_person(conn, id)
}

/// Delete a person. Returns `false` when the id does not exist.
///
/// # Errors
///
/// Returns [`StoreError::InUse`] while any tie still references the person,
/// or an error if the delete fails.
pub fn delete_person(conn: &Connection, id: &PersonId) -> Result<bool> {
    let referencing: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM tie WHERE person_a = ?1 OR person_b = ?1 OR person_c = ?1",
            params![id],
            |row| row.get(0),
        )
        .with_context(|| format!("count ties referencing '{id}'"))?;
    if referencing > 0 {
        return Err(StoreError::InUse(format!(
            "person '{id}' is referenced by {referencing} tie(s)"
        ))
        .into());
    }

    let deleted = conn
        .execute("DELETE FROM person WHERE person_id = ?1", params![id])
        .with_context(|| format!("delete person '{id}'"))?;
    Ok(deleted > 0)
}

/// Check whether a person exists.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn person_exists(conn: &Connection, id: &PersonId) -> Result<bool> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM person WHERE person_id = ?1)",
            params![id],
            |row| row.get(0),
        )
        .context("check person_exists")?;
    Ok(exists)
}

// ---------------------------------------------------------------------------
// Ties
// ---------------------------------------------------------------------------

/// Insert a tie after checking its relation, type and people.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for an unknown relation, type or person,
/// or a row that breaks its kind's shape rules.
pub fn insert_tie(conn: &Connection, tie: &NewTie) -> Result<Tie> {
    Ok(insert_tie_row(conn, tie)?)
}

/// Fetch one tie by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_tie(conn: &Connection, tie_id: i64) -> Result<Option<Tie>> {
    let sql = format!("{TIE_SELECT} WHERE t.tie_id = ?1");
    match conn.query_row(&sql, params![tie_id], row_to_tie) {
        Ok(tie) => Ok(Some(tie)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context(format!("get_tie for {tie_id}")),
    }
}

/// Ties matching `filter`, ordered by tie id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_ties(conn: &Connection, filter: &TieFilter) -> Result<Vec<Tie>> {
    select_ties(conn, filter).context("list_ties query")
}

/// Every tie, ordered by tie id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_all_ties(
    conn: &Connection,
    limit: Option<u32>,
    offset: Option<u32>,
) -> Result<Vec<Tie>> {
    let sql = format!("{TIE_SELECT} ORDER BY t.tie_id ASC{}", limit_clause(limit, offset));
    let mut stmt = conn.prepare(&sql).context("prepare list_all_ties query")?;
    let rows = stmt
        .query_map([], row_to_tie)
        .context("execute list_all_ties query")?;

    let mut ties = Vec::new();
    for row in rows {
        ties.push(row.context("read list_all_ties row")?);
    }
    Ok(ties)
}

/// Change a tie's relation and/or type. `tie_type: Some(None)` clears the
/// type. Returns `None` when the tie does not exist.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when the new relation is unknown or its
/// kind does not fit the stored row, or the new type is unknown.
pub fn update_tie(
    conn: &Connection,
    tie_id: i64,
    relation: Option<&str>,
    tie_type: Option<Option<&str>>,
) -> Result<Option<Tie>> {
    let Some(current) = get_tie(conn, tie_id)? else {
        return Ok(None);
    };

    if let Some(relation) = relation {
        let kind = relation_kind(conn, relation)?
            .ok_or_else(|| StoreError::Invalid(format!("unknown tie relation '{relation}'")))?;
        TieLink::from_columns(
            kind,
            current.link.person_a().clone(),
            current.link.person_b().clone(),
            current.link.person_c().cloned(),
        )?;
        conn.execute(
            "UPDATE tie SET tie_relation = ?1 WHERE tie_id = ?2",
            params![relation, tie_id],
        )
        .with_context(|| format!("update relation of tie {tie_id}"))?;
    }

    if let Some(tie_type) = tie_type {
        if let Some(name) = tie_type {
            ensure_tie_type(conn, name)?;
        }
        conn.execute(
            "UPDATE tie SET tie_type = ?1 WHERE tie_id = ?2",
            params![tie_type, tie_id],
        )
        .with_context(|| format!("update type of tie {tie_id}"))?;
    }

    get_tie(conn, tie_id)
}

/// Delete a tie. Returns `false` when it does not exist.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_tie(conn: &Connection, tie_id: i64) -> Result<bool> {
    let deleted = conn
        .execute("DELETE FROM tie WHERE tie_id = ?1", params![tie_id])
        .with_context(|| format!("delete tie {tie_id}"))?;
    Ok(deleted > 0)
}

// ---------------------------------------------------------------------------
// Tie relations
// ---------------------------------------------------------------------------

/// Register a relation name with its kind.
///
/// # Errors
///
/// Returns an error if the name is taken or the insert fails.
pub fn insert_relation(
    conn: &Connection,
    name: &str,
    kind: TieKind,
    removeable: bool,
) -> Result<TieRelation> {
    let relation = TieRelation {
        name: name.to_string(),
        kind,
        removeable,
        created_at_us: now_us(),
    };
    conn.execute(
        "INSERT INTO tie_relation (tie_relation, kind, removeable, created_at_us) \
         VALUES (?1, ?2, ?3, ?4)",
        params![
            relation.name,
            relation.kind.as_str(),
            relation.removeable,
            relation.created_at_us
        ],
    )
    .with_context(|| format!("insert tie relation '{name}'"))?;
    Ok(relation)
}

/// Fetch one relation by name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_relation(conn: &Connection, name: &str) -> Result<Option<TieRelation>> {
    match conn.query_row(
        "SELECT tie_relation, kind, removeable, created_at_us FROM tie_relation \
         WHERE tie_relation = ?1",
        params![name],
        row_to_relation,
    ) {
        Ok(relation) => Ok(Some(relation)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context(format!("get_relation for '{name}'")),
    }
}

/// Every relation, by name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_relations(conn: &Connection) -> Result<Vec<TieRelation>> {
    let mut stmt = conn
        .prepare(
            "SELECT tie_relation, kind, removeable, created_at_us FROM tie_relation \
             ORDER BY tie_relation ASC",
        )
        .context("prepare list_relations query")?;
    let rows = stmt
        .query_map([], row_to_relation)
        .context("execute list_relations query")?;

    let mut relations = Vec::new();
    for row in rows {
        relations.push(row.context("read list_relations row")?);
    }
    Ok(relations)
}

/// Delete a relation. Returns `false` when it does not exist.
///
/// # Errors
///
/// Returns [`StoreError::InUse`] for non-removeable relations and relations
/// still used by a tie.
pub fn delete_relation(conn: &Connection, name: &str) -> Result<bool> {
    let Some(relation) = get_relation(conn, name)? else {
        return Ok(false);
    };
    if !relation.removeable {
        return Err(StoreError::InUse(format!("tie relation '{name}' is built in")).into());
    }

    let used: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM tie WHERE tie_relation = ?1",
            params![name],
            |row| row.get(0),
        )
        .with_context(|| format!("count ties using relation '{name}'"))?;
    if used > 0 {
        return Err(
            StoreError::InUse(format!("tie relation '{name}' is used by {used} tie(s)")).into(),
        );
    }

    let deleted = conn
        .execute("DELETE FROM tie_relation WHERE tie_relation = ?1", params![name])
        .with_context(|| format!("delete tie relation '{name}'"))?;
    Ok(deleted > 0)
}

// ---------------------------------------------------------------------------
// Tie types
// ---------------------------------------------------------------------------

/// Register a tie type.
///
/// # Errors
///
/// Returns an error if the name is taken or the insert fails.
pub fn insert_tie_type(conn: &Connection, name: &str) -> Result<TieType> {
    let tie_type = TieType {
        name: name.to_string(),
        created_at_us: now_us(),
    };
    conn.execute(
        "INSERT INTO tie_type (tie_type, created_at_us) VALUES (?1, ?2)",
        params![tie_type.name, tie_type.created_at_us],
    )
    .with_context(|| format!("insert tie type '{name}'"))?;
    Ok(tie_type)
}

/// Every tie type, by name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_tie_types(conn: &Connection) -> Result<Vec<TieType>> {
    let mut stmt = conn
        .prepare("SELECT tie_type, created_at_us FROM tie_type ORDER BY tie_type ASC")
        .context("prepare list_tie_types query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TieType {
                name: row.get(0)?,
                created_at_us: row.get(1)?,
            })
        })
        .context("execute list_tie_types query")?;

    let mut types = Vec::new();
    for row in rows {
        types.push(row.context("read list_tie_types row")?);
    }
    Ok(types)
}

/// Delete a tie type. Returns `false` when it does not exist.
///
/// # Errors
///
/// Returns [`StoreError::InUse`] while a tie still carries the type.
pub fn delete_tie_type(conn: &Connection, name: &str) -> Result<bool> {
    let used: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM tie WHERE tie_type = ?1",
            params![name],
            |row| row.get(0),
        )
        .with_context(|| format!("count ties using type '{name}'"))?;
    if used > 0 {
        return Err(StoreError::InUse(format!("tie type '{name}' is used by {used} tie(s)")).into());
    }

    let deleted = conn
        .execute("DELETE FROM tie_type WHERE tie_type = ?1", params![name])
        .with_context(|| format!("delete tie type '{name}'"))?;
    Ok(deleted > 0)
}

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

impl TieStore for Connection {
    fn person(&self, id: &PersonId) -> Result<Option<Person>, StoreError> {
        Ok(select_person(self, id)?)
    }

    fn people(&self, ids: &[PersonId]) -> Result<Vec<Person>, StoreError> {
        Ok(select_people(self, ids)?)
    }

    fn ties(&self, filter: &TieFilter) -> Result<Vec<Tie>, StoreError> {
        Ok(select_ties(self, filter)?)
    }

    fn insert_tie(&self, tie: &NewTie) -> Result<Tie, StoreError> {
        insert_tie_row(self, tie)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn select_person(conn: &Connection, id: &PersonId) -> rusqlite::Result<Option<Person>> {
    match conn.query_row(
        &format!("SELECT {PERSON_COLUMNS} FROM person WHERE person_id = ?1"),
        params![id],
        row_to_person,
    ) {
        Ok(person) => Ok(Some(person)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

fn select_people(conn: &Connection, ids: &[PersonId]) -> rusqlite::Result<Vec<Person>> {
    let mut people = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(LOOKUP_CHUNK) {
        let placeholders = (1..=chunk.len())
            .map(|n| format!("?{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {PERSON_COLUMNS} FROM person WHERE person_id IN ({placeholders})");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), row_to_person)?;
        for row in rows {
            people.push(row?);
        }
    }
    Ok(people)
}

fn select_ties(conn: &Connection, filter: &TieFilter) -> rusqlite::Result<Vec<Tie>> {
    let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();
    let condition = match filter {
        TieFilter::Subject(id) => {
            param_values.push(Box::new(id.clone()));
            "t.person_a = ?1".to_string()
        }
        TieFilter::Involving(id) => {
            param_values.push(Box::new(id.clone()));
            "(t.person_a = ?1 OR t.person_b = ?1 OR t.person_c = ?1)".to_string()
        }
        TieFilter::Pair {
            first,
            second,
            exclude,
        } => {
            param_values.push(Box::new(first.clone()));
            let mut condition = if let Some(second) = second {
                param_values.push(Box::new(second.clone()));
                "((t.person_b = ?1 AND t.person_c = ?2) OR (t.person_b = ?2 AND t.person_c = ?1))"
                    .to_string()
            } else {
                "(t.person_b = ?1 AND t.person_c IS NULL)".to_string()
            };
            condition.push_str(" AND r.kind = 'parent_child'");
            if let Some(exclude) = exclude {
                param_values.push(Box::new(exclude.clone()));
                let _ = write!(condition, " AND t.person_a <> ?{}", param_values.len());
            }
            condition
        }
    };

    let sql = format!("{TIE_SELECT} WHERE {condition} ORDER BY t.tie_id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn ToSql> = param_values.iter().map(AsRef::as_ref).collect();
    let rows = stmt.query_map(params_from_iter(params_ref), row_to_tie)?;

    let mut ties = Vec::new();
    for row in rows {
        ties.push(row?);
    }
    Ok(ties)
}

fn relation_kind(conn: &Connection, name: &str) -> rusqlite::Result<Option<TieKind>> {
    match conn.query_row(
        "SELECT kind FROM tie_relation WHERE tie_relation = ?1",
        params![name],
        |row| row.get::<_, String>(0),
    ) {
        Ok(kind) => kind
            .parse::<TieKind>()
            .map(Some)
            .map_err(|e| conversion_error(0, e)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

fn ensure_tie_type(conn: &Connection, name: &str) -> Result<(), StoreError> {
    let known: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tie_type WHERE tie_type = ?1)",
        params![name],
        |row| row.get(0),
    )?;
    if known {
        Ok(())
    } else {
        Err(StoreError::Invalid(format!("unknown tie type '{name}'")))
    }
}

fn insert_tie_row(conn: &Connection, tie: &NewTie) -> Result<Tie, StoreError> {
    let kind = relation_kind(conn, &tie.relation)?
        .ok_or_else(|| StoreError::Invalid(format!("unknown tie relation '{}'", tie.relation)))?;
    let link = tie.link(kind)?;

    if let Some(name) = &tie.tie_type {
        ensure_tie_type(conn, name)?;
    }
    for id in std::iter::once(&tie.person_a)
        .chain(std::iter::once(&tie.person_b))
        .chain(tie.person_c.as_ref())
    {
        if select_person(conn, id)?.is_none() {
            return Err(StoreError::Invalid(format!("unknown person '{id}'")));
        }
    }

    let created_at_us = now_us();
    conn.execute(
        "INSERT INTO tie (person_a, person_b, person_c, tie_relation, tie_type, created_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            tie.person_a,
            tie.person_b,
            tie.person_c,
            tie.relation,
            tie.tie_type,
            created_at_us
        ],
    )?;

    Ok(Tie {
        id: conn.last_insert_rowid(),
        relation: tie.relation.clone(),
        tie_type: tie.tie_type.clone(),
        link,
        created_at_us,
    })
}

fn conversion_error(
    column: usize,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(error))
}

fn row_to_person(row: &rusqlite::Row<'_>) -> rusqlite::Result<Person> {
    let sex: String = row.get(6)?;
    Ok(Person {
        id: row.get(0)?,
        first_name: row.get(1)?,
        middle_name: row.get(2)?,
        last_name: row.get(3)?,
        maiden_name: row.get(4)?,
        alias: row.get(5)?,
        sex: sex.parse::<Sex>().map_err(|e| conversion_error(6, e))?,
        born: row.get(7)?,
        died: row.get(8)?,
        email: row.get(9)?,
        phone_number: row.get(10)?,
        created_at_us: row.get(11)?,
        updated_at_us: row.get(12)?,
    })
}

fn row_to_tie(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tie> {
    let kind: String = row.get(7)?;
    let kind = kind.parse::<TieKind>().map_err(|e| conversion_error(7, e))?;
    let link = TieLink::from_columns(kind, row.get(1)?, row.get(2)?, row.get(3)?)
        .map_err(|e| conversion_error(1, e))?;
    Ok(Tie {
        id: row.get(0)?,
        relation: row.get(4)?,
        tie_type: row.get(5)?,
        link,
        created_at_us: row.get(6)?,
    })
}

fn row_to_relation(row: &rusqlite::Row<'_>) -> rusqlite::Result<TieRelation> {
    let kind: String = row.get(1)?;
    Ok(TieRelation {
        name: row.get(0)?,
        kind: kind.parse::<TieKind>().map_err(|e| conversion_error(1, e))?,
        removeable: row.get(2)?,
        created_at_us: row.get(3)?,
    })
}

// ---------------------------------------------------------------------------
// Graceful open
// ---------------------------------------------------------------------------

/// Schema version recorded in `store_meta`.
///
/// # Errors
///
/// Returns an error if `store_meta` is missing or unreadable.
pub fn store_schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT schema_version FROM store_meta WHERE id = 1",
        [],
        |row| row.get(0),
    )
    .context("read store_meta")
}

/// Open an existing store. A missing file is `Ok(None)` so callers can ask
/// the user to run `kf init`.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be opened or its
/// metadata is unreadable.
pub fn try_open_store(
    path: &std::path::Path,
    busy_timeout: std::time::Duration,
) -> Result<Option<Connection>> {
    if !path.exists() {
        return Ok(None);
    }

    let conn = super::open_store_with_timeout(path, busy_timeout)?;
    if let Err(e) = store_schema_version(&conn) {
        tracing::warn!(path = %path.display(), error = %e, "store metadata unreadable");
        return Err(e.context(format!("store {} is corrupt", path.display())));
    }
    Ok(Some(conn))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DEFAULT_BUSY_TIMEOUT, migrations, open_store};
    use chrono::NaiveDate;

    fn test_db() -> Connection {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        conn.pragma_update(None, "foreign_keys", "ON")
            .expect("enable foreign keys");
        migrations::migrate(&mut conn).expect("migrate");
        conn
    }

    fn add(conn: &Connection, id: &str, first: &str, last: &str) -> Person {
        insert_person(
            conn,
            &NewPerson {
                id: Some(PersonId::from(id)),
                ..NewPerson::named(first, last)
            },
        )
        .expect("insert person")
    }

    fn family(conn: &Connection) {
        add(conn, "m", "Mark", "Smith");
        add(conn, "f", "Fiona", "Smith");
        add(conn, "c1", "Cara", "Smith");
        add(conn, "c2", "Colin", "Smith");
        insert_tie(conn, &NewTie::child_of(&"c1".into(), &"m".into(), Some(&"f".into())))
            .expect("tie c1");
        insert_tie(conn, &NewTie::child_of(&"c2".into(), &"f".into(), Some(&"m".into())))
            .expect("tie c2");
    }

    fn store_error(err: &anyhow::Error) -> Option<&StoreError> {
        err.downcast_ref::<StoreError>()
    }

    // --- people ---

    #[test]
    fn insert_and_get_person_round_trip_all_fields() {
        let conn = test_db();
        let new = NewPerson {
            middle_name: Some("Anne".into()),
            maiden_name: Some("Jones".into()),
            alias: Some("Molly".into()),
            sex: Sex::Female,
            born: NaiveDate::from_ymd_opt(1950, 4, 2),
            email: Some("mary@example.org".into()),
            phone_number: Some("+44 20 7946 0000".into()),
            ..NewPerson::named("Mary", "Smith")
        };
        let stored = insert_person(&conn, &new).expect("insert");
        assert!(stored.id.as_str().starts_with("p-"));

        let fetched = get_person(&conn, &stored.id).expect("get").expect("present");
        assert_eq!(fetched, stored);
    }

    #[test]
    fn get_missing_person_is_none() {
        let conn = test_db();
        assert!(get_person(&conn, &"nobody".into()).expect("get").is_none());
        assert!(!person_exists(&conn, &"nobody".into()).expect("exists"));
    }

    #[test]
    fn duplicate_person_id_is_rejected() {
        let conn = test_db();
        add(&conn, "a", "Ann", "Lee");
        let again = insert_person(
            &conn,
            &NewPerson {
                id: Some("a".into()),
                ..NewPerson::named("Other", "Lee")
            },
        );
        assert!(again.is_err());
    }

    #[test]
    fn get_people_batches_past_chunk_size() {
        let conn = test_db();
        let mut ids = Vec::new();
        for n in 0..(LOOKUP_CHUNK + 20) {
            let id = format!("p{n:04}");
            add(&conn, &id, "Kid", "Many");
            ids.push(PersonId::from(id));
        }
        ids.push("missing".into());

        let people = get_people(&conn, &ids).expect("batched lookup");
        assert_eq!(people.len(), LOOKUP_CHUNK + 20);
    }

    #[test]
    fn list_people_searches_names_and_alias() {
        let conn = test_db();
        add(&conn, "a", "Alice", "Walker");
        add(&conn, "b", "Bob", "Stone");
        let update = PersonUpdate {
            alias: Some("Walky".into()),
            ..PersonUpdate::default()
        };
        update_person(&conn, &"b".into(), &update).expect("update");

        let filter = PersonFilter {
            search: Some("WALK".into()),
            ..PersonFilter::default()
        };
        let found = list_people(&conn, &filter).expect("list");
        let ids: Vec<&str> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn list_people_sorts_and_pages() {
        let conn = test_db();
        add(&conn, "a", "Cleo", "Zed");
        add(&conn, "b", "Abe", "Young");
        add(&conn, "c", "Bea", "Xu");

        let by_first = list_people(&conn, &PersonFilter::default()).expect("list");
        let names: Vec<&str> = by_first.iter().map(|p| p.first_name.as_str()).collect();
        assert_eq!(names, ["Abe", "Bea", "Cleo"]);

        let filter = PersonFilter {
            sort: PersonSort::LastName,
            ascending: false,
            limit: Some(1),
            offset: Some(1),
            ..PersonFilter::default()
        };
        let page = list_people(&conn, &filter).expect("list");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].last_name, "Young");
    }

    #[test]
    fn born_sort_puts_unknown_dates_last() {
        let conn = test_db();
        add(&conn, "unknown", "Una", "Known");
        let update = PersonUpdate {
            born: NaiveDate::from_ymd_opt(1900, 1, 1),
            ..PersonUpdate::default()
        };
        add(&conn, "old", "Olga", "Old");
        update_person(&conn, &"old".into(), &update).expect("update");

        let filter = PersonFilter {
            sort: PersonSort::Born,
            ..PersonFilter::default()
        };
        let people = list_people(&conn, &filter).expect("list");
        assert_eq!(people[0].id.as_str(), "old");
        assert_eq!(people[1].id.as_str(), "unknown");
    }

    #[test]
    fn sort_parse_accepts_aliases() {
        assert_eq!("surname".parse::<PersonSort>().expect("parse"), PersonSort::LastName);
        assert_eq!("created".parse::<PersonSort>().expect("parse"), PersonSort::Created);
        assert!("height".parse::<PersonSort>().is_err());
    }

    #[test]
    fn update_person_changes_only_given_fields() {
        let conn = test_db();
        let before = add(&conn, "a", "Ann", "Lee");
        let update = PersonUpdate {
            last_name: Some("Park".into()),
            sex: Some(Sex::Female),
            ..PersonUpdate::default()
        };
        let after = update_person(&conn, &"a".into(), &update)
            .expect("update")
            .expect("present");
        assert_eq!(after.first_name, "Ann");
        assert_eq!(after.last_name, "Park");
        assert_eq!(after.sex, Sex::Female);
        assert!(after.updated_at_us >= before.updated_at_us);

        let missing = update_person(&conn, &"zzz".into(), &update).expect("update");
        assert!(missing.is_none());
    }

    #[test]
    fn delete_person_refuses_while_referenced() {
        let conn = test_db();
        family(&conn);
        let err = delete_person(&conn, &"c1".into()).expect_err("referenced");
        assert!(matches!(store_error(&err), Some(StoreError::InUse(_))));

        add(&conn, "solo", "Sol", "O");
        assert!(delete_person(&conn, &"solo".into()).expect("delete"));
        assert!(!delete_person(&conn, &"solo".into()).expect("delete again"));
    }

    // --- ties ---

    #[test]
    fn insert_tie_uses_relation_kind() {
        let conn = test_db();
        family(&conn);
        let tie = insert_tie(&conn, &NewTie::partners(&"m".into(), &"f".into())).expect("insert");
        assert_eq!(tie.kind(), TieKind::Partnership);

        let fetched = get_tie(&conn, tie.id).expect("get").expect("present");
        assert_eq!(fetched, tie);
    }

    #[test]
    fn insert_tie_rejects_bad_rows() {
        let conn = test_db();
        family(&conn);

        let mut third = NewTie::partners(&"m".into(), &"f".into());
        third.person_c = Some("c1".into());
        let err = insert_tie(&conn, &third).expect_err("partnership with c");
        assert!(matches!(store_error(&err), Some(StoreError::Invalid(_))));

        let mut unknown_relation = NewTie::partners(&"m".into(), &"f".into());
        unknown_relation.relation = "rival".into();
        let err = insert_tie(&conn, &unknown_relation).expect_err("unknown relation");
        assert!(err.to_string().contains("rival"));

        let ghost = NewTie::child_of(&"ghost".into(), &"m".into(), None);
        let err = insert_tie(&conn, &ghost).expect_err("unknown person");
        assert!(err.to_string().contains("ghost"));

        let repeat = NewTie::child_of(&"c1".into(), &"m".into(), Some(&"m".into()));
        assert!(insert_tie(&conn, &repeat).is_err());

        let mut typed = NewTie::partners(&"m".into(), &"f".into());
        typed.tie_type = Some("married".into());
        assert!(insert_tie(&conn, &typed).is_err());
        insert_tie_type(&conn, "married").expect("type");
        assert_eq!(
            insert_tie(&conn, &typed).expect("typed").tie_type.as_deref(),
            Some("married")
        );
    }

    #[test]
    fn list_ties_filters_match_memory_semantics() {
        let conn = test_db();
        family(&conn);
        add(&conn, "half", "Hal", "Smith");
        add(&conn, "x", "Xena", "Other");
        insert_tie(&conn, &NewTie::child_of(&"half".into(), &"m".into(), None)).expect("tie");
        insert_tie(&conn, &NewTie::partners(&"x".into(), &"m".into())).expect("tie");

        let subject = list_ties(&conn, &TieFilter::Subject("c1".into())).expect("list");
        assert_eq!(subject.len(), 1);

        let involving = list_ties(&conn, &TieFilter::Involving("m".into())).expect("list");
        assert_eq!(involving.len(), 4);
        assert!(involving.windows(2).all(|w| w[0].id < w[1].id));

        let pair = TieFilter::Pair {
            first: "m".into(),
            second: Some("f".into()),
            exclude: Some("c1".into()),
        };
        let rows = list_ties(&conn, &pair).expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].link.person_a().as_str(), "c2");

        let single = TieFilter::Pair {
            first: "m".into(),
            second: None,
            exclude: None,
        };
        let rows = list_ties(&conn, &single).expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].link.person_a().as_str(), "half");

        for filter in [subject_filter("c1"), pair, single] {
            let all = list_all_ties(&conn, None, None).expect("all");
            let expected: Vec<i64> = all.iter().filter(|t| filter.matches(t)).map(|t| t.id).collect();
            let got: Vec<i64> = list_ties(&conn, &filter)
                .expect("list")
                .iter()
                .map(|t| t.id)
                .collect();
            assert_eq!(got, expected, "{filter:?}");
        }
    }

    fn subject_filter(id: &str) -> TieFilter {
        TieFilter::Subject(id.into())
    }

    #[test]
    fn list_all_ties_pages() {
        let conn = test_db();
        family(&conn);
        let page = list_all_ties(&conn, Some(1), Some(1)).expect("page");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].link.person_a().as_str(), "c2");
    }

    #[test]
    fn update_tie_revalidates_kind_and_type() {
        let conn = test_db();
        family(&conn);
        let tie = insert_tie(&conn, &NewTie::partners(&"m".into(), &"f".into())).expect("tie");

        let spouse = update_tie(&conn, tie.id, Some("spouse"), None)
            .expect("update")
            .expect("present");
        assert_eq!(spouse.relation, "spouse");

        let c1_tie = list_ties(&conn, &TieFilter::Subject("c1".into())).expect("list");
        let err = update_tie(&conn, c1_tie[0].id, Some("spouse"), None)
            .expect_err("three-person row cannot become a partnership");
        assert!(matches!(store_error(&err), Some(StoreError::Invalid(_))));

        insert_tie_type(&conn, "divorced").expect("type");
        let typed = update_tie(&conn, tie.id, None, Some(Some("divorced")))
            .expect("update")
            .expect("present");
        assert_eq!(typed.tie_type.as_deref(), Some("divorced"));
        let cleared = update_tie(&conn, tie.id, None, Some(None))
            .expect("update")
            .expect("present");
        assert!(cleared.tie_type.is_none());

        assert!(update_tie(&conn, 9_999, Some("spouse"), None).expect("update").is_none());
    }

    #[test]
    fn delete_tie_reports_absence() {
        let conn = test_db();
        family(&conn);
        let tie = insert_tie(&conn, &NewTie::partners(&"m".into(), &"f".into())).expect("tie");
        assert!(delete_tie(&conn, tie.id).expect("delete"));
        assert!(!delete_tie(&conn, tie.id).expect("delete again"));
        assert!(get_tie(&conn, tie.id).expect("get").is_none());
    }

    // --- relations and types ---

    #[test]
    fn relations_are_seeded_and_extendable() {
        let conn = test_db();
        let names: Vec<String> = list_relations(&conn)
            .expect("list")
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["adoptive", "parent", "partner", "spouse"]);

        insert_relation(&conn, "foster", TieKind::ParentChild, true).expect("insert");
        let foster = get_relation(&conn, "foster").expect("get").expect("present");
        assert_eq!(foster.kind, TieKind::ParentChild);
        assert!(foster.removeable);
        assert!(insert_relation(&conn, "foster", TieKind::Partnership, true).is_err());
    }

    #[test]
    fn delete_relation_guards_builtin_and_used() {
        let conn = test_db();
        family(&conn);

        let err = delete_relation(&conn, "parent").expect_err("built in");
        assert!(matches!(store_error(&err), Some(StoreError::InUse(_))));

        let mut spouse = NewTie::partners(&"m".into(), &"f".into());
        spouse.relation = "spouse".into();
        let tie = insert_tie(&conn, &spouse).expect("tie");
        let err = delete_relation(&conn, "spouse").expect_err("used");
        assert!(err.to_string().contains("1 tie"));

        delete_tie(&conn, tie.id).expect("delete tie");
        assert!(delete_relation(&conn, "spouse").expect("delete"));
        assert!(!delete_relation(&conn, "spouse").expect("delete again"));
    }

    #[test]
    fn tie_types_crud() {
        let conn = test_db();
        family(&conn);
        insert_tie_type(&conn, "married").expect("insert");
        insert_tie_type(&conn, "divorced").expect("insert");
        let names: Vec<String> = list_tie_types(&conn)
            .expect("list")
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["divorced", "married"]);

        let mut typed = NewTie::partners(&"m".into(), &"f".into());
        typed.tie_type = Some("married".into());
        insert_tie(&conn, &typed).expect("tie");
        assert!(delete_tie_type(&conn, "married").is_err());
        assert!(delete_tie_type(&conn, "divorced").expect("delete"));
        assert!(!delete_tie_type(&conn, "divorced").expect("delete again"));
    }

    // --- store seam ---

    #[test]
    fn connection_store_reports_missing_person_as_none() {
        let conn = test_db();
        assert!(TieStore::person(&conn, &"ghost".into()).expect("lookup").is_none());
        assert!(TieStore::people(&conn, &[]).expect("lookup").is_empty());
    }

    #[test]
    fn connection_store_insert_tie_returns_typed_errors() {
        let conn = test_db();
        family(&conn);
        let mut bad = NewTie::partners(&"m".into(), &"f".into());
        bad.person_c = Some("c1".into());
        let err = TieStore::insert_tie(&conn, &bad).expect_err("invalid");
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    // --- open ---

    #[test]
    fn try_open_store_missing_file_is_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("kinfold.db");
        assert!(try_open_store(&path, DEFAULT_BUSY_TIMEOUT).expect("open").is_none());

        drop(open_store(&path).expect("create"));
        let conn = try_open_store(&path, DEFAULT_BUSY_TIMEOUT)
            .expect("open")
            .expect("present");
        assert_eq!(
            store_schema_version(&conn).expect("version"),
            i64::from(migrations::LATEST_SCHEMA_VERSION)
        );
    }
}
