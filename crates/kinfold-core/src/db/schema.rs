//! SQLite schema for the family tree store.
//!
//! - `person` holds one row per person; ids are opaque text
//! - `tie_relation` names each relation and carries its `kind`, which is the
//!   only thing that decides how a tie row is read
//! - `tie_type` is a free-form qualifier table
//! - `tie` holds the ternary rows; person references restrict deletion
//! - `store_meta` records the applied schema version

/// Migration v1: people, ties, relation and type lookups, metadata.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS person (
    person_id TEXT PRIMARY KEY CHECK (length(trim(person_id)) > 0),
    first_name TEXT NOT NULL CHECK (length(trim(first_name)) > 0),
    middle_name TEXT,
    last_name TEXT NOT NULL CHECK (length(trim(last_name)) > 0),
    maiden_name TEXT,
    alias TEXT,
    sex TEXT NOT NULL DEFAULT 'Other' CHECK (sex IN ('Male', 'Female', 'Other')),
    born TEXT,
    died TEXT,
    email TEXT,
    phone_number TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tie_relation (
    tie_relation TEXT PRIMARY KEY CHECK (length(trim(tie_relation)) > 0),
    kind TEXT NOT NULL CHECK (kind IN ('parent_child', 'partnership')),
    removeable INTEGER NOT NULL DEFAULT 1 CHECK (removeable IN (0, 1)),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tie_type (
    tie_type TEXT PRIMARY KEY CHECK (length(trim(tie_type)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tie (
    tie_id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_a TEXT NOT NULL REFERENCES person(person_id) ON DELETE RESTRICT,
    person_b TEXT NOT NULL REFERENCES person(person_id) ON DELETE RESTRICT,
    person_c TEXT REFERENCES person(person_id) ON DELETE RESTRICT,
    tie_relation TEXT NOT NULL REFERENCES tie_relation(tie_relation) ON DELETE RESTRICT,
    tie_type TEXT REFERENCES tie_type(tie_type) ON DELETE SET NULL,
    created_at_us INTEGER NOT NULL,
    CHECK (person_a <> person_b),
    CHECK (person_c IS NULL OR (person_c <> person_a AND person_c <> person_b))
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, created_at_us)
VALUES (1, 0, CAST((julianday('now') - 2440587.5) * 86400000000 AS INTEGER));

INSERT OR IGNORE INTO tie_relation (tie_relation, kind, removeable, created_at_us) VALUES
    ('parent', 'parent_child', 0, 0),
    ('adoptive', 'parent_child', 1, 0),
    ('partner', 'partnership', 0, 0),
    ('spouse', 'partnership', 1, 0);

CREATE INDEX IF NOT EXISTS idx_tie_person_a ON tie(person_a, tie_id);
CREATE INDEX IF NOT EXISTS idx_tie_person_b ON tie(person_b, person_c);
CREATE INDEX IF NOT EXISTS idx_tie_person_c ON tie(person_c, person_b);
CREATE INDEX IF NOT EXISTS idx_tie_relation ON tie(tie_relation);
CREATE INDEX IF NOT EXISTS idx_person_last_first ON person(last_name, first_name);
"#;

/// Indexes the query layer relies on.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_tie_person_a",
    "idx_tie_person_b",
    "idx_tie_person_c",
    "idx_tie_relation",
    "idx_person_last_first",
];

/// Relation names the schema seeds.
pub const SEEDED_RELATIONS: &[&str] = &["parent", "adoptive", "partner", "spouse"];
