//! Versioned schema for the graph store and the search index.
//!
//! Each database file carries its own `schema_migrations` table. Secondary
//! indexes and the FTS table are not part of the migrations: the adapters'
//! `create_indexes` step owns them.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Migrations for the graph store, in ascending version order.
pub(crate) fn graph_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Graph schema: nodes, edges",
        sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per node; label carries the configured prefix (gfz_Textbook, ...)
CREATE TABLE IF NOT EXISTS nodes (
    id          TEXT PRIMARY KEY,
    label       TEXT NOT NULL,
    name        TEXT NOT NULL,
    props_json  TEXT NOT NULL,
    batch_id    TEXT NOT NULL,
    imported_at TEXT NOT NULL
);

-- Typed, directed edges between node ids
CREATE TABLE IF NOT EXISTS edges (
    src      TEXT NOT NULL,
    dst      TEXT NOT NULL,
    rel_type TEXT NOT NULL,
    batch_id TEXT NOT NULL,
    PRIMARY KEY (src, dst, rel_type)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

/// Migrations for the search index, in ascending version order.
pub(crate) fn index_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Search schema: documents",
        sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Searchable documents: chapters and knowledge points
CREATE TABLE IF NOT EXISTS documents (
    id          TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,
    textbook_id TEXT NOT NULL,
    title       TEXT NOT NULL,
    body        TEXT NOT NULL,
    keywords    TEXT NOT NULL,
    subject     TEXT NOT NULL,
    batch_id    TEXT NOT NULL,
    indexed_at  TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
