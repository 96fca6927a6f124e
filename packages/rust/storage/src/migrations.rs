//! SQL migration definitions for the mwkb database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as a batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: mw_pages and mw_chunks collections",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Full-page documents, keyed by canonical URL
CREATE TABLE IF NOT EXISTS mw_pages (
    url        TEXT PRIMARY KEY,
    title      TEXT NOT NULL,
    breadcrumb TEXT NOT NULL,
    domain     TEXT NOT NULL,
    body       TEXT NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_mw_pages_domain ON mw_pages(domain);

-- Per-view embedding chunks, keyed by deterministic digest
CREATE TABLE IF NOT EXISTS mw_chunks (
    id         TEXT PRIMARY KEY,
    parent_url TEXT NOT NULL,
    title      TEXT NOT NULL,
    breadcrumb TEXT NOT NULL,
    view_type  TEXT NOT NULL,
    domain     TEXT NOT NULL,
    body       TEXT NOT NULL,
    embedding  BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_mw_chunks_parent ON mw_chunks(parent_url);
CREATE INDEX IF NOT EXISTS idx_mw_chunks_domain ON mw_chunks(domain);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
