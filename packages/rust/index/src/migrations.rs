//! SQL migration definitions for the lookup index database.
//!
//! Migrations are applied in order when the index is created. Each migration
//! has a version number and a batch of SQL statements.

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
        description: "Initial schema: searchIndex table with dedup index",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Lookup entries. The column names and table name are part of the docset
-- contract: viewers query this table directly.
CREATE TABLE IF NOT EXISTS searchIndex (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    path TEXT NOT NULL
);

-- Exact duplicates collapse to a single row.
CREATE UNIQUE INDEX IF NOT EXISTS anchor ON searchIndex (name, type, path);

INSERT OR IGNORE INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
