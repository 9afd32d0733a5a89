//! libSQL lookup index for generated bundles.
//!
//! The index is a single `searchIndex` table inside the bundle; viewers
//! query it directly, so the schema (table name, column names, the unique
//! `anchor` index) is a stable contract. [`IndexStore`] is the sole writer
//! during generation and supports read-only lookups afterwards.

mod migrations;

use std::path::Path;
use std::str::FromStr;

use libsql::{Connection, Database, params};
use tracing::{debug, info};

use docpack_shared::{DocpackError, EntryKind, IndexEntry, Result};

/// Handle to a bundle's lookup database.
pub struct IndexStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl IndexStore {
    /// Create a fresh index at `path`, replacing any existing database.
    ///
    /// Generation always starts from an empty index so a re-run cannot
    /// leave rows from a previous run behind.
    pub async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocpackError::io(parent, e))?;
        }
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| DocpackError::io(path, e))?;
        }

        let store = Self::connect(path).await?;
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an existing index at `path` for lookups.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DocpackError::Store(format!(
                "no index database at {}",
                path.display()
            )));
        }
        Self::connect(path).await
    }

    async fn connect(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DocpackError::Store(e.to_string()))?;
        let conn = db.connect().map_err(|e| DocpackError::Store(e.to_string()))?;
        Ok(Self { db, conn })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    DocpackError::Store(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Insert one page's entries atomically.
    ///
    /// All of a page's entries land or none do, so a failure mid-page never
    /// leaves a partially indexed page. Exact duplicate rows are collapsed
    /// by the unique index. Returns the number of rows actually inserted.
    pub async fn insert_page_entries(&self, entries: &[IndexEntry]) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| DocpackError::Store(e.to_string()))?;

        let mut inserted = 0u64;
        for entry in entries {
            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO searchIndex (name, type, path) VALUES (?1, ?2, ?3)",
                    params![
                        entry.name.as_str(),
                        entry.kind.as_str(),
                        entry.location()
                    ],
                )
                .await
                .map_err(|e| DocpackError::Store(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| DocpackError::Store(e.to_string()))?;

        debug!(
            page = entries[0].page_path,
            entries = entries.len(),
            inserted,
            "indexed page entries"
        );
        Ok(inserted)
    }

    /// Case-insensitive prefix lookup, ordered by type, then name, then
    /// insertion order.
    pub async fn lookup(&self, prefix: &str) -> Result<Vec<IndexEntry>> {
        let pattern = format!("{}%", escape_like(prefix));
        let mut rows = self
            .conn
            .query(
                "SELECT name, type, path FROM searchIndex \
                 WHERE name LIKE ?1 ESCAPE '\\' COLLATE NOCASE \
                 ORDER BY type, name COLLATE NOCASE, id",
                params![pattern],
            )
            .await
            .map_err(|e| DocpackError::Store(e.to_string()))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DocpackError::Store(e.to_string()))?
        {
            entries.push(entry_from_row(&row)?);
        }
        Ok(entries)
    }

    /// Total number of index rows.
    pub async fn entry_count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM searchIndex", params![])
            .await
            .map_err(|e| DocpackError::Store(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| DocpackError::Store(e.to_string()))?
        {
            Some(row) => row
                .get::<u64>(0)
                .map_err(|e| DocpackError::Store(e.to_string())),
            None => Ok(0),
        }
    }

    /// Distinct page paths referenced by index rows (the portion of `path`
    /// before any `#`), for bundle consistency checks.
    pub async fn indexed_page_paths(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT DISTINCT \
                 CASE WHEN instr(path, '#') > 0 \
                      THEN substr(path, 1, instr(path, '#') - 1) \
                      ELSE path END AS page \
                 FROM searchIndex ORDER BY page",
                params![],
            )
            .await
            .map_err(|e| DocpackError::Store(e.to_string()))?;

        let mut paths = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DocpackError::Store(e.to_string()))?
        {
            paths.push(
                row.get::<String>(0)
                    .map_err(|e| DocpackError::Store(e.to_string()))?,
            );
        }
        Ok(paths)
    }
}

/// Rebuild an [`IndexEntry`] from a `(name, type, path)` row.
fn entry_from_row(row: &libsql::Row) -> Result<IndexEntry> {
    let name: String = row.get(0).map_err(|e| DocpackError::Store(e.to_string()))?;
    let kind_str: String = row.get(1).map_err(|e| DocpackError::Store(e.to_string()))?;
    let location: String = row.get(2).map_err(|e| DocpackError::Store(e.to_string()))?;

    let kind = EntryKind::from_str(&kind_str).map_err(DocpackError::Store)?;
    let (page_path, anchor) = match location.split_once('#') {
        Some((page, anchor)) => (page.to_string(), anchor.to_string()),
        None => (location, String::new()),
    };

    Ok(IndexEntry {
        name,
        kind,
        page_path,
        anchor,
    })
}

/// Escape LIKE wildcards so a literal prefix matches literally.
fn escape_like(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
