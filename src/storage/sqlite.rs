//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the StateStore trait.
//! Each save writes a complete database to a temporary file next to the target
//! and renames it into place, so readers only ever see a whole snapshot.

use crate::storage::schema::{has_visited_table, initialize_schema, SCHEMA_VERSION};
use crate::storage::traits::StateStore;
use crate::{PersistenceError, PersistenceResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Metadata describing a persisted snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    pub url_count: u64,
}

/// SQLite state file backend
#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    path: PathBuf,
}

impl SqliteStateStore {
    /// Creates a store backed by the file at `path`
    ///
    /// Nothing is opened or created until the first load or save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot metadata without loading the URLs
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No state file exists yet
    /// * `Ok(Some(SnapshotInfo))` - Metadata of the persisted snapshot
    /// * `Err(PersistenceError)` - The file is unreadable or corrupt
    pub fn snapshot_info(&self) -> PersistenceResult<Option<SnapshotInfo>> {
        let Some(conn) = self.open_existing()? else {
            return Ok(None);
        };

        let row: Option<(u32, String, i64)> = conn
            .query_row(
                "SELECT schema_version, saved_at, url_count FROM snapshot_meta WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((schema_version, saved_at, url_count)) = row else {
            return Ok(None);
        };

        let saved_at = DateTime::parse_from_rfc3339(&saved_at)
            .map_err(|e| self.corrupt(format!("bad saved_at timestamp: {}", e)))?
            .with_timezone(&Utc);

        Ok(Some(SnapshotInfo {
            schema_version,
            saved_at,
            url_count: url_count.max(0) as u64,
        }))
    }

    /// Opens the state file read-only, or returns `None` if it does not exist
    fn open_existing(&self) -> PersistenceResult<Option<Connection>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        if !has_visited_table(&conn)? {
            return Err(self.corrupt("missing visited_urls table".to_string()));
        }

        Ok(Some(conn))
    }

    fn corrupt(&self, message: String) -> PersistenceError {
        PersistenceError::Corrupt {
            path: self.path.display().to_string(),
            message,
        }
    }

    /// Directory that receives the temporary file during a save
    fn staging_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl StateStore for SqliteStateStore {
    fn load(&self) -> PersistenceResult<HashSet<String>> {
        let Some(conn) = self.open_existing()? else {
            tracing::debug!("No state file at {}", self.path.display());
            return Ok(HashSet::new());
        };

        let mut stmt = conn.prepare("SELECT url FROM visited_urls")?;
        let urls = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(urls)
    }

    fn save(&self, urls: &HashSet<String>) -> PersistenceResult<()> {
        let dir = self.staging_dir();
        std::fs::create_dir_all(dir)?;
        let staged = NamedTempFile::new_in(dir)?;

        {
            let mut conn = Connection::open(staged.path())?;
            initialize_schema(&conn)?;

            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare("INSERT INTO visited_urls (url) VALUES (?1)")?;
                for url in urls {
                    stmt.execute(params![url])?;
                }
            }
            tx.execute(
                "INSERT INTO snapshot_meta (id, schema_version, saved_at, url_count) VALUES (1, ?1, ?2, ?3)",
                params![SCHEMA_VERSION, Utc::now().to_rfc3339(), urls.len() as i64],
            )?;
            tx.commit()?;

            conn.close().map_err(|(_, e)| e)?;
        }

        staged.persist(&self.path)?;
        Ok(())
    }
}
