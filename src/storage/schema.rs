//! Database schema definitions
//!
//! This module contains the SQL schema for the visited-set state file.

/// Version recorded in every snapshot; bump when the layout changes
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the state file
pub const SCHEMA_SQL: &str = r#"
-- Every URL admitted for crawling
CREATE TABLE IF NOT EXISTS visited_urls (
    url TEXT PRIMARY KEY NOT NULL
) WITHOUT ROWID;

-- One row describing the snapshot stored in this file
CREATE TABLE IF NOT EXISTS snapshot_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    saved_at TEXT NOT NULL,
    url_count INTEGER NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Returns whether the visited-set table exists in this database
pub fn has_visited_table(conn: &rusqlite::Connection) -> Result<bool, rusqlite::Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'visited_urls'",
        [],
        |row| row.get(0),
    )?;
    Ok(count == 1)
}
