//! SQLite schema and introspection
//!
//! The snapshot table keeps one row per project; the history table is an
//! append-only time series whose `project_id` is a soft reference (no
//! foreign key, no uniqueness on `(project_id, collect_date)`).

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;

use crate::utils::error::StorageResult;

/// Snapshot table name
pub const SNAPSHOT_TABLE: &str = "github_project";

/// History table name
pub const HISTORY_TABLE: &str = "github_project_history";

/// Maximum rows returned as a table preview
pub const SAMPLE_ROW_LIMIT: usize = 10;

const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS github_project (
        id INTEGER PRIMARY KEY,
        project_id INTEGER NOT NULL,
        repo_id TEXT NOT NULL,
        name TEXT NOT NULL,
        full_name TEXT NOT NULL,
        description TEXT,
        url TEXT NOT NULL,
        language TEXT,
        collect_date DATE NOT NULL,
        stars INTEGER NOT NULL DEFAULT 0,
        forks INTEGER NOT NULL DEFAULT 0,
        watchers INTEGER NOT NULL DEFAULT 0,
        UNIQUE(project_id),
        UNIQUE(repo_id)
    );

    CREATE INDEX IF NOT EXISTS idx_github_project_collect_date
        ON github_project(collect_date, stars);

    CREATE TABLE IF NOT EXISTS github_project_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL,
        collect_date DATETIME NOT NULL,
        stars INTEGER NOT NULL DEFAULT 0,
        forks INTEGER NOT NULL DEFAULT 0,
        watchers INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_github_project_history_project
        ON github_project_history(project_id, collect_date);
"#;

/// Create both tables and their indexes if absent
pub fn create_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Column description from `PRAGMA table_info`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

/// Structure and preview rows of one table
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub sample_rows: Vec<Vec<String>>,
}

/// Names of all user tables, sorted
pub fn list_tables(conn: &Connection) -> StorageResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Describe a table; `None` when no such table exists
///
/// The name is checked against `sqlite_master` before it is interpolated.
pub fn describe_table(conn: &Connection, name: &str) -> StorageResult<Option<TableInfo>> {
    if !list_tables(conn)?.iter().any(|t| t == name) {
        return Ok(None);
    }
    let quoted = quote_identifier(name);

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({quoted})"))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                cid: row.get(0)?,
                name: row.get(1)?,
                decl_type: row.get(2)?,
                not_null: row.get::<_, i64>(3)? != 0,
                default_value: row.get(4)?,
                primary_key: row.get::<_, i64>(5)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM {quoted} LIMIT {SAMPLE_ROW_LIMIT}"
    ))?;
    let column_count = stmt.column_count();
    let sample_rows = stmt
        .query_map([], |row| {
            (0..column_count)
                .map(|i| row.get_ref(i).map(render_value))
                .collect::<Result<Vec<_>, _>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(TableInfo {
        name: name.to_string(),
        columns,
        sample_rows,
    }))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
