//! Repository Pattern for Project Storage
//!
//! This module provides trait-based repository abstractions so the collector
//! and the view layer never touch SQL directly:
//! - Easy testing with the in-memory mock implementation
//! - Per-call commits, so partial progress survives a crash mid-run
//! - Stable primary-key ordering for paged traversal
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Collector            View layer                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │          ProjectRepository / SchemaInspector                │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                         │
//!                    ▼                         ▼
//!          ┌─────────────────┐       ┌─────────────────┐
//!          │     SQLite      │       │      Mock       │
//!          │  Implementation │       │ Implementation  │
//!          └─────────────────┘       └─────────────────┘
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::schema::{self, TableInfo};
use crate::models::{HistoryRecord, Metrics, ProjectSnapshot};
use crate::utils::error::{StorageError, StorageResult};
use crate::utils::{format_date, format_timestamp, parse_date, parse_timestamp};

// ============================================================================
// Repository Traits
// ============================================================================

/// Durable storage for project snapshots and their metric history
pub trait ProjectRepository: Send + Sync {
    /// Create both tables if absent. Safe to call on every start.
    fn ensure_schema(&self) -> StorageResult<()>;

    /// Insert a snapshot, replacing every column of an existing row with the
    /// same `project_id`.
    ///
    /// A different project already holding the same `repo_id` surfaces as
    /// [`StorageError::Constraint`].
    fn upsert_snapshot(&self, snapshot: &ProjectSnapshot) -> StorageResult<()>;

    /// Append one history row unconditionally
    fn append_history(
        &self,
        project_id: i64,
        metrics: Metrics,
        collect_date: NaiveDateTime,
    ) -> StorageResult<()>;

    /// A page of known project ids in primary-key order
    fn list_project_ids(&self, page_size: u64, offset: u64) -> StorageResult<Vec<i64>>;

    /// Total number of snapshot rows
    fn count_projects(&self) -> StorageResult<u64>;

    /// Check whether a snapshot row exists for `project_id`
    fn project_exists(&self, project_id: i64) -> StorageResult<bool>;

    /// Fetch one snapshot
    fn get_snapshot(&self, project_id: i64) -> StorageResult<Option<ProjectSnapshot>>;

    /// Number of snapshots collected on `date`
    fn count_snapshots_on(&self, date: NaiveDate) -> StorageResult<u64>;

    /// Snapshots collected on `date`, most stars first
    fn list_snapshots_on(
        &self,
        date: NaiveDate,
        limit: u64,
        offset: u64,
    ) -> StorageResult<Vec<ProjectSnapshot>>;

    /// History rows for a project at or after `since`, oldest first
    fn history_since(
        &self,
        project_id: i64,
        since: NaiveDateTime,
    ) -> StorageResult<Vec<HistoryRecord>>;

    /// Total number of history rows
    fn count_history(&self) -> StorageResult<u64>;

    /// Most recent snapshot collection date
    fn latest_collect_date(&self) -> StorageResult<Option<NaiveDate>>;
}

/// Raw schema introspection for the admin views
pub trait SchemaInspector: Send + Sync {
    fn list_tables(&self) -> StorageResult<Vec<String>>;

    fn describe_table(&self, name: &str) -> StorageResult<Option<TableInfo>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of [`ProjectRepository`]
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection. Every
/// write is its own implicit transaction.
pub struct SqliteProjectRepository {
    conn: Mutex<Connection>,
}

impl SqliteProjectRepository {
    /// Open (or create) a database file and ensure the schema
    pub fn new(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL lets the view layer read while a collection run writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.ensure_schema()?;

        tracing::info!(path = %path.display(), "SQLite repository initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.ensure_schema()?;
        Ok(repo)
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

const SNAPSHOT_COLUMNS: &str = "project_id, repo_id, name, full_name, description, url, \
                                language, collect_date, stars, forks, watchers";

/// Map a row selected with [`SNAPSHOT_COLUMNS`]
fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<(ProjectSnapshot, String)> {
    let raw_date: String = row.get(7)?;
    let snapshot = ProjectSnapshot {
        project_id: row.get(0)?,
        repo_id: row.get(1)?,
        name: row.get(2)?,
        full_name: row.get(3)?,
        description: row.get(4)?,
        url: row.get(5)?,
        language: row.get(6)?,
        collect_date: NaiveDate::MIN,
        stars: from_sql_count(row.get(8)?),
        forks: from_sql_count(row.get(9)?),
        watchers: from_sql_count(row.get(10)?),
    };
    Ok((snapshot, raw_date))
}

fn resolve_snapshot_date(
    (mut snapshot, raw_date): (ProjectSnapshot, String),
) -> StorageResult<ProjectSnapshot> {
    snapshot.collect_date =
        parse_date(&raw_date).ok_or_else(|| StorageError::corrupt("collect_date", raw_date))?;
    Ok(snapshot)
}

impl ProjectRepository for SqliteProjectRepository {
    fn ensure_schema(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        schema::create_schema(&conn)
    }

    fn upsert_snapshot(&self, snapshot: &ProjectSnapshot) -> StorageResult<()> {
        let conn = self.lock()?;

        // Updating in place keeps the surrogate id, so paging order is stable
        conn.execute(
            r#"
                INSERT INTO github_project (
                    project_id, repo_id, name, full_name, description,
                    url, language, collect_date, stars, forks, watchers
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(project_id) DO UPDATE SET
                    repo_id = excluded.repo_id,
                    name = excluded.name,
                    full_name = excluded.full_name,
                    description = excluded.description,
                    url = excluded.url,
                    language = excluded.language,
                    collect_date = excluded.collect_date,
                    stars = excluded.stars,
                    forks = excluded.forks,
                    watchers = excluded.watchers
                "#,
            params![
                snapshot.project_id,
                snapshot.repo_id,
                snapshot.name,
                snapshot.full_name,
                snapshot.description,
                snapshot.url,
                snapshot.language,
                format_date(snapshot.collect_date),
                to_sql_count(snapshot.stars),
                to_sql_count(snapshot.forks),
                to_sql_count(snapshot.watchers),
            ],
        )?;

        Ok(())
    }

    fn append_history(
        &self,
        project_id: i64,
        metrics: Metrics,
        collect_date: NaiveDateTime,
    ) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
                INSERT INTO github_project_history
                    (project_id, collect_date, stars, forks, watchers)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            params![
                project_id,
                format_timestamp(collect_date),
                to_sql_count(metrics.stars),
                to_sql_count(metrics.forks),
                to_sql_count(metrics.watchers),
            ],
        )?;
        Ok(())
    }

    fn list_project_ids(&self, page_size: u64, offset: u64) -> StorageResult<Vec<i64>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT project_id FROM github_project ORDER BY id LIMIT ?1 OFFSET ?2")?;
        let ids = stmt
            .query_map(params![to_sql_count(page_size), to_sql_count(offset)], |row| {
                row.get::<_, i64>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn count_projects(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let total: i64 =
            conn.query_row("SELECT COUNT(*) FROM github_project", [], |row| row.get(0))?;
        Ok(from_sql_count(total))
    }

    fn project_exists(&self, project_id: i64) -> StorageResult<bool> {
        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM github_project WHERE project_id = ?1)",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_snapshot(&self, project_id: i64) -> StorageResult<Option<ProjectSnapshot>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {SNAPSHOT_COLUMNS} FROM github_project WHERE project_id = ?1"),
                params![project_id],
                snapshot_from_row,
            )
            .optional()?;
        row.map(resolve_snapshot_date).transpose()
    }

    fn count_snapshots_on(&self, date: NaiveDate) -> StorageResult<u64> {
        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM github_project WHERE collect_date = ?1",
            params![format_date(date)],
            |row| row.get(0),
        )?;
        Ok(from_sql_count(total))
    }

    fn list_snapshots_on(
        &self,
        date: NaiveDate,
        limit: u64,
        offset: u64,
    ) -> StorageResult<Vec<ProjectSnapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM github_project
             WHERE collect_date = ?1
             ORDER BY stars DESC, id
             LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
            .query_map(
                params![format_date(date), to_sql_count(limit), to_sql_count(offset)],
                snapshot_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(resolve_snapshot_date).collect()
    }

    fn history_since(
        &self,
        project_id: i64,
        since: NaiveDateTime,
    ) -> StorageResult<Vec<HistoryRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT collect_date, stars, forks, watchers
             FROM github_project_history
             WHERE project_id = ?1 AND collect_date >= ?2
             ORDER BY collect_date, id",
        )?;
        let rows = stmt
            .query_map(params![project_id, format_timestamp(since)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(raw_date, stars, forks, watchers)| {
                let collect_date = parse_timestamp(&raw_date)
                    .ok_or_else(|| StorageError::corrupt("collect_date", raw_date))?;
                Ok(HistoryRecord {
                    project_id,
                    collect_date,
                    stars: from_sql_count(stars),
                    forks: from_sql_count(forks),
                    watchers: from_sql_count(watchers),
                })
            })
            .collect()
    }

    fn count_history(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM github_project_history",
            [],
            |row| row.get(0),
        )?;
        Ok(from_sql_count(total))
    }

    fn latest_collect_date(&self) -> StorageResult<Option<NaiveDate>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn.query_row(
            "SELECT MAX(collect_date) FROM github_project",
            [],
            |row| row.get(0),
        )?;
        raw.map(|value| {
            parse_date(&value).ok_or_else(|| StorageError::corrupt("collect_date", value))
        })
        .transpose()
    }
}

impl SchemaInspector for SqliteProjectRepository {
    fn list_tables(&self) -> StorageResult<Vec<String>> {
        let conn = self.lock()?;
        schema::list_tables(&conn)
    }

    fn describe_table(&self, name: &str) -> StorageResult<Option<TableInfo>> {
        let conn = self.lock()?;
        schema::describe_table(&conn, name)
    }
}

// ============================================================================
// Mock Implementation (for testing)
// ============================================================================

#[derive(Default)]
struct MockState {
    /// Insertion order stands in for the surrogate primary key
    snapshots: Vec<ProjectSnapshot>,
    history: Vec<HistoryRecord>,
    failing_snapshots: HashSet<i64>,
    failing_history: HashSet<i64>,
}

/// In-memory mock implementation of [`ProjectRepository`]
///
/// Useful for testing without database dependencies. Individual project ids
/// can be configured to fail writes.
#[derive(Default)]
pub struct MockProjectRepository {
    state: RwLock<MockState>,
}

impl MockProjectRepository {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `upsert_snapshot` fail for these project ids
    pub fn with_failing_snapshots(self, ids: impl IntoIterator<Item = i64>) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.failing_snapshots.extend(ids);
        }
        self
    }

    /// Make `append_history` fail for these project ids
    pub fn with_failing_history(self, ids: impl IntoIterator<Item = i64>) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.failing_history.extend(ids);
        }
        self
    }

    /// All history rows, in append order
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.state
            .read()
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    /// All snapshots, in insertion order
    pub fn snapshots(&self) -> Vec<ProjectSnapshot> {
        self.state
            .read()
            .map(|s| s.snapshots.clone())
            .unwrap_or_default()
    }

    fn read(&self) -> StorageResult<std::sync::RwLockReadGuard<'_, MockState>> {
        self.state.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> StorageResult<std::sync::RwLockWriteGuard<'_, MockState>> {
        self.state.write().map_err(|_| StorageError::LockPoisoned)
    }
}

fn window<T: Clone>(items: &[T], limit: u64, offset: u64) -> Vec<T> {
    let start = usize::try_from(offset).unwrap_or(usize::MAX);
    let take = usize::try_from(limit).unwrap_or(usize::MAX);
    items.iter().skip(start).take(take).cloned().collect()
}

impl ProjectRepository for MockProjectRepository {
    fn ensure_schema(&self) -> StorageResult<()> {
        Ok(())
    }

    fn upsert_snapshot(&self, snapshot: &ProjectSnapshot) -> StorageResult<()> {
        let mut state = self.write()?;

        if state.failing_snapshots.contains(&snapshot.project_id) {
            return Err(StorageError::Constraint {
                message: format!("injected failure for {}", snapshot.project_id),
            });
        }

        let repo_taken = state
            .snapshots
            .iter()
            .any(|s| s.repo_id == snapshot.repo_id && s.project_id != snapshot.project_id);
        if repo_taken {
            return Err(StorageError::Constraint {
                message: "UNIQUE constraint failed: github_project.repo_id".to_string(),
            });
        }

        match state
            .snapshots
            .iter_mut()
            .find(|s| s.project_id == snapshot.project_id)
        {
            Some(existing) => *existing = snapshot.clone(),
            None => state.snapshots.push(snapshot.clone()),
        }
        Ok(())
    }

    fn append_history(
        &self,
        project_id: i64,
        metrics: Metrics,
        collect_date: NaiveDateTime,
    ) -> StorageResult<()> {
        let mut state = self.write()?;
        if state.failing_history.contains(&project_id) {
            return Err(StorageError::Sqlite(rusqlite::Error::InvalidQuery));
        }
        state
            .history
            .push(HistoryRecord::new(project_id, metrics, collect_date));
        Ok(())
    }

    fn list_project_ids(&self, page_size: u64, offset: u64) -> StorageResult<Vec<i64>> {
        let state = self.read()?;
        let ids: Vec<i64> = state.snapshots.iter().map(|s| s.project_id).collect();
        Ok(window(&ids, page_size, offset))
    }

    fn count_projects(&self) -> StorageResult<u64> {
        Ok(self.read()?.snapshots.len() as u64)
    }

    fn project_exists(&self, project_id: i64) -> StorageResult<bool> {
        Ok(self
            .read()?
            .snapshots
            .iter()
            .any(|s| s.project_id == project_id))
    }

    fn get_snapshot(&self, project_id: i64) -> StorageResult<Option<ProjectSnapshot>> {
        Ok(self
            .read()?
            .snapshots
            .iter()
            .find(|s| s.project_id == project_id)
            .cloned())
    }

    fn count_snapshots_on(&self, date: NaiveDate) -> StorageResult<u64> {
        Ok(self
            .read()?
            .snapshots
            .iter()
            .filter(|s| s.collect_date == date)
            .count() as u64)
    }

    fn list_snapshots_on(
        &self,
        date: NaiveDate,
        limit: u64,
        offset: u64,
    ) -> StorageResult<Vec<ProjectSnapshot>> {
        let state = self.read()?;
        let mut matching: Vec<ProjectSnapshot> = state
            .snapshots
            .iter()
            .filter(|s| s.collect_date == date)
            .cloned()
            .collect();
        // Stable sort keeps insertion order among equal star counts
        matching.sort_by(|a, b| b.stars.cmp(&a.stars));
        Ok(window(&matching, limit, offset))
    }

    fn history_since(
        &self,
        project_id: i64,
        since: NaiveDateTime,
    ) -> StorageResult<Vec<HistoryRecord>> {
        let state = self.read()?;
        let mut rows: Vec<HistoryRecord> = state
            .history
            .iter()
            .filter(|h| h.project_id == project_id && h.collect_date >= since)
            .cloned()
            .collect();
        rows.sort_by_key(|h| h.collect_date);
        Ok(rows)
    }

    fn count_history(&self) -> StorageResult<u64> {
        Ok(self.read()?.history.len() as u64)
    }

    fn latest_collect_date(&self) -> StorageResult<Option<NaiveDate>> {
        Ok(self.read()?.snapshots.iter().map(|s| s.collect_date).max())
    }
}

// ============================================================================
// Shared Repository Types
// ============================================================================

/// Thread-safe shared repository wrapper
pub type SharedProjectRepository = Arc<dyn ProjectRepository>;

/// Thread-safe shared schema inspector
pub type SharedSchemaInspector = Arc<dyn SchemaInspector>;

/// Open a SQLite repository usable both as store and inspector
pub fn create_sqlite_repository(
    path: impl AsRef<Path>,
) -> StorageResult<Arc<SqliteProjectRepository>> {
    Ok(Arc::new(SqliteProjectRepository::new(path)?))
}

// ============================================================================
// Tests
// ============================================================================
