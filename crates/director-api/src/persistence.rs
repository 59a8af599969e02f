use std::fmt;
use std::path::Path;

use contracts::{Project, TickRecord};
use director_core::StoryThread;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedProjectSummary {
    pub project_id: String,
    pub title: String,
    pub updated_at: String,
}

#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    NotAttached,
    ProjectAlreadyExists(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
            Self::NotAttached => write!(f, "sqlite store is not attached"),
            Self::ProjectAlreadyExists(project_id) => {
                write!(f, "project {project_id} already exists in the store")
            }
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

#[derive(Debug)]
pub struct SqliteDirectorStore {
    conn: Connection,
}

impl SqliteDirectorStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    pub fn project_exists(&self, project_id: &str) -> Result<bool, PersistenceError> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT project_id FROM projects WHERE project_id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn delete_project(&mut self, project_id: &str) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM tick_records WHERE project_id = ?1",
            params![project_id],
        )?;
        tx.execute(
            "DELETE FROM threads WHERE project_id = ?1",
            params![project_id],
        )?;
        tx.execute(
            "DELETE FROM projects WHERE project_id = ?1",
            params![project_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Persist the project row, the thread snapshot, and any records not yet
    /// written. Records are insert-or-ignore, so re-flushing is idempotent.
    pub fn persist_delta(
        &mut self,
        project: &Project,
        thread: &StoryThread,
        new_records: &[TickRecord],
    ) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;

        let project_json = serde_json::to_string(project)?;
        let latest_tick = thread.history.next_tick_index();
        tx.execute(
            "INSERT INTO projects (project_id, schema_version, title, payload_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(project_id) DO UPDATE SET
                schema_version = excluded.schema_version,
                title = excluded.title,
                payload_json = excluded.payload_json,
                updated_at = excluded.updated_at",
            params![
                project.project_id.as_str(),
                project.schema_version.as_str(),
                project.title.as_str(),
                project_json,
                tick_stamp(0),
                tick_stamp(latest_tick),
            ],
        )?;

        let thread_json = serde_json::to_string(thread)?;
        tx.execute(
            "INSERT INTO threads (project_id, thread_id, thread_json, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_id, thread_id) DO UPDATE SET
                thread_json = excluded.thread_json,
                updated_at = excluded.updated_at",
            params![
                project.project_id.as_str(),
                thread.thread_id.as_str(),
                thread_json,
                tick_stamp(latest_tick),
            ],
        )?;

        for record in new_records {
            let record_json = serde_json::to_string(record)?;
            tx.execute(
                "INSERT OR IGNORE INTO tick_records (
                    project_id,
                    thread_id,
                    tick_index,
                    record_json,
                    created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    project.project_id.as_str(),
                    thread.thread_id.as_str(),
                    i64::try_from(record.tick_index).unwrap_or(i64::MAX),
                    record_json,
                    record.timestamp.as_str(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn list_projects(
        &self,
        limit: usize,
    ) -> Result<Vec<PersistedProjectSummary>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, title, updated_at
             FROM projects
             ORDER BY updated_at DESC, project_id ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            Ok(PersistedProjectSummary {
                project_id: row.get(0)?,
                title: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }

    pub fn load_project(&self, project_id: &str) -> Result<Option<Project>, PersistenceError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload_json FROM projects WHERE project_id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(raw) => Ok(Some(serde_json::from_str::<Project>(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn load_thread(
        &self,
        project_id: &str,
        thread_id: &str,
    ) -> Result<Option<StoryThread>, PersistenceError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT thread_json FROM threads WHERE project_id = ?1 AND thread_id = ?2",
                params![project_id, thread_id],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(raw) => Ok(Some(serde_json::from_str::<StoryThread>(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn load_records_range(
        &self,
        project_id: &str,
        thread_id: &str,
        from_tick: u64,
        to_tick: u64,
    ) -> Result<Vec<TickRecord>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT record_json
             FROM tick_records
             WHERE project_id = ?1 AND thread_id = ?2 AND tick_index >= ?3 AND tick_index <= ?4
             ORDER BY tick_index ASC",
        )?;
        let rows = stmt.query_map(
            params![
                project_id,
                thread_id,
                i64::try_from(from_tick).unwrap_or(i64::MAX),
                i64::try_from(to_tick).unwrap_or(i64::MAX)
            ],
            |row| row.get::<_, String>(0),
        )?;

        let mut records = Vec::new();
        for row in rows {
            let payload = row?;
            records.push(serde_json::from_str::<TickRecord>(&payload)?);
        }
        Ok(records)
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS projects (
                project_id TEXT PRIMARY KEY,
                schema_version TEXT NOT NULL,
                title TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS threads (
                project_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                thread_json TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (project_id, thread_id)
            );

            CREATE TABLE IF NOT EXISTS tick_records (
                project_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                tick_index INTEGER NOT NULL,
                record_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (project_id, thread_id, tick_index)
            );

            CREATE INDEX IF NOT EXISTS idx_tick_records_thread
                ON tick_records(project_id, thread_id, tick_index);
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, name, applied_at)
             VALUES(1, 'initial_v1', 'tick-000000')",
            [],
        )?;

        Ok(())
    }
}

fn tick_stamp(tick: u64) -> String {
    format!("tick-{tick:06}")
}
