//! In-process API facade over the director core, with thread bookkeeping,
//! delta-flush SQLite persistence, and the HTTP server.

mod persistence;
mod server;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use contracts::{DirectorConfig, Project, TickRecord};
use director_core::{
    validate_config, validate_project, ConditionReport, Director, NlJudge, StoryThread, TickError,
    ValidationError,
};
use persistence::SqliteDirectorStore;
pub use persistence::{PersistedProjectSummary, PersistenceError};
pub use server::{serve, ServerError};

#[derive(Debug)]
pub enum DirectorApiError {
    Validation(ValidationError),
    ThreadExists(String),
    ThreadNotFound(String),
    Tick(TickError),
    Persistence(PersistenceError),
}

impl fmt::Display for DirectorApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::ThreadExists(thread_id) => write!(f, "thread {thread_id} already exists"),
            Self::ThreadNotFound(thread_id) => write!(f, "thread {thread_id} not found"),
            Self::Tick(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for DirectorApiError {}

impl From<ValidationError> for DirectorApiError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<TickError> for DirectorApiError {
    fn from(value: TickError) -> Self {
        Self::Tick(value)
    }
}

impl From<PersistenceError> for DirectorApiError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

struct PersistenceState {
    store: SqliteDirectorStore,
    persisted_record_counts: BTreeMap<String, usize>,
}

pub struct DirectorApi {
    project: Project,
    director: Director,
    threads: BTreeMap<String, StoryThread>,
    persistence: Option<PersistenceState>,
    last_persistence_error: Option<String>,
}

impl fmt::Debug for DirectorApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectorApi")
            .field("project", &self.project)
            .field("director", &self.director)
            .field("threads", &self.threads)
            .field("persistence", &self.persistence.is_some())
            .field("last_persistence_error", &self.last_persistence_error)
            .finish()
    }
}

impl DirectorApi {
    /// Validate and adopt a project. The stub judge answers any NL
    /// conditions; swap in a live judge with [`DirectorApi::with_judge`].
    pub fn from_project(project: Project) -> Result<Self, DirectorApiError> {
        Self::with_director(project, Director::with_stub_judge())
    }

    pub fn with_judge(project: Project, judge: Box<dyn NlJudge>) -> Result<Self, DirectorApiError> {
        Self::with_director(project, Director::new(judge))
    }

    fn with_director(project: Project, director: Director) -> Result<Self, DirectorApiError> {
        validate_project(&project)?;
        Ok(Self {
            project,
            director,
            threads: BTreeMap::new(),
            persistence: None,
            last_persistence_error: None,
        })
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn project_id(&self) -> &str {
        &self.project.project_id
    }

    pub fn thread_ids(&self) -> Vec<String> {
        self.threads.keys().cloned().collect()
    }

    pub fn thread(&self, thread_id: &str) -> Result<&StoryThread, DirectorApiError> {
        self.threads
            .get(thread_id)
            .ok_or_else(|| DirectorApiError::ThreadNotFound(thread_id.to_string()))
    }

    pub fn create_thread(&mut self, thread_id: &str) -> Result<&StoryThread, DirectorApiError> {
        if self.threads.contains_key(thread_id) {
            return Err(DirectorApiError::ThreadExists(thread_id.to_string()));
        }
        let thread = StoryThread::new(thread_id, &self.project);
        self.threads.insert(thread_id.to_string(), thread);
        Ok(&self.threads[thread_id])
    }

    /// Restore a thread snapshot from the attached store, replacing any
    /// in-memory thread of the same id.
    pub fn restore_thread(&mut self, thread_id: &str) -> Result<bool, DirectorApiError> {
        let Some(state) = self.persistence.as_ref() else {
            return Err(PersistenceError::NotAttached.into());
        };
        let Some(thread) = state
            .store
            .load_thread(&self.project.project_id, thread_id)?
        else {
            return Ok(false);
        };
        if let Some(state) = self.persistence.as_mut() {
            state
                .persisted_record_counts
                .insert(thread_id.to_string(), thread.history.records().len());
        }
        self.threads.insert(thread_id.to_string(), thread);
        Ok(true)
    }

    /// Run `steps` ticks on one thread, flushing persistence after the batch.
    pub fn tick(
        &mut self,
        thread_id: &str,
        config: &DirectorConfig,
        steps: u64,
    ) -> Result<Vec<TickRecord>, DirectorApiError> {
        validate_config(config)?;
        let thread = self
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| DirectorApiError::ThreadNotFound(thread_id.to_string()))?;
        let mut records = Vec::new();
        for _ in 0..steps {
            records.push(self.director.tick(&self.project, thread, config)?);
        }
        self.flush_persistence();
        Ok(records)
    }

    /// Advance every thread by one tick, in parallel. Each thread owns its
    /// state and history, so this matches ticking them one by one.
    pub fn tick_all_threads(
        &mut self,
        config: &DirectorConfig,
    ) -> Result<Vec<(String, Result<TickRecord, TickError>)>, DirectorApiError> {
        validate_config(config)?;
        let mut refs = self.threads.values_mut().collect::<Vec<_>>();
        let results = self.director.tick_threads(&self.project, &mut refs, config);
        let outcomes = self
            .threads
            .keys()
            .cloned()
            .zip(results)
            .collect::<Vec<_>>();
        self.flush_persistence();
        Ok(outcomes)
    }

    pub fn records(
        &self,
        thread_id: &str,
        from_tick: u64,
        to_tick: u64,
    ) -> Result<Vec<TickRecord>, DirectorApiError> {
        let thread = self.thread(thread_id)?;
        Ok(thread
            .history
            .records()
            .iter()
            .filter(|record| record.tick_index >= from_tick && record.tick_index <= to_tick)
            .cloned()
            .collect())
    }

    pub fn explain(
        &self,
        thread_id: &str,
        storylet_id: &str,
        config: &DirectorConfig,
    ) -> Result<Vec<ConditionReport>, DirectorApiError> {
        let thread = self.thread(thread_id)?;
        Ok(self
            .director
            .explain(&self.project, storylet_id, &thread.state, config)?)
    }

    pub fn replay(
        &self,
        config: &DirectorConfig,
        from_tick: u64,
        to_tick: u64,
    ) -> Result<Vec<TickRecord>, DirectorApiError> {
        validate_config(config)?;
        Ok(self
            .director
            .replay(&self.project, config, from_tick, to_tick)?)
    }

    pub fn attach_sqlite_store(&mut self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let store = SqliteDirectorStore::open(path)?;
        self.persistence = Some(PersistenceState {
            store,
            persisted_record_counts: BTreeMap::new(),
        });
        Ok(())
    }

    pub fn initialize_storage(&mut self, replace_existing: bool) -> Result<(), PersistenceError> {
        let project_id = self.project.project_id.clone();
        let Some(state) = self.persistence.as_mut() else {
            return Err(PersistenceError::NotAttached);
        };
        if state.store.project_exists(&project_id)? {
            if replace_existing {
                state.store.delete_project(&project_id)?;
                state.persisted_record_counts.clear();
            } else {
                return Err(PersistenceError::ProjectAlreadyExists(project_id));
            }
        }
        self.flush_persistence_checked()?;
        self.last_persistence_error = None;
        Ok(())
    }

    pub fn flush_persistence_checked(&mut self) -> Result<(), PersistenceError> {
        let Some(state) = self.persistence.as_mut() else {
            return Err(PersistenceError::NotAttached);
        };
        for thread in self.threads.values() {
            let persisted = state
                .persisted_record_counts
                .get(&thread.thread_id)
                .copied()
                .unwrap_or(0);
            let new_records = &thread.history.records()[persisted.min(thread.history.records().len())..];
            state.store.persist_delta(&self.project, thread, new_records)?;
            state
                .persisted_record_counts
                .insert(thread.thread_id.clone(), thread.history.records().len());
        }
        Ok(())
    }

    /// Best-effort flush: persistence trouble is reported, never fatal to a
    /// tick that already committed.
    fn flush_persistence(&mut self) {
        if self.persistence.is_none() {
            return;
        }
        match self.flush_persistence_checked() {
            Ok(()) => self.last_persistence_error = None,
            Err(err) => self.last_persistence_error = Some(err.to_string()),
        }
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.last_persistence_error.as_deref()
    }

    pub fn load_persisted_records(
        &self,
        thread_id: &str,
        from_tick: u64,
        to_tick: u64,
    ) -> Result<Vec<TickRecord>, PersistenceError> {
        let Some(state) = self.persistence.as_ref() else {
            return Err(PersistenceError::NotAttached);
        };
        state
            .store
            .load_records_range(&self.project.project_id, thread_id, from_tick, to_tick)
    }

    pub fn list_persisted_projects(
        &self,
        limit: usize,
    ) -> Result<Vec<PersistedProjectSummary>, PersistenceError> {
        let Some(state) = self.persistence.as_ref() else {
            return Err(PersistenceError::NotAttached);
        };
        state.store.list_projects(limit)
    }
}
