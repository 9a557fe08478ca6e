//! In-memory implementations of the store contracts, for tests and smoke runs.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    session::{DailyHistory, HistoryArchive, SessionState, SessionStore},
    storage::StoreError,
    tasks::{TaskPatch, TaskStore, TaskTemplate},
};

fn lock<T>(inner: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    inner.lock().map_err(|err| StoreError::Storage {
        reason: format!("lock poisoned: {err}"),
    })
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryTaskStore {
    inner: Arc<Mutex<Vec<TaskTemplate>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, template: TaskTemplate) -> Result<Uuid, StoreError> {
        let id = template.id;
        lock(&self.inner)?.push(template);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<TaskTemplate>, StoreError> {
        Ok(lock(&self.inner)?.iter().find(|t| t.id == id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: TaskPatch,
        at: DateTime<Utc>,
    ) -> Result<TaskTemplate, StoreError> {
        let mut tasks = lock(&self.inner)?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound { key: id.to_string() })?;
        patch.apply(task, at);
        Ok(task.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tasks = lock(&self.inner)?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        Ok(tasks.len() != before)
    }

    async fn list(&self) -> Result<Vec<TaskTemplate>, StoreError> {
        Ok(lock(&self.inner)?.clone())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryHistoryArchive {
    inner: Arc<Mutex<Vec<DailyHistory>>>,
}

impl InMemoryHistoryArchive {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryArchive for InMemoryHistoryArchive {
    async fn append(&self, entry: DailyHistory) -> Result<(), StoreError> {
        lock(&self.inner)?.insert(0, entry);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DailyHistory>, StoreError> {
        Ok(lock(&self.inner)?.clone())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    inner: Arc<Mutex<SessionState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self) -> Result<SessionState, StoreError> {
        Ok(lock(&self.inner)?.clone())
    }

    async fn save(&self, state: &SessionState) -> Result<(), StoreError> {
        *lock(&self.inner)? = state.clone();
        Ok(())
    }
}
