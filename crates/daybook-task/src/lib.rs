//! Task pool, history archive and session ledger persisted as JSON documents
//! in any `DocumentStore`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use daybook_core::{
    session::{DailyHistory, HistoryArchive, SessionState, SessionStore},
    storage::{DocumentStore, StoreError},
    tasks::{TaskPatch, TaskStore, TaskTemplate},
    Tracker,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::instrument;
use uuid::Uuid;

const TASKS_KEY: &str = "tasks";
const HISTORY_KEY: &str = "history";
const SESSION_KEY: &str = "session";

/// Tracker wired to one document store.
pub type DocumentTracker<S> =
    Tracker<DocumentTaskStore<S>, DocumentHistoryArchive<S>, DocumentSessionStore<S>>;

/// Builds a tracker whose three stores share `store`.
pub fn open_tracker<S: DocumentStore>(store: S) -> DocumentTracker<S> {
    let store = Arc::new(store);
    Tracker::new(
        DocumentTaskStore::new(Arc::clone(&store)),
        DocumentHistoryArchive::new(Arc::clone(&store)),
        DocumentSessionStore::new(store),
    )
}

async fn load<S, T>(store: &S, key: &str) -> Result<T, StoreError>
where
    S: DocumentStore + ?Sized,
    T: DeserializeOwned + Default,
{
    match store.get(key).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(StoreError::NotFound { .. }) => Ok(T::default()),
        Err(err) => Err(err),
    }
}

async fn save<S, T>(store: &S, key: &str, value: &T) -> Result<(), StoreError>
where
    S: DocumentStore + ?Sized,
    T: Serialize + ?Sized,
{
    let bytes = serde_json::to_vec_pretty(value)?;
    store.put(key, &bytes).await
}

/// Task templates stored as one JSON array.
pub struct DocumentTaskStore<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> DocumentTaskStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: DocumentStore> TaskStore for DocumentTaskStore<S> {
    #[instrument(skip(self, template), fields(id = %template.id))]
    async fn create(&self, template: TaskTemplate) -> Result<Uuid, StoreError> {
        let mut tasks: Vec<TaskTemplate> = load(self.store.as_ref(), TASKS_KEY).await?;
        let id = template.id;
        tasks.push(template);
        save(self.store.as_ref(), TASKS_KEY, &tasks).await?;
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<TaskTemplate>, StoreError> {
        let tasks: Vec<TaskTemplate> = load(self.store.as_ref(), TASKS_KEY).await?;
        Ok(tasks.into_iter().find(|t| t.id == id))
    }

    #[instrument(skip(self, patch))]
    async fn update(
        &self,
        id: Uuid,
        patch: TaskPatch,
        at: DateTime<Utc>,
    ) -> Result<TaskTemplate, StoreError> {
        let mut tasks: Vec<TaskTemplate> = load(self.store.as_ref(), TASKS_KEY).await?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound { key: id.to_string() })?;
        patch.apply(task, at);
        let updated = task.clone();
        save(self.store.as_ref(), TASKS_KEY, &tasks).await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tasks: Vec<TaskTemplate> = load(self.store.as_ref(), TASKS_KEY).await?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Ok(false);
        }
        save(self.store.as_ref(), TASKS_KEY, &tasks).await?;
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<TaskTemplate>, StoreError> {
        load(self.store.as_ref(), TASKS_KEY).await
    }
}

/// Ended sessions, newest first.
pub struct DocumentHistoryArchive<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> DocumentHistoryArchive<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: DocumentStore> HistoryArchive for DocumentHistoryArchive<S> {
    #[instrument(skip(self, entry), fields(date = %entry.date))]
    async fn append(&self, entry: DailyHistory) -> Result<(), StoreError> {
        let mut history: Vec<DailyHistory> = load(self.store.as_ref(), HISTORY_KEY).await?;
        history.insert(0, entry);
        save(self.store.as_ref(), HISTORY_KEY, &history).await
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<DailyHistory>, StoreError> {
        load(self.store.as_ref(), HISTORY_KEY).await
    }
}

pub struct DocumentSessionStore<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> DocumentSessionStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: DocumentStore> SessionStore for DocumentSessionStore<S> {
    #[instrument(skip(self))]
    async fn load(&self) -> Result<SessionState, StoreError> {
        load(self.store.as_ref(), SESSION_KEY).await
    }

    #[instrument(skip(self, state))]
    async fn save(&self, state: &SessionState) -> Result<(), StoreError> {
        save(self.store.as_ref(), SESSION_KEY, state).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveTime};
    use daybook_core::{
        clock::ManualClock,
        ids::SequentialIds,
        recurrence::{Recurrence, WeekDay},
        storage::InMemoryDocumentStore,
        tasks::{Category, NewTask, Priority, TaskStatus},
    };

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    fn draft(name: &str, date: NaiveDate) -> NewTask {
        NewTask {
            name: name.into(),
            description: Some("from the planner".into()),
            category: Category::Personal,
            priority: Priority::Low,
            date,
            start_time: NaiveTime::from_hms_opt(7, 30, 0).expect("time"),
            end_time: NaiveTime::from_hms_opt(8, 0, 0).expect("time"),
            end_date: None,
            recurrence: None,
        }
    }

    fn clock(at: &str) -> ManualClock {
        ManualClock::new(at.parse::<DateTime<Utc>>().expect("timestamp"))
    }

    #[tokio::test]
    async fn task_store_persists_templates() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let tasks = DocumentTaskStore::new(Arc::clone(&store));
        let at: DateTime<Utc> = "2024-06-03T06:00:00Z".parse().expect("timestamp");
        let template = TaskTemplate::new(Uuid::from_u128(1), draft("Run", day(2024, 6, 3)), at);

        tasks.create(template.clone()).await.expect("create");
        let reopened = DocumentTaskStore::new(store);
        assert_eq!(reopened.list().await.expect("list"), vec![template.clone()]);

        let updated = reopened
            .update(
                template.id,
                TaskPatch::status(TaskStatus::InProgress),
                at + Duration::minutes(5),
            )
            .await
            .expect("update");
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert_eq!(updated.version, 1);
        assert_eq!(updated.updated_at, at + Duration::minutes(5));
        assert_eq!(
            reopened.get(template.id).await.expect("get"),
            Some(updated)
        );

        assert!(reopened.delete(template.id).await.expect("delete"));
        assert!(!reopened.delete(template.id).await.expect("delete again"));
        let err = reopened
            .update(template.id, TaskPatch::default(), at)
            .await
            .expect_err("gone");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn empty_store_loads_defaults() {
        let store = Arc::new(InMemoryDocumentStore::new());
        assert!(DocumentTaskStore::new(Arc::clone(&store))
            .list()
            .await
            .expect("tasks")
            .is_empty());
        assert!(DocumentHistoryArchive::new(Arc::clone(&store))
            .list()
            .await
            .expect("history")
            .is_empty());
        assert_eq!(
            DocumentSessionStore::new(store).load().await.expect("session"),
            SessionState::default()
        );
    }

    #[tokio::test]
    async fn corrupt_document_is_a_codec_error() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.put(TASKS_KEY, b"not json").await.expect("put");
        let err = DocumentTaskStore::new(store)
            .list()
            .await
            .expect_err("corrupt");
        assert!(matches!(err, StoreError::Codec { .. }));
    }

    #[tokio::test]
    async fn tracker_state_survives_reopen() {
        let store = InMemoryDocumentStore::new();
        let clock = clock("2024-06-10T09:00:00Z");

        let tracker = open_tracker(store.clone())
            .with_clock(clock.clone())
            .with_ids(SequentialIds::new());
        let weekly = tracker
            .create(NewTask {
                end_date: Some(day(2024, 6, 24)),
                recurrence: Some(Recurrence::weekly([WeekDay::Mon])),
                ..draft("Stretch", day(2024, 6, 3))
            })
            .await
            .expect("create");
        tracker.start(weekly.id).await.expect("start");

        // A second process sees the running timer.
        let other = open_tracker(store.clone()).with_clock(clock.clone());
        let (active, _) = other.elapsed().await.expect("elapsed").expect("running");
        assert_eq!(active.task.id, weekly.id);

        clock.advance(Duration::minutes(25));
        let done = other.complete(weekly.id).await.expect("complete");
        assert_eq!(done.duration, 1500);

        other.end_session().await.expect("end");
        let reopened = open_tracker(store).with_clock(clock);
        let history = reopened.history().await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].completed_tasks, vec![done]);

        let today = reopened.today().await.expect("today");
        assert_eq!(today.entries[0].status, TaskStatus::Completed);
        let next = reopened.schedule_for(day(2024, 6, 17)).await.expect("next");
        assert_eq!(next.entries[0].status, TaskStatus::Pending);
    }
}
