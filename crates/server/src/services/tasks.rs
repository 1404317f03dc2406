//! In-process background queue for documentation generation.
//!
//! Requests enqueue a snippet id and get a task id back straight away; a fixed
//! pool of tokio workers drains the queue. Nothing prevents the same snippet
//! from being queued twice, and tasks for different snippets run in no
//! particular order.
//!
//! Finished records are kept for `RECORD_RETENTION` and pruned on the next
//! enqueue after that.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};
use uuid::Uuid;

use crate::{
    db::{snippets, Database},
    error::{AppError, Result},
    services::docgen::{DocumentationClient, DocumentationRequest, Generated},
};

const QUEUE_CAPACITY: usize = 256;
const RECORD_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task_id: Uuid,
    pub snippet_id: String,
    #[serde(skip_serializing)]
    pub owner_id: String,
    pub state: TaskState,
    pub result: Option<String>,
    #[serde(skip_serializing)]
    pub finished_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TaskHandle {
    pub id: Uuid,
}

struct Job {
    task_id: Uuid,
    snippet_id: String,
}

type TaskRegistry = Arc<RwLock<HashMap<Uuid, TaskRecord>>>;

#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<Job>,
    records: TaskRegistry,
    retention: Duration,
}

/// Outcome of one documentation task, before it is turned into a status line.
#[derive(Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    Documented,
    Failed(String),
    MissingSnippet,
}

impl TaskQueue {
    /// Spawn `workers` workers (at least one) on the current runtime.
    pub fn start(db: Database, docs: Arc<DocumentationClient>, workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>(QUEUE_CAPACITY);
        let receiver = Arc::new(Mutex::new(receiver));
        let records: TaskRegistry = Arc::new(RwLock::new(HashMap::new()));

        for worker in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            let records = Arc::clone(&records);
            let db = db.clone();
            let docs = Arc::clone(&docs);

            tokio::spawn(async move {
                loop {
                    // Hold the lock only while waiting for the next job.
                    let job = { receiver.lock().await.recv().await };
                    let Some(job) = job else { break };

                    set_state(&records, job.task_id, TaskState::Running, None).await;
                    let outcome = generate_documentation_task(&db, &docs, &job.snippet_id).await;
                    let state = match outcome {
                        Ok(TaskOutcome::Documented) => TaskState::Succeeded,
                        _ => TaskState::Failed,
                    };
                    let status = status_line(&job.snippet_id, &outcome);
                    tracing::info!(worker, task_id = %job.task_id, "{status}");
                    set_state(&records, job.task_id, state, Some(status)).await;
                }
            });
        }

        Self {
            sender,
            records,
            retention: RECORD_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub async fn enqueue(&self, snippet_id: &str, owner_id: &str) -> Result<TaskHandle> {
        let task_id = Uuid::new_v4();
        {
            let mut records = self.records.write().await;
            prune_finished(&mut records, Instant::now(), self.retention);
            records.insert(
                task_id,
                TaskRecord {
                    task_id,
                    snippet_id: snippet_id.to_string(),
                    owner_id: owner_id.to_string(),
                    state: TaskState::Pending,
                    result: None,
                    finished_at: None,
                },
            );
        }

        let job = Job {
            task_id,
            snippet_id: snippet_id.to_string(),
        };
        if self.sender.send(job).await.is_err() {
            self.records.write().await.remove(&task_id);
            return Err(AppError::Internal("Task queue is closed".to_string()));
        }

        Ok(TaskHandle { id: task_id })
    }

    pub async fn status(&self, task_id: Uuid) -> Option<TaskRecord> {
        self.records.read().await.get(&task_id).cloned()
    }

    /// Number of records currently held, finished or not.
    pub async fn tracked(&self) -> usize {
        self.records.read().await.len()
    }
}

async fn set_state(records: &TaskRegistry, task_id: Uuid, state: TaskState, result: Option<String>) {
    if let Some(record) = records.write().await.get_mut(&task_id) {
        record.state = state;
        record.result = result;
        if matches!(state, TaskState::Succeeded | TaskState::Failed) {
            record.finished_at = Some(Instant::now());
        }
    }
}

/// Drop records that finished more than `retention` ago. Pending and running
/// records are always kept.
fn prune_finished(records: &mut HashMap<Uuid, TaskRecord>, now: Instant, retention: Duration) {
    records.retain(|_, record| match record.finished_at {
        Some(finished) => now.duration_since(finished) < retention,
        None => true,
    });
}

/// Load the snippet, generate its documentation and store it. Generation
/// failures are reported, not stored.
pub async fn generate_documentation_task(
    db: &Database,
    docs: &DocumentationClient,
    snippet_id: &str,
) -> Result<TaskOutcome> {
    let Some(snippet) = snippets::find_snippet(&db.pool, snippet_id).await? else {
        return Ok(TaskOutcome::MissingSnippet);
    };

    let Some(request) = DocumentationRequest::for_snippet(&snippet) else {
        return Ok(TaskOutcome::Failed("Repository URL is missing".to_string()));
    };

    match docs.generate(&request).await {
        Generated::Documentation(content) => {
            snippets::document_snippet(&db.pool, &snippet, &content).await?;
            Ok(TaskOutcome::Documented)
        }
        Generated::Failed(message) => Ok(TaskOutcome::Failed(message)),
    }
}

pub fn status_line(snippet_id: &str, outcome: &Result<TaskOutcome>) -> String {
    match outcome {
        Ok(TaskOutcome::Documented) => format!("Documentation generated for snippet {snippet_id}"),
        Ok(TaskOutcome::MissingSnippet) => format!("Snippet {snippet_id} not found"),
        Ok(TaskOutcome::Failed(message)) => {
            format!("Documentation generation failed for snippet {snippet_id}: {message}")
        }
        Err(e) => format!("Documentation generation failed for snippet {snippet_id}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::{
        db::snippets::NewSnippet,
        services::docgen::{model::GenerativeModel, repository::RepositoryFetcher},
    };

    struct EchoModel;

    #[async_trait]
    impl GenerativeModel for EchoModel {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok("Generated docs".to_string())
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl GenerativeModel for BrokenModel {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            Err(anyhow!("offline"))
        }
    }

    fn docs(model: Arc<dyn GenerativeModel>) -> Arc<DocumentationClient> {
        Arc::new(
            DocumentationClient::new(model, RepositoryFetcher::new("http://127.0.0.1:1"))
                .with_base_delay(Duration::ZERO),
        )
    }

    async fn seeded() -> (Database, String) {
        let db = Database::connect_in_memory().await.unwrap();
        db.run_migrations().await.unwrap();
        let user_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, created_at) VALUES (?, 'Ada', 'ada@example.com', 'x', ?)",
        )
        .bind(&user_id)
        .bind(Utc::now())
        .execute(&db.pool)
        .await
        .unwrap();

        let mut conn = db.pool.acquire().await.unwrap();
        let snippet = snippets::insert_snippet(
            &mut conn,
            NewSnippet {
                user_id: user_id.clone(),
                url: Some("https://stackoverflow.com/q/1".into()),
                name_or_title: Some("Question".into()),
                code: Some("fn main() {}".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        (db, snippet.id)
    }

    #[tokio::test]
    async fn task_persists_generated_documentation() {
        let (db, snippet_id) = seeded().await;
        let outcome = generate_documentation_task(&db, &docs(Arc::new(EchoModel)), &snippet_id)
            .await
            .unwrap();
        assert_eq!(outcome, TaskOutcome::Documented);

        let doc = snippets::documentation_for_snippet(&db.pool, &snippet_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.content, "Generated docs");
    }

    #[tokio::test]
    async fn failed_generation_is_not_persisted() {
        let (db, snippet_id) = seeded().await;
        let outcome = generate_documentation_task(&db, &docs(Arc::new(BrokenModel)), &snippet_id)
            .await
            .unwrap();
        assert!(matches!(outcome, TaskOutcome::Failed(_)));

        let snippet = snippets::find_snippet(&db.pool, &snippet_id).await.unwrap().unwrap();
        assert!(!snippet.has_documentation);
    }

    #[tokio::test]
    async fn unknown_snippet_is_reported() {
        let (db, _) = seeded().await;
        let outcome = generate_documentation_task(&db, &docs(Arc::new(EchoModel)), "missing").await;
        assert_eq!(status_line("missing", &outcome), "Snippet missing not found");
    }

    #[tokio::test]
    async fn queued_task_runs_to_completion() {
        let (db, snippet_id) = seeded().await;
        let queue = TaskQueue::start(db.clone(), docs(Arc::new(EchoModel)), 2);

        let handle = queue.enqueue(&snippet_id, "owner").await.unwrap();
        let mut record = queue.status(handle.id).await.unwrap();
        for _ in 0..100 {
            if matches!(record.state, TaskState::Succeeded | TaskState::Failed) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            record = queue.status(handle.id).await.unwrap();
        }

        assert_eq!(record.state, TaskState::Succeeded);
        assert_eq!(
            record.result.as_deref(),
            Some(format!("Documentation generated for snippet {snippet_id}").as_str())
        );
    }

    async fn wait_until_finished(queue: &TaskQueue, id: Uuid) -> TaskRecord {
        let mut record = queue.status(id).await.unwrap();
        for _ in 0..100 {
            if record.finished_at.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            record = queue.status(id).await.unwrap();
        }
        record
    }

    #[tokio::test]
    async fn finished_records_expire_on_next_enqueue() {
        let (db, snippet_id) = seeded().await;
        let queue = TaskQueue::start(db.clone(), docs(Arc::new(EchoModel)), 1)
            .with_retention(Duration::ZERO);

        let first = queue.enqueue(&snippet_id, "owner").await.unwrap();
        assert_eq!(wait_until_finished(&queue, first.id).await.state, TaskState::Succeeded);

        let second = queue.enqueue(&snippet_id, "owner").await.unwrap();
        assert!(queue.status(first.id).await.is_none());
        assert!(queue.status(second.id).await.is_some());
    }

    #[test]
    fn unfinished_records_are_never_pruned() {
        let now = Instant::now();
        let record = |state, finished_at| TaskRecord {
            task_id: Uuid::new_v4(),
            snippet_id: "s".to_string(),
            owner_id: "o".to_string(),
            state,
            result: None,
            finished_at,
        };
        let pending = record(TaskState::Pending, None);
        let done = record(TaskState::Succeeded, Some(now));
        let mut records = HashMap::from([
            (pending.task_id, pending.clone()),
            (done.task_id, done.clone()),
        ]);

        prune_finished(&mut records, now + Duration::from_secs(5), Duration::from_secs(10));
        assert_eq!(records.len(), 2);

        prune_finished(&mut records, now + Duration::from_secs(10), Duration::from_secs(10));
        assert_eq!(records.len(), 1);
        assert!(records.contains_key(&pending.task_id));
    }

    #[tokio::test]
    async fn closed_queue_leaves_no_pending_record() {
        let (sender, receiver) = mpsc::channel::<Job>(1);
        drop(receiver);
        let queue = TaskQueue {
            sender,
            records: Arc::new(RwLock::new(HashMap::new())),
            retention: RECORD_RETENTION,
        };

        let err = queue.enqueue("snippet", "owner").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(queue.tracked().await, 0);
    }
}
