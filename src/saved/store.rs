use std::{sync::Arc, time::Duration};

use chrono::Utc;
use dashmap::DashMap;
use sqlx::{Pool, Postgres, postgres::PgListener};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    quiz::models::Quiz,
    saved::{
        db::{self, NOTIFY_CHANNEL},
        models::SavedQuizRecord,
    },
};

const FEED_BUFFER: usize = 16;
const CHANGES_BUFFER: usize = 256;
const LISTENER_RETRY: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Quiz to save is empty")]
    EmptyQuiz,

    #[error("Topic to save is empty")]
    EmptyTopic,
}

/// One item of a live feed: the user's full record set, or the error that ended the feed.
pub type FeedItem = Result<Vec<SavedQuizRecord>, StoreError>;

/// Per-user collections of saved quizzes with a live feed.
#[derive(Clone)]
pub enum QuizStore {
    Postgres(PostgresStore),
    Memory(MemoryStore),
}

impl QuizStore {
    pub fn memory() -> Self {
        QuizStore::Memory(MemoryStore::new())
    }

    pub async fn postgres(pool: Pool<Postgres>) -> Result<Self, sqlx::Error> {
        Ok(QuizStore::Postgres(PostgresStore::connect(pool).await?))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QuizStore::Postgres(_) => "postgres",
            QuizStore::Memory(_) => "memory",
        }
    }

    /// Appends a record. Every call creates a new record, repeated saves included.
    pub async fn save(
        &self,
        user_id: &Uuid,
        topic: &str,
        quiz: &Quiz,
    ) -> Result<SavedQuizRecord, StoreError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(StoreError::EmptyTopic);
        }
        if quiz.is_empty() {
            return Err(StoreError::EmptyQuiz);
        }

        let record = match self {
            QuizStore::Postgres(pg) => {
                db::insert_saved_quiz(&pg.pool, user_id, topic, quiz).await?
            }
            QuizStore::Memory(memory) => memory.insert(user_id, topic, quiz),
        };

        info!("Saved quiz {} for user {}", record.id, user_id);
        Ok(record)
    }

    /// Newest first.
    pub async fn list(&self, user_id: &Uuid) -> Result<Vec<SavedQuizRecord>, StoreError> {
        match self {
            QuizStore::Postgres(pg) => Ok(db::list_saved_quizzes(&pg.pool, user_id).await?),
            QuizStore::Memory(memory) => Ok(memory.list(user_id)),
        }
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        match self {
            QuizStore::Postgres(pg) => Ok(db::health_check(&pg.pool).await?),
            QuizStore::Memory(_) => Ok(()),
        }
    }

    fn changes(&self) -> &broadcast::Sender<Uuid> {
        match self {
            QuizStore::Postgres(pg) => &pg.changes,
            QuizStore::Memory(memory) => &memory.changes,
        }
    }

    /// Opens a live feed of the user's full record set. The current set is
    /// delivered first, then the full set again after every change. A failing
    /// feed delivers its error as the last item.
    pub fn subscribe(&self, user_id: Uuid) -> Subscription {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        // Subscribe before the first snapshot so no change falls in between.
        let changes = self.changes().subscribe();
        let store = self.clone();

        let task = tokio::spawn(async move {
            if let Err(e) = feed(&store, user_id, changes, &tx).await {
                error!("Subscription for user {} stopped: {}", user_id, e);
                let _ = tx.send(Err(e)).await;
            }
        });

        debug!("Opened subscription for user {}", user_id);
        Subscription::new(rx, task)
    }
}

/// Dropping the subscription detaches it from the store.
pub struct Subscription {
    rx: mpsc::Receiver<FeedItem>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<FeedItem>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Next feed item, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<FeedItem> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn push_snapshot(
    store: &QuizStore,
    user_id: &Uuid,
    tx: &mpsc::Sender<FeedItem>,
) -> Result<bool, StoreError> {
    let records = store.list(user_id).await?;
    Ok(tx.send(Ok(records)).await.is_ok())
}

async fn feed(
    store: &QuizStore,
    user_id: Uuid,
    mut changes: broadcast::Receiver<Uuid>,
    tx: &mpsc::Sender<FeedItem>,
) -> Result<(), StoreError> {
    if !push_snapshot(store, &user_id, tx).await? {
        return Ok(());
    }

    loop {
        match changes.recv().await {
            Ok(changed) if changed != user_id => continue,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Subscription for {} lagged by {} changes", user_id, n);
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }

        if !push_snapshot(store, &user_id, tx).await? {
            return Ok(());
        }
    }
}

/// Postgres backend. A single `LISTEN` connection serves every subscription,
/// so open feeds never hold pool connections.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool<Postgres>,
    changes: broadcast::Sender<Uuid>,
}

impl PostgresStore {
    pub async fn connect(pool: Pool<Postgres>) -> Result<Self, sqlx::Error> {
        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(NOTIFY_CHANNEL).await?;

        let (changes, _) = broadcast::channel(CHANGES_BUFFER);
        tokio::spawn(relay_notifications(listener, changes.clone()));
        info!("Listening for saved quiz changes on '{}'", NOTIFY_CHANNEL);

        Ok(Self { pool, changes })
    }
}

/// Forwards every `saved_quiz` notification as the changed user id.
async fn relay_notifications(mut listener: PgListener, changes: broadcast::Sender<Uuid>) {
    loop {
        match listener.recv().await {
            Ok(notification) => match notification.payload().parse::<Uuid>() {
                // No receivers just means nobody is subscribed.
                Ok(user_id) => {
                    let _ = changes.send(user_id);
                }
                Err(_) => warn!(
                    "Ignoring notification with invalid payload: {}",
                    notification.payload()
                ),
            },
            Err(e) => {
                error!("Saved quiz listener failed, retrying: {}", e);
                tokio::time::sleep(LISTENER_RETRY).await;
            }
        }
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    records: Arc<DashMap<Uuid, Vec<SavedQuizRecord>>>,
    changes: broadcast::Sender<Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGES_BUFFER);
        Self {
            records: Arc::new(DashMap::new()),
            changes,
        }
    }

    fn insert(&self, user_id: &Uuid, topic: &str, quiz: &Quiz) -> SavedQuizRecord {
        let record = SavedQuizRecord {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            num_questions: quiz.len() as i32,
            date: Utc::now(),
            quiz: quiz.clone(),
        };

        self.records
            .entry(*user_id)
            .or_default()
            .push(record.clone());

        let _ = self.changes.send(*user_id);
        record
    }

    fn list(&self, user_id: &Uuid) -> Vec<SavedQuizRecord> {
        self.records
            .get(user_id)
            .map(|records| records.iter().rev().cloned().collect())
            .unwrap_or_default()
    }
}
