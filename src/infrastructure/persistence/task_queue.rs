use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::{mpsc, Mutex};

use crate::application::ports::{QueueError, TaskMessage, TaskQueue};

const QUEUE_KEY: &str = "pipeline:tasks";
const POP_TIMEOUT_SECONDS: f64 = 5.0;

/// Durable queue between the API tier and the worker pool, backed by a
/// Redis list. BRPOP with a short timeout keeps workers responsive to
/// shutdown without busy-waiting.
pub struct RedisTaskQueue {
    connection: ConnectionManager,
}

impl RedisTaskQueue {
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client =
            redis::Client::open(url).map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn push(&self, message: &TaskMessage) -> Result<(), QueueError> {
        let payload =
            serde_json::to_string(message).map_err(|e| QueueError::Encoding(e.to_string()))?;
        let mut connection = self.connection.clone();
        redis::cmd("LPUSH")
            .arg(QUEUE_KEY)
            .arg(payload)
            .query_async::<()>(&mut connection)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<TaskMessage>, QueueError> {
        let mut connection = self.connection.clone();
        loop {
            let result: Option<(String, String)> = redis::cmd("BRPOP")
                .arg(QUEUE_KEY)
                .arg(POP_TIMEOUT_SECONDS)
                .query_async(&mut connection)
                .await
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            match result {
                Some((_, payload)) => {
                    let message = serde_json::from_str(&payload)
                        .map_err(|e| QueueError::Encoding(e.to_string()))?;
                    return Ok(Some(message));
                }
                None => continue,
            }
        }
    }
}

/// In-process queue for tests and single-node development.
pub struct InMemoryTaskQueue {
    sender: mpsc::Sender<TaskMessage>,
    receiver: Mutex<mpsc::Receiver<TaskMessage>>,
}

impl InMemoryTaskQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn push(&self, message: &TaskMessage) -> Result<(), QueueError> {
        self.sender
            .send(message.clone())
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))
    }

    async fn pop(&self) -> Result<Option<TaskMessage>, QueueError> {
        let mut receiver = self.receiver.lock().await;
        Ok(receiver.recv().await)
    }
}
