use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::task::{TaskId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Asr,
    Llm,
    Storage,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Asr => "asr",
            ServiceKind::Llm => "llm",
            ServiceKind::Storage => "storage",
        }
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asr" => Ok(ServiceKind::Asr),
            "llm" => Ok(ServiceKind::Llm),
            "storage" => Ok(ServiceKind::Storage),
            _ => Err(format!("Invalid service kind: {}", s)),
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only record of one provider call's estimated cost.
/// `(request_id, attempt)` makes retried writes idempotent.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub service_kind: ServiceKind,
    pub provider: String,
    pub user_id: Option<UserId>,
    pub task_id: Option<TaskId>,
    pub estimated_cost: f64,
    pub tokens: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub request_id: String,
    pub attempt: i32,
}

impl UsageRecord {
    pub fn new(
        service_kind: ServiceKind,
        provider: &str,
        estimated_cost: f64,
        request_id: &str,
        attempt: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            service_kind,
            provider: provider.to_string(),
            user_id: None,
            task_id: None,
            estimated_cost,
            tokens: None,
            duration_seconds: None,
            request_id: request_id.to_string(),
            attempt,
        }
    }

    pub fn with_task(mut self, user_id: UserId, task_id: TaskId) -> Self {
        self.user_id = Some(user_id);
        self.task_id = Some(task_id);
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_tokens(mut self, tokens: i64) -> Self {
        self.tokens = Some(tokens);
        self
    }
}
