use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use crate::application::ports::RepositoryError;

const CONNECT_ATTEMPTS: u32 = 6;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the PostgreSQL pool, retrying with backoff so the server can
/// come up alongside its database in compose-style deployments.
#[instrument(skip(url))]
pub async fn create_pool(url: &str, max_connections: u32) -> Result<PgPool, RepositoryError> {
    let mut delay = Duration::from_millis(250);

    for attempt in 1..=CONNECT_ATTEMPTS {
        match PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
        {
            Ok(pool) => {
                info!(max_connections, "PostgreSQL pool ready");
                return Ok(pool);
            }
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                warn!(
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "PostgreSQL not reachable yet, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => {
                return Err(RepositoryError::ConnectionFailed(e.to_string()));
            }
        }
    }

    Err(RepositoryError::ConnectionFailed(
        "connection retries exhausted".to_string(),
    ))
}
