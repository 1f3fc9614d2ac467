use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::application::ports::{QuotaStore, RepositoryError};
use crate::domain::{
    window_bounds, AsrVariant, QuotaEntry, QuotaOwner, QuotaStatus, UserId, WindowType,
};

pub struct PgQuotaStore {
    pool: PgPool,
}

impl PgQuotaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: sqlx::Error) -> RepositoryError {
    RepositoryError::QueryFailed(e.to_string())
}

fn map_entry(row: &PgRow) -> Result<QuotaEntry, RepositoryError> {
    let owner_user_id: Option<uuid::Uuid> = row.try_get("owner_user_id").map_err(query_failed)?;
    let variant: String = row.try_get("variant").map_err(query_failed)?;
    let window_type: String = row.try_get("window_type").map_err(query_failed)?;
    let status: String = row.try_get("status").map_err(query_failed)?;
    Ok(QuotaEntry {
        id: row.try_get("id").map_err(query_failed)?,
        owner: match owner_user_id {
            Some(id) => QuotaOwner::User(UserId::from_uuid(id)),
            None => QuotaOwner::Global,
        },
        provider: row.try_get("provider").map_err(query_failed)?,
        variant: variant
            .parse::<AsrVariant>()
            .map_err(RepositoryError::Conversion)?,
        window_type: window_type
            .parse::<WindowType>()
            .map_err(RepositoryError::Conversion)?,
        window_start: row.try_get("window_start").map_err(query_failed)?,
        window_end: row.try_get("window_end").map_err(query_failed)?,
        quota_seconds: row.try_get("quota_seconds").map_err(query_failed)?,
        used_seconds: row.try_get("used_seconds").map_err(query_failed)?,
        status: status
            .parse::<QuotaStatus>()
            .map_err(RepositoryError::Conversion)?,
    })
}

const QUOTA_COLUMNS: &str = "id, owner_user_id, provider, variant, window_type, window_start, \
     window_end, quota_seconds, used_seconds, status";

#[async_trait]
impl QuotaStore for PgQuotaStore {
    async fn list_for_key(
        &self,
        user_id: Option<UserId>,
        provider: &str,
        variant: AsrVariant,
    ) -> Result<Vec<QuotaEntry>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM quota_entries \
             WHERE provider = $1 AND variant = $2 \
               AND (owner_user_id IS NULL OR owner_user_id = $3)",
            QUOTA_COLUMNS
        ))
        .bind(provider)
        .bind(variant.as_str())
        .bind(user_id.map(|id| id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;
        rows.iter().map(map_entry).collect()
    }

    async fn list_visible(
        &self,
        user_id: Option<UserId>,
    ) -> Result<Vec<QuotaEntry>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM quota_entries \
             WHERE owner_user_id IS NULL OR owner_user_id = $1 \
             ORDER BY provider, variant, window_type",
            QUOTA_COLUMNS
        ))
        .bind(user_id.map(|id| id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;
        rows.iter().map(map_entry).collect()
    }

    /// The increment and the exhaustion flip happen in the database, never
    /// in application memory. The commit ledger makes replays no-ops, the
    /// same way the usage log dedups on `(request_id, attempt)`.
    #[instrument(skip(self, entry_ids), fields(entries = entry_ids.len(), seconds, commit_key))]
    async fn commit_usage(
        &self,
        entry_ids: &[uuid::Uuid],
        seconds: f64,
        commit_key: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(query_failed)?;

        let claimed = sqlx::query(
            "INSERT INTO quota_commits (commit_key, committed_at) VALUES ($1, $2) \
             ON CONFLICT (commit_key) DO NOTHING",
        )
        .bind(commit_key)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(query_failed)?;

        if claimed.rows_affected() == 0 {
            tracing::info!(commit_key, "Quota commit already applied, skipping");
            return Ok(());
        }

        sqlx::query(
            "UPDATE quota_entries \
             SET used_seconds = used_seconds + $1, \
                 status = CASE WHEN used_seconds + $1 >= quota_seconds \
                               THEN 'exhausted' ELSE status END \
             WHERE id = ANY($2)",
        )
        .bind(seconds)
        .bind(entry_ids)
        .execute(&mut *tx)
        .await
        .map_err(query_failed)?;

        tx.commit().await.map_err(query_failed)?;
        Ok(())
    }

    async fn apply_rollover(&self, entry: &QuotaEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE quota_entries \
             SET window_start = $1, window_end = $2, used_seconds = 0, status = 'active' \
             WHERE id = $3",
        )
        .bind(entry.window_start)
        .bind(entry.window_end)
        .bind(entry.id)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    #[instrument(skip(self), fields(provider, window_type = %window_type, reset))]
    async fn upsert(
        &self,
        owner: QuotaOwner,
        provider: &str,
        variant: AsrVariant,
        window_type: WindowType,
        quota_seconds: f64,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
        reset: bool,
    ) -> Result<QuotaEntry, RepositoryError> {
        let (window_start, window_end) =
            window.unwrap_or_else(|| window_bounds(window_type, Utc::now()));
        let owner_user_id = owner.user_id().map(|id| id.as_uuid());

        let row = sqlx::query(&format!(
            "INSERT INTO quota_entries (id, owner_user_id, provider, variant, window_type, \
             window_start, window_end, quota_seconds, used_seconds, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, 'active') \
             ON CONFLICT (owner_user_id, provider, variant, window_type) DO UPDATE SET \
                 quota_seconds = EXCLUDED.quota_seconds, \
                 window_start = EXCLUDED.window_start, \
                 window_end = EXCLUDED.window_end, \
                 used_seconds = CASE WHEN $9 THEN 0 ELSE quota_entries.used_seconds END, \
                 status = CASE WHEN $9 THEN 'active' ELSE quota_entries.status END \
             RETURNING {}",
            QUOTA_COLUMNS
        ))
        .bind(uuid::Uuid::new_v4())
        .bind(owner_user_id)
        .bind(provider)
        .bind(variant.as_str())
        .bind(window_type.as_str())
        .bind(window_start)
        .bind(window_end)
        .bind(quota_seconds)
        .bind(reset)
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed)?;

        map_entry(&row)
    }
}
