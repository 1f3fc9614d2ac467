use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::RepositoryError;
use crate::domain::{AsrVariant, QuotaEntry, QuotaOwner, UserId, WindowType};

/// Durable quota rows. The store returns raw rows; layering (user over
/// global) and rollover policy live in the quota service.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// All rows for a (provider, variant) visible to this user: the user's
    /// own rows plus the global defaults.
    async fn list_for_key(
        &self,
        user_id: Option<UserId>,
        provider: &str,
        variant: AsrVariant,
    ) -> Result<Vec<QuotaEntry>, RepositoryError>;

    /// Every row visible to this user across providers and variants.
    async fn list_visible(
        &self,
        user_id: Option<UserId>,
    ) -> Result<Vec<QuotaEntry>, RepositoryError>;

    /// Atomic `used_seconds += seconds` on the given rows, flipping status
    /// to exhausted in the same statement when the cap is crossed. Done in
    /// SQL so concurrent workers never race a read-modify-write.
    ///
    /// `commit_key` identifies one stage attempt (`task:stage:attempt`);
    /// replaying a key already in the commit ledger is a no-op, so a
    /// resumed stage cannot charge the same seconds twice.
    async fn commit_usage(
        &self,
        entry_ids: &[uuid::Uuid],
        seconds: f64,
        commit_key: &str,
    ) -> Result<(), RepositoryError>;

    /// Persist a rolled-over window: new bounds, usage cleared, active.
    async fn apply_rollover(&self, entry: &QuotaEntry) -> Result<(), RepositoryError>;

    /// Create or update the row for (owner, provider, variant, window_type).
    async fn upsert(
        &self,
        owner: QuotaOwner,
        provider: &str,
        variant: AsrVariant,
        window_type: WindowType,
        quota_seconds: f64,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
        reset: bool,
    ) -> Result<QuotaEntry, RepositoryError>;
}
