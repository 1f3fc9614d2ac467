use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::ports::{QuotaStore, RepositoryError};
use crate::domain::{AsrVariant, QuotaEntry, QuotaOwner, UserId, WindowType};

/// Quota amount as accepted by the refresh API.
#[derive(Debug, Clone, Copy)]
pub enum QuotaAmount {
    Seconds(f64),
    Hours(f64),
}

impl QuotaAmount {
    pub fn as_seconds(&self) -> f64 {
        match self {
            QuotaAmount::Seconds(s) => *s,
            QuotaAmount::Hours(h) => h * 3600.0,
        }
    }
}

/// Guards per-owner, per-provider, per-variant usage caps across day,
/// month and total windows.
///
/// Layering: per-user rows for a (provider, variant) override the global
/// defaults; with neither, the key is uncapped. All effective windows are
/// conjunctive: one exhausted window makes the key unavailable.
pub struct QuotaService {
    store: Arc<dyn QuotaStore>,
}

impl QuotaService {
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self { store }
    }

    /// The rows that actually govern this (user, provider, variant),
    /// after applying window rollover.
    pub async fn query(
        &self,
        user_id: Option<UserId>,
        provider: &str,
        variant: AsrVariant,
        now: DateTime<Utc>,
    ) -> Result<Vec<QuotaEntry>, RepositoryError> {
        let rows = self.store.list_for_key(user_id, provider, variant).await?;
        let rows = self.rollover_expired(rows, now).await?;
        Ok(effective_entries(rows, user_id))
    }

    /// True iff every effective entry is in-window and below its cap.
    /// A key with no entries at all is uncapped, hence available.
    pub async fn check_available(
        &self,
        user_id: Option<UserId>,
        provider: &str,
        variant: AsrVariant,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let entries = self.query(user_id, provider, variant, now).await?;
        Ok(entries.iter().all(|entry| entry.is_available(now)))
    }

    /// Remaining fraction of the tightest effective window, or `None` when
    /// the key is uncapped.
    pub async fn remaining_fraction(
        &self,
        user_id: Option<UserId>,
        provider: &str,
        variant: AsrVariant,
        now: DateTime<Utc>,
    ) -> Result<Option<f64>, RepositoryError> {
        let entries = self.query(user_id, provider, variant, now).await?;
        if entries.is_empty() {
            return Ok(None);
        }
        let min = entries
            .iter()
            .map(|entry| {
                if entry.in_window(now) {
                    entry.remaining_fraction()
                } else {
                    0.0
                }
            })
            .fold(1.0_f64, f64::min);
        Ok(Some(min))
    }

    /// Record consumed seconds against every effective window in one
    /// atomic statement. Entries crossing their cap flip to exhausted in
    /// the same update. A key without entries is uncapped: nothing to do.
    ///
    /// `commit_key` must be unique per stage attempt; a crash-resumed
    /// stage replays the same key and the store drops the duplicate.
    #[allow(clippy::too_many_arguments)]
    pub async fn commit(
        &self,
        user_id: Option<UserId>,
        provider: &str,
        variant: AsrVariant,
        seconds: f64,
        commit_key: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if seconds <= 0.0 {
            return Ok(());
        }
        let entries = self.query(user_id, provider, variant, now).await?;
        let ids: Vec<uuid::Uuid> = entries
            .iter()
            .filter(|entry| entry.in_window(now))
            .map(|entry| entry.id)
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        self.store.commit_usage(&ids, seconds, commit_key).await?;
        tracing::debug!(
            provider,
            variant = %variant,
            seconds,
            commit_key,
            windows = ids.len(),
            "Quota usage committed"
        );
        Ok(())
    }

    /// Create or update a quota entry. `reset` clears usage and restores
    /// the active status.
    #[allow(clippy::too_many_arguments)]
    pub async fn refresh(
        &self,
        owner: QuotaOwner,
        provider: &str,
        variant: AsrVariant,
        window_type: WindowType,
        amount: QuotaAmount,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
        reset: bool,
    ) -> Result<QuotaEntry, RepositoryError> {
        self.store
            .upsert(
                owner,
                provider,
                variant,
                window_type,
                amount.as_seconds(),
                window,
                reset,
            )
            .await
    }

    /// Every entry visible to a user (their own plus global defaults),
    /// layered, for the quota query API.
    pub async fn list_effective(
        &self,
        user_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<QuotaEntry>, RepositoryError> {
        let rows = self.store.list_visible(user_id).await?;
        let rows = self.rollover_expired(rows, now).await?;
        Ok(effective_entries(rows, user_id))
    }

    async fn rollover_expired(
        &self,
        rows: Vec<QuotaEntry>,
        now: DateTime<Utc>,
    ) -> Result<Vec<QuotaEntry>, RepositoryError> {
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            match row.rolled_over(now) {
                Some(rolled) => {
                    self.store.apply_rollover(&rolled).await?;
                    tracing::debug!(
                        provider = %rolled.provider,
                        window = %rolled.window_type,
                        "Quota window rolled over"
                    );
                    result.push(rolled);
                }
                None => result.push(row),
            }
        }
        Ok(result)
    }
}

/// Most specific wins: if the user has any row for a (provider, variant,
/// window_type), it shadows the global row for that same key.
fn effective_entries(rows: Vec<QuotaEntry>, user_id: Option<UserId>) -> Vec<QuotaEntry> {
    let user_id = match user_id {
        Some(id) => id,
        None => {
            return rows
                .into_iter()
                .filter(|row| row.owner == QuotaOwner::Global)
                .collect();
        }
    };

    let mut effective: Vec<QuotaEntry> = Vec::with_capacity(rows.len());
    for row in &rows {
        if row.owner == QuotaOwner::User(user_id) {
            effective.push(row.clone());
        }
    }
    for row in rows {
        if row.owner == QuotaOwner::Global
            && !effective.iter().any(|user_row| {
                user_row.provider == row.provider
                    && user_row.variant == row.variant
                    && user_row.window_type == row.window_type
            })
        {
            effective.push(row);
        }
    }
    effective
}
