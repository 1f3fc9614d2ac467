use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use uuid::Uuid;

use super::task::UserId;

/// Quota lane of an ASR provider, tracked separately per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsrVariant {
    File,
    FileFast,
    StreamAsync,
    StreamRealtime,
}

impl AsrVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            AsrVariant::File => "file",
            AsrVariant::FileFast => "file_fast",
            AsrVariant::StreamAsync => "stream_async",
            AsrVariant::StreamRealtime => "stream_realtime",
        }
    }

    /// Preference order used when the caller does not name a variant.
    pub const DEFAULT_PREFERENCE: [AsrVariant; 2] = [AsrVariant::FileFast, AsrVariant::File];
}

impl FromStr for AsrVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(AsrVariant::File),
            "file_fast" => Ok(AsrVariant::FileFast),
            "stream_async" => Ok(AsrVariant::StreamAsync),
            "stream_realtime" => Ok(AsrVariant::StreamRealtime),
            _ => Err(format!("Invalid ASR variant: {}", s)),
        }
    }
}

impl fmt::Display for AsrVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A quota key's owner. Per-user entries override the global defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaOwner {
    Global,
    User(UserId),
}

impl QuotaOwner {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            QuotaOwner::Global => None,
            QuotaOwner::User(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowType {
    Day,
    Month,
    Total,
}

impl WindowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowType::Day => "day",
            WindowType::Month => "month",
            WindowType::Total => "total",
        }
    }
}

impl FromStr for WindowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(WindowType::Day),
            "month" => Ok(WindowType::Month),
            "total" => Ok(WindowType::Total),
            _ => Err(format!("Invalid window type: {}", s)),
        }
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Half-open UTC interval `[start, end)` for a window anchored at `now`.
pub fn window_bounds(window_type: WindowType, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    match window_type {
        WindowType::Day => {
            let start = Utc
                .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
                .single()
                .unwrap_or(now);
            (start, start + chrono::Duration::days(1))
        }
        WindowType::Month => {
            let start = Utc
                .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
                .single()
                .unwrap_or(now);
            let end = if now.month() == 12 {
                Utc.with_ymd_and_hms(now.year() + 1, 1, 1, 0, 0, 0)
            } else {
                Utc.with_ymd_and_hms(now.year(), now.month() + 1, 1, 0, 0, 0)
            };
            (start, end.single().unwrap_or(start))
        }
        WindowType::Total => {
            let start = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).single().unwrap_or(now);
            let end = Utc
                .with_ymd_and_hms(2100, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(now);
            (start, end)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaStatus {
    Active,
    Exhausted,
}

impl QuotaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaStatus::Active => "active",
            QuotaStatus::Exhausted => "exhausted",
        }
    }
}

impl FromStr for QuotaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(QuotaStatus::Active),
            "exhausted" => Ok(QuotaStatus::Exhausted),
            _ => Err(format!("Invalid quota status: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuotaEntry {
    pub id: Uuid,
    pub owner: QuotaOwner,
    pub provider: String,
    pub variant: AsrVariant,
    pub window_type: WindowType,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub quota_seconds: f64,
    pub used_seconds: f64,
    pub status: QuotaStatus,
}

impl QuotaEntry {
    pub fn new(
        owner: QuotaOwner,
        provider: &str,
        variant: AsrVariant,
        window_type: WindowType,
        quota_seconds: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let (window_start, window_end) = window_bounds(window_type, now);
        Self {
            id: Uuid::new_v4(),
            owner,
            provider: provider.to_string(),
            variant,
            window_type,
            window_start,
            window_end,
            quota_seconds,
            used_seconds: 0.0,
            status: QuotaStatus::Active,
        }
    }

    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.window_start && now < self.window_end
    }

    /// Available iff active, in-window and below cap.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.in_window(now)
            && self.status == QuotaStatus::Active
            && self.quota_seconds > 0.0
            && self.used_seconds < self.quota_seconds
    }

    pub fn remaining_fraction(&self) -> f64 {
        if self.quota_seconds <= 0.0 {
            return 0.0;
        }
        ((self.quota_seconds - self.used_seconds) / self.quota_seconds).clamp(0.0, 1.0)
    }

    /// Advance an expired day/month window to the one containing `now`,
    /// clearing usage. `total` windows never roll over.
    pub fn rolled_over(&self, now: DateTime<Utc>) -> Option<QuotaEntry> {
        if self.window_type == WindowType::Total || now < self.window_end {
            return None;
        }
        let (window_start, window_end) = window_bounds(self.window_type, now);
        Some(QuotaEntry {
            window_start,
            window_end,
            used_seconds: 0.0,
            status: QuotaStatus::Active,
            ..self.clone()
        })
    }
}
