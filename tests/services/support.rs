#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use echoscribe::application::ports::{
    AsrEngine, DownloadedMedia, LlmClient, MediaDownloader, MediaError, MediaResolver,
    NotificationRepository, ObjectStorage, QuotaStore, RepositoryError, ResolvedMedia,
    StageRepository, SummaryRepository, TaskPage, TaskRepository, TranscodeError,
    TranscodedAudio, Transcoder, TranscriptPage, TranscriptRepository, UsageLog, UsageLogError,
};
use echoscribe::application::services::{
    CancellationRegistry, CircuitBreakerConfig, CircuitRegistry, CostTracker, HealthMonitor,
    PipelineConfig, PipelineWorker, ProgressBroadcaster, ProviderMetadata,
    QuotaService, RetryPolicy, SelectionStrategy, ServiceRegistry, SmartSelector, StageMachine,
    SummaryGenerator,
};
use echoscribe::domain::{
    AsrVariant, Notification, QuotaEntry, QuotaOwner, QuotaStatus, ServiceKind, StageStatus,
    StageType, Summary, SummaryType, Task, TaskId, TaskStage, TaskStatus, TranscriptSegment,
    UsageRecord, UserId, WindowType,
};
use echoscribe::infrastructure::persistence::InMemoryTaskQueue;
use echoscribe::infrastructure::storage::MockObjectStore;

pub struct InMemoryTaskRepository {
    tasks: Mutex<HashMap<TaskId, Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, task: &Task) -> Result<(), RepositoryError> {
        self.tasks.lock().unwrap().insert(task.id, task.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .get(&id)
            .filter(|task| task.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_content_hash(
        &self,
        user_id: UserId,
        content_hash: &str,
    ) -> Result<Option<Task>, RepositoryError> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .values()
            .find(|task| {
                task.user_id == user_id
                    && task.content_hash.as_deref() == Some(content_hash)
                    && task.deleted_at.is_none()
            })
            .cloned())
    }

    async fn list(
        &self,
        user_id: UserId,
        status: Option<TaskStatus>,
        _page: i64,
        _page_size: i64,
    ) -> Result<TaskPage, RepositoryError> {
        let tasks: Vec<Task> = self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|task| task.user_id == user_id && task.deleted_at.is_none())
            .filter(|task| status.map(|s| task.status == s).unwrap_or(true))
            .cloned()
            .collect();
        let total = tasks.len() as i64;
        Ok(TaskPage { tasks, total })
    }

    async fn update_progress(
        &self,
        id: TaskId,
        status: TaskStatus,
        progress: i16,
    ) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.get_mut(&id) {
            if !task.status.is_terminal() {
                task.status = status;
                task.progress = task.progress.max(progress);
                task.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, id: TaskId, error_message: &str) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.get_mut(&id) {
            task.status = TaskStatus::Failed;
            task.error_message = Some(error_message.to_string());
            task.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_duration(
        &self,
        id: TaskId,
        duration_seconds: f64,
    ) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.get_mut(&id) {
            task.duration_seconds = Some(duration_seconds);
        }
        Ok(())
    }

    async fn set_providers(
        &self,
        id: TaskId,
        asr_provider: Option<&str>,
        llm_provider: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.get_mut(&id) {
            if let Some(provider) = asr_provider {
                task.asr_provider = Some(provider.to_string());
            }
            if let Some(provider) = llm_provider {
                task.llm_provider = Some(provider.to_string());
            }
        }
        Ok(())
    }

    async fn set_source_key(&self, id: TaskId, source_key: &str) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.get_mut(&id) {
            task.source_key = Some(source_key.to_string());
        }
        Ok(())
    }

    async fn soft_delete(&self, id: TaskId) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.get_mut(&id) {
            task.deleted_at = Some(Utc::now());
        }
        Ok(())
    }
}

pub struct InMemoryStageRepository {
    stages: Mutex<Vec<TaskStage>>,
}

impl InMemoryStageRepository {
    pub fn new() -> Self {
        Self {
            stages: Mutex::new(Vec::new()),
        }
    }

    pub fn all(&self) -> Vec<TaskStage> {
        self.stages.lock().unwrap().clone()
    }
}

#[async_trait]
impl StageRepository for InMemoryStageRepository {
    async fn insert(&self, stage: &TaskStage) -> Result<(), RepositoryError> {
        self.stages.lock().unwrap().push(stage.clone());
        Ok(())
    }

    async fn active_stage(
        &self,
        task_id: TaskId,
        stage_type: StageType,
    ) -> Result<Option<TaskStage>, RepositoryError> {
        Ok(self
            .stages
            .lock()
            .unwrap()
            .iter()
            .find(|stage| {
                stage.task_id == task_id && stage.stage_type == stage_type && stage.is_active
            })
            .cloned())
    }

    async fn list_active(&self, task_id: TaskId) -> Result<Vec<TaskStage>, RepositoryError> {
        Ok(self
            .stages
            .lock()
            .unwrap()
            .iter()
            .filter(|stage| stage.task_id == task_id && stage.is_active)
            .cloned()
            .collect())
    }

    async fn set_status(
        &self,
        id: echoscribe::domain::StageId,
        status: StageStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut stages = self.stages.lock().unwrap();
        if let Some(stage) = stages.iter_mut().find(|stage| stage.id == id) {
            stage.status = status;
            stage.error_message = error_message.map(str::to_string);
            if matches!(
                status,
                StageStatus::Completed | StageStatus::Failed | StageStatus::Skipped
            ) {
                stage.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn archive(
        &self,
        task_id: TaskId,
        stage_type: StageType,
    ) -> Result<(), RepositoryError> {
        let mut stages = self.stages.lock().unwrap();
        for stage in stages.iter_mut() {
            if stage.task_id == task_id && stage.stage_type == stage_type {
                stage.is_active = false;
            }
        }
        Ok(())
    }
}

pub struct InMemoryTranscriptRepository {
    segments: Mutex<Vec<TranscriptSegment>>,
}

impl InMemoryTranscriptRepository {
    pub fn new() -> Self {
        Self {
            segments: Mutex::new(Vec::new()),
        }
    }

    pub fn with_segments(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            segments: Mutex::new(segments),
        }
    }

    pub fn count(&self) -> usize {
        self.segments.lock().unwrap().len()
    }
}

#[async_trait]
impl TranscriptRepository for InMemoryTranscriptRepository {
    async fn replace_for_task(
        &self,
        task_id: TaskId,
        segments: &[TranscriptSegment],
    ) -> Result<(), RepositoryError> {
        let mut stored = self.segments.lock().unwrap();
        stored.retain(|segment| segment.task_id != task_id);
        stored.extend_from_slice(segments);
        Ok(())
    }

    async fn list(
        &self,
        task_id: TaskId,
        _page: i64,
        _page_size: i64,
    ) -> Result<TranscriptPage, RepositoryError> {
        let segments = self.list_all(task_id).await?;
        let total = segments.len() as i64;
        Ok(TranscriptPage { segments, total })
    }

    async fn list_all(&self, task_id: TaskId) -> Result<Vec<TranscriptSegment>, RepositoryError> {
        Ok(self
            .segments
            .lock()
            .unwrap()
            .iter()
            .filter(|segment| segment.task_id == task_id)
            .cloned()
            .collect())
    }
}

pub struct InMemorySummaryRepository {
    summaries: Mutex<Vec<Summary>>,
}

impl InMemorySummaryRepository {
    pub fn new() -> Self {
        Self {
            summaries: Mutex::new(Vec::new()),
        }
    }

    pub fn all(&self) -> Vec<Summary> {
        self.summaries.lock().unwrap().clone()
    }

    pub fn active_for(&self, task_id: TaskId) -> Vec<Summary> {
        self.summaries
            .lock()
            .unwrap()
            .iter()
            .filter(|summary| summary.task_id == task_id && summary.is_active)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SummaryRepository for InMemorySummaryRepository {
    async fn insert_active(&self, summary: &Summary) -> Result<Summary, RepositoryError> {
        let mut summaries = self.summaries.lock().unwrap();
        let mut version = summary.version;
        for existing in summaries.iter_mut() {
            if existing.task_id == summary.task_id
                && existing.summary_type == summary.summary_type
                && existing.is_active
            {
                existing.is_active = false;
                version = existing.version + 1;
            }
        }
        let mut stored = summary.clone();
        stored.version = version;
        stored.is_active = true;
        summaries.push(stored.clone());
        Ok(stored)
    }

    async fn list_active(&self, task_id: TaskId) -> Result<Vec<Summary>, RepositoryError> {
        Ok(self.active_for(task_id))
    }

    async fn get_active(
        &self,
        task_id: TaskId,
        summary_type: SummaryType,
    ) -> Result<Option<Summary>, RepositoryError> {
        Ok(self
            .active_for(task_id)
            .into_iter()
            .find(|summary| summary.summary_type == summary_type))
    }

    async fn set_image_key(
        &self,
        summary_id: Uuid,
        image_key: &str,
    ) -> Result<(), RepositoryError> {
        let mut summaries = self.summaries.lock().unwrap();
        if let Some(summary) = summaries.iter_mut().find(|summary| summary.id == summary_id) {
            summary.image_key = Some(image_key.to_string());
        }
        Ok(())
    }
}

pub struct InMemoryQuotaStore {
    entries: Mutex<Vec<QuotaEntry>>,
    applied_keys: Mutex<HashSet<String>>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            applied_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Pretend an earlier attempt already committed under this key, as a
    /// crashed worker would have.
    pub fn seed_commit_key(&self, commit_key: &str) {
        self.applied_keys
            .lock()
            .unwrap()
            .insert(commit_key.to_string());
    }

    /// Apply usage without going through the ledger, for seeding the
    /// state a pre-crash commit left behind.
    pub fn commit_direct(&self, provider: &str, variant: AsrVariant, seconds: f64) {
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.iter_mut() {
            if entry.provider == provider && entry.variant == variant {
                entry.used_seconds += seconds;
                if entry.used_seconds >= entry.quota_seconds {
                    entry.status = QuotaStatus::Exhausted;
                }
            }
        }
    }

    pub fn seed(&self, entry: QuotaEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn all(&self) -> Vec<QuotaEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn used_for(&self, provider: &str) -> f64 {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.provider == provider)
            .map(|entry| entry.used_seconds)
            .sum()
    }
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn list_for_key(
        &self,
        user_id: Option<UserId>,
        provider: &str,
        variant: AsrVariant,
    ) -> Result<Vec<QuotaEntry>, RepositoryError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.provider == provider && entry.variant == variant)
            .filter(|entry| match entry.owner {
                QuotaOwner::Global => true,
                QuotaOwner::User(owner) => Some(owner) == user_id,
            })
            .cloned()
            .collect())
    }

    async fn list_visible(
        &self,
        user_id: Option<UserId>,
    ) -> Result<Vec<QuotaEntry>, RepositoryError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| match entry.owner {
                QuotaOwner::Global => true,
                QuotaOwner::User(owner) => Some(owner) == user_id,
            })
            .cloned()
            .collect())
    }

    async fn commit_usage(
        &self,
        entry_ids: &[Uuid],
        seconds: f64,
        commit_key: &str,
    ) -> Result<(), RepositoryError> {
        {
            let mut applied = self.applied_keys.lock().unwrap();
            if !applied.insert(commit_key.to_string()) {
                return Ok(());
            }
        }
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.iter_mut() {
            if entry_ids.contains(&entry.id) {
                entry.used_seconds += seconds;
                if entry.used_seconds >= entry.quota_seconds {
                    entry.status = QuotaStatus::Exhausted;
                }
            }
        }
        Ok(())
    }

    async fn apply_rollover(&self, rolled: &QuotaEntry) -> Result<(), RepositoryError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|entry| entry.id == rolled.id) {
            entry.window_start = rolled.window_start;
            entry.window_end = rolled.window_end;
            entry.used_seconds = 0.0;
            entry.status = QuotaStatus::Active;
        }
        Ok(())
    }

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
        let mut entries = self.entries.lock().unwrap();
        let existing = entries.iter_mut().find(|entry| {
            entry.owner == owner
                && entry.provider == provider
                && entry.variant == variant
                && entry.window_type == window_type
        });
        match existing {
            Some(entry) => {
                entry.quota_seconds = quota_seconds;
                if let Some((start, end)) = window {
                    entry.window_start = start;
                    entry.window_end = end;
                }
                if reset {
                    entry.used_seconds = 0.0;
                    entry.status = QuotaStatus::Active;
                }
                Ok(entry.clone())
            }
            None => {
                let mut entry = QuotaEntry::new(
                    owner,
                    provider,
                    variant,
                    window_type,
                    quota_seconds,
                    Utc::now(),
                );
                if let Some((start, end)) = window {
                    entry.window_start = start;
                    entry.window_end = end;
                }
                entries.push(entry.clone());
                Ok(entry)
            }
        }
    }
}

pub struct InMemoryUsageLog {
    records: Mutex<Vec<UsageRecord>>,
}

impl InMemoryUsageLog {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl UsageLog for InMemoryUsageLog {
    async fn append(&self, record: &UsageRecord) -> Result<(), UsageLogError> {
        let mut records = self.records.lock().unwrap();
        let duplicate = records
            .iter()
            .any(|r| r.request_id == record.request_id && r.attempt == record.attempt);
        if !duplicate {
            records.push(record.clone());
        }
        Ok(())
    }

    async fn total_cost(
        &self,
        service_kind: ServiceKind,
        provider: &str,
        since: DateTime<Utc>,
    ) -> Result<f64, UsageLogError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.service_kind == service_kind && r.provider == provider && r.recorded_at >= since
            })
            .map(|r| r.estimated_cost)
            .sum())
    }

    async fn total_duration_seconds(
        &self,
        service_kind: ServiceKind,
        provider: &str,
        since: DateTime<Utc>,
    ) -> Result<f64, UsageLogError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.service_kind == service_kind && r.provider == provider && r.recorded_at >= since
            })
            .filter_map(|r| r.duration_seconds)
            .sum())
    }
}

pub struct CountingNotificationRepository {
    notifications: Mutex<Vec<Notification>>,
}

impl CountingNotificationRepository {
    pub fn new() -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
        }
    }

    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationRepository for CountingNotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<(), RepositoryError> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct StubResolver;

#[async_trait]
impl MediaResolver for StubResolver {
    async fn resolve(&self, source_url: &str) -> Result<ResolvedMedia, MediaError> {
        Ok(ResolvedMedia {
            download_url: format!("{}/media.mp3", source_url.trim_end_matches('/')),
            title: Some("stub media".to_string()),
            content_type: Some("audio/mpeg".to_string()),
        })
    }
}

pub struct StubDownloader;

#[async_trait]
impl MediaDownloader for StubDownloader {
    async fn download(
        &self,
        _url: &str,
        dest: &Path,
        _max_bytes: u64,
    ) -> Result<DownloadedMedia, MediaError> {
        tokio::fs::write(dest, b"stub audio bytes").await?;
        Ok(DownloadedMedia {
            path: dest.to_path_buf(),
            size_bytes: 16,
            content_type: Some("audio/mpeg".to_string()),
        })
    }
}

pub struct StubTranscoder {
    pub duration_seconds: f64,
}

#[async_trait]
impl Transcoder for StubTranscoder {
    async fn normalize(
        &self,
        _input: &Path,
        work_dir: &Path,
    ) -> Result<TranscodedAudio, TranscodeError> {
        let path: PathBuf = work_dir.join("canonical.wav");
        tokio::fs::write(&path, b"normalized audio").await?;
        Ok(TranscodedAudio {
            path,
            duration_seconds: self.duration_seconds,
        })
    }

    async fn probe_duration(&self, _input: &Path) -> Result<f64, TranscodeError> {
        Ok(self.duration_seconds)
    }
}

/// Registry + resilience wiring shared by selector, generator and
/// pipeline tests.
pub struct SelectorBuilder {
    asr: ServiceRegistry<dyn AsrEngine>,
    llm: ServiceRegistry<dyn LlmClient>,
    storage: ServiceRegistry<dyn ObjectStorage>,
    quota_store: Arc<InMemoryQuotaStore>,
    usage: Arc<InMemoryUsageLog>,
    circuit_config: CircuitBreakerConfig,
    strategy: SelectionStrategy,
}

impl SelectorBuilder {
    pub fn new() -> Self {
        Self {
            asr: ServiceRegistry::new(ServiceKind::Asr),
            llm: ServiceRegistry::new(ServiceKind::Llm),
            storage: ServiceRegistry::new(ServiceKind::Storage),
            quota_store: Arc::new(InMemoryQuotaStore::new()),
            usage: Arc::new(InMemoryUsageLog::new()),
            circuit_config: CircuitBreakerConfig::default(),
            strategy: SelectionStrategy::Balanced,
        }
    }

    pub fn quota_store(&self) -> Arc<InMemoryQuotaStore> {
        Arc::clone(&self.quota_store)
    }

    pub fn usage_log(&self) -> Arc<InMemoryUsageLog> {
        Arc::clone(&self.usage)
    }

    pub fn with_circuit_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_config = config;
        self
    }

    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_asr(
        mut self,
        name: &str,
        metadata: ProviderMetadata,
        engine: Arc<dyn AsrEngine>,
    ) -> Self {
        self.asr
            .register(name, metadata, true, Box::new(move |_| Ok(engine.clone())))
            .expect("duplicate asr provider in test setup");
        self
    }

    pub fn with_llm(
        mut self,
        name: &str,
        metadata: ProviderMetadata,
        client: Arc<dyn LlmClient>,
    ) -> Self {
        self.llm
            .register(name, metadata, true, Box::new(move |_| Ok(client.clone())))
            .expect("duplicate llm provider in test setup");
        self
    }

    pub fn with_storage(mut self, name: &str, store: Arc<dyn ObjectStorage>) -> Self {
        self.storage
            .register(
                name,
                ProviderMetadata::new(name),
                true,
                Box::new(move |_| Ok(store.clone())),
            )
            .expect("duplicate storage provider in test setup");
        self
    }

    pub fn build(self) -> SelectorFixture {
        let health = Arc::new(HealthMonitor::new());
        let circuits = Arc::new(CircuitRegistry::new(
            self.circuit_config,
            Arc::clone(&health),
        ));
        let quota = Arc::new(QuotaService::new(
            Arc::clone(&self.quota_store) as Arc<dyn QuotaStore>
        ));
        let usage = Arc::clone(&self.usage);
        let selector = Arc::new(SmartSelector::new(
            Arc::new(self.asr),
            Arc::new(self.llm),
            Arc::new(self.storage),
            Arc::clone(&health),
            Arc::clone(&circuits),
            Arc::clone(&quota),
            usage.clone() as Arc<dyn UsageLog>,
            self.strategy,
        ));
        SelectorFixture {
            selector,
            health,
            circuits,
            quota,
            quota_store: self.quota_store,
            usage,
        }
    }
}

pub struct SelectorFixture {
    pub selector: Arc<SmartSelector>,
    pub health: Arc<HealthMonitor>,
    pub circuits: Arc<CircuitRegistry>,
    pub quota: Arc<QuotaService>,
    pub quota_store: Arc<InMemoryQuotaStore>,
    pub usage: Arc<InMemoryUsageLog>,
}

pub fn asr_metadata() -> ProviderMetadata {
    ProviderMetadata::new("test asr")
        .cost_per_unit(0.0001)
        .variants(&[AsrVariant::File, AsrVariant::FileFast])
        .diarization()
}

pub fn segment(task_id: TaskId, sequence: i32, content: &str, confidence: f64) -> TranscriptSegment {
    TranscriptSegment::new(
        task_id,
        sequence,
        Some("spk_0".to_string()),
        sequence as f64,
        sequence as f64 + 1.0,
        content.to_string(),
        Some(confidence),
        None,
    )
}

/// Full worker fixture over in-memory ports.
pub struct PipelineHarness {
    pub tasks: Arc<InMemoryTaskRepository>,
    pub stages: Arc<InMemoryStageRepository>,
    pub transcripts: Arc<InMemoryTranscriptRepository>,
    pub summaries: Arc<InMemorySummaryRepository>,
    pub notifications: Arc<CountingNotificationRepository>,
    pub fixture: SelectorFixture,
    pub progress: Arc<ProgressBroadcaster>,
    pub queue: Arc<InMemoryTaskQueue>,
    pub cancellations: Arc<CancellationRegistry>,
    pub storage: Arc<MockObjectStore>,
    pub worker: Arc<PipelineWorker>,
}

impl PipelineHarness {
    pub fn new(builder: SelectorBuilder, transcoder_duration: f64) -> Self {
        let storage = Arc::new(MockObjectStore::new());
        let builder = builder.with_storage("mock", storage.clone() as Arc<dyn ObjectStorage>);
        let fixture = builder.build();

        let tasks = Arc::new(InMemoryTaskRepository::new());
        let stages = Arc::new(InMemoryStageRepository::new());
        let transcripts = Arc::new(InMemoryTranscriptRepository::new());
        let summaries = Arc::new(InMemorySummaryRepository::new());
        let notifications = Arc::new(CountingNotificationRepository::new());
        let progress = Arc::new(ProgressBroadcaster::new());
        let queue = Arc::new(InMemoryTaskQueue::new(64));
        let cancellations = Arc::new(CancellationRegistry::new());

        let cost = Arc::new(CostTracker::new(
            fixture.usage.clone() as Arc<dyn UsageLog>,
            None,
        ));
        let generator = Arc::new(SummaryGenerator::new(
            Arc::clone(&fixture.selector),
            summaries.clone() as Arc<dyn SummaryRepository>,
            Arc::clone(&cost),
            None,
            None,
        ));

        let config = PipelineConfig {
            retry: RetryPolicy {
                base_delay: Duration::from_millis(5),
                factor: 2.0,
                max_attempts: 3,
                max_delay: Duration::from_millis(50),
                jitter_ratio: 0.0,
            },
            ..PipelineConfig::default()
        };

        let worker = Arc::new(PipelineWorker::new(
            tasks.clone() as Arc<dyn TaskRepository>,
            StageMachine::new(stages.clone() as Arc<dyn StageRepository>),
            transcripts.clone() as Arc<dyn TranscriptRepository>,
            notifications.clone() as Arc<dyn NotificationRepository>,
            Arc::clone(&fixture.quota),
            cost,
            Arc::clone(&fixture.selector),
            generator,
            Arc::clone(&progress),
            queue.clone() as Arc<dyn echoscribe::application::ports::TaskQueue>,
            Arc::new(StubResolver),
            Arc::new(StubDownloader),
            Arc::new(StubTranscoder {
                duration_seconds: transcoder_duration,
            }),
            Arc::clone(&cancellations),
            config,
        ));

        Self {
            tasks,
            stages,
            transcripts,
            summaries,
            notifications,
            fixture,
            progress,
            queue,
            cancellations,
            storage,
            worker,
        }
    }

    pub fn spawn_worker(&self) {
        tokio::spawn(Arc::clone(&self.worker).run());
    }

    pub async fn enqueue(&self, task_id: TaskId) {
        use echoscribe::application::ports::{QueueJob, TaskMessage, TaskQueue};
        self.queue
            .push(&TaskMessage {
                task_id,
                request_id: None,
                job: QueueJob::ProcessTask,
            })
            .await
            .expect("enqueue failed");
    }

    pub async fn wait_for_terminal(&self, task_id: TaskId) -> Task {
        for _ in 0..500 {
            if let Some(task) = self.tasks.get(task_id) {
                if task.status.is_terminal() {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} did not reach a terminal state in time", task_id);
    }
}
