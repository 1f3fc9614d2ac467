use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::application::ports::{
    AsrError, AsrRequest, AsrSegment, MediaDownloader, MediaError, MediaResolver,
    NotificationRepository, QueueJob, StorageError, TaskMessage, TaskQueue, TranscodeError,
    Transcoder, TranscriptRepository, TaskRepository,
};
use crate::domain::{
    band_progress, stage_flow, AsrVariant, Notification, ObjectKey, ServiceKind, SourceType,
    StageType, SummaryType, Task, TaskId, TaskStatus, TranscriptSegment, UsageRecord,
};

use super::cost::CostTracker;
use super::progress::{ProgressBroadcaster, ProgressEvent};
use super::quota::QuotaService;
use super::retry::RetryPolicy;
use super::selector::{PreferredReason, SelectorError, SmartSelector};
use super::stage_machine::StageMachine;
use super::summary_generator::{SummaryError, SummaryGenerator};

const CANCELLED_MESSAGE: &str = "cancelled";

#[derive(Debug, Clone)]
pub struct StageDeadlines {
    pub resolve: Duration,
    pub download: Duration,
    pub transcode: Duration,
    pub upload: Duration,
    pub transcribe: Duration,
    pub summarize: Duration,
}

impl Default for StageDeadlines {
    fn default() -> Self {
        Self {
            resolve: Duration::from_secs(30),
            download: Duration::from_secs(600),
            transcode: Duration::from_secs(600),
            upload: Duration::from_secs(300),
            transcribe: Duration::from_secs(1800),
            summarize: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_download_bytes: u64,
    pub deadlines: StageDeadlines,
    pub retry: RetryPolicy,
    /// TTL of the presigned audio URL handed to ASR vendors.
    pub media_url_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_download_bytes: 500 * 1024 * 1024,
            deadlines: StageDeadlines::default(),
            retry: RetryPolicy::default(),
            media_url_ttl: Duration::from_secs(1800),
        }
    }
}

/// Task-scoped cancellation flags shared between the API tier (which sets
/// them) and workers (which check at stage and retry boundaries).
pub struct CancellationRegistry {
    flags: Mutex<HashMap<TaskId, Arc<AtomicBool>>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self {
            flags: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, task_id: TaskId) -> Arc<AtomicBool> {
        let mut flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(flags.entry(task_id).or_default())
    }

    pub fn cancel(&self, task_id: TaskId) {
        let mut flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        flags.entry(task_id).or_default().store(true, Ordering::SeqCst);
    }

    pub fn remove(&self, task_id: TaskId) {
        let mut flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        flags.remove(&task_id);
    }
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// How a stage attempt ended, as seen by the retry loop.
#[derive(Debug)]
enum StageFailure {
    Transient(String),
    Terminal(String),
    Cancelled,
}

impl StageFailure {
    fn message(&self) -> &str {
        match self {
            StageFailure::Transient(msg) | StageFailure::Terminal(msg) => msg,
            StageFailure::Cancelled => CANCELLED_MESSAGE,
        }
    }
}

impl From<MediaError> for StageFailure {
    fn from(e: MediaError) -> Self {
        match &e {
            MediaError::TooLarge(_) | MediaError::NoMediaFound(_) => {
                StageFailure::Terminal(e.to_string())
            }
            _ => StageFailure::Transient(e.to_string()),
        }
    }
}

impl From<TranscodeError> for StageFailure {
    fn from(e: TranscodeError) -> Self {
        match &e {
            TranscodeError::Io(_) => StageFailure::Transient(e.to_string()),
            _ => StageFailure::Terminal(e.to_string()),
        }
    }
}

impl From<StorageError> for StageFailure {
    fn from(e: StorageError) -> Self {
        if e.is_transient() {
            StageFailure::Transient(e.to_string())
        } else {
            StageFailure::Terminal(e.to_string())
        }
    }
}

impl From<SelectorError> for StageFailure {
    fn from(e: SelectorError) -> Self {
        match &e {
            // An open circuit may close again; quota exhaustion will not
            // fix itself within the retry budget.
            SelectorError::PreferredUnavailable {
                reason: PreferredReason::CircuitOpen,
                ..
            } => StageFailure::Transient(e.to_string()),
            _ => StageFailure::Terminal(e.to_string()),
        }
    }
}

impl From<SummaryError> for StageFailure {
    fn from(e: SummaryError) -> Self {
        if e.is_transient() {
            StageFailure::Transient(e.to_string())
        } else {
            StageFailure::Terminal(e.to_string())
        }
    }
}

impl From<crate::application::ports::RepositoryError> for StageFailure {
    fn from(e: crate::application::ports::RepositoryError) -> Self {
        StageFailure::Terminal(e.to_string())
    }
}

/// Per-task scratch carried between stages of one run. Persisted outputs
/// (source key, duration, transcripts) live on the task row instead so a
/// resumed run can skip completed stages.
#[derive(Default)]
struct StageContext {
    download_url: Option<String>,
    local_media: Option<PathBuf>,
    canonical_audio: Option<PathBuf>,
}

pub struct PipelineWorker {
    tasks: Arc<dyn TaskRepository>,
    stages: StageMachine,
    transcripts: Arc<dyn TranscriptRepository>,
    notifications: Arc<dyn NotificationRepository>,
    quota: Arc<QuotaService>,
    cost: Arc<CostTracker>,
    selector: Arc<SmartSelector>,
    generator: Arc<SummaryGenerator>,
    progress: Arc<ProgressBroadcaster>,
    queue: Arc<dyn TaskQueue>,
    resolver: Arc<dyn MediaResolver>,
    downloader: Arc<dyn MediaDownloader>,
    transcoder: Arc<dyn Transcoder>,
    cancellations: Arc<CancellationRegistry>,
    config: PipelineConfig,
}

impl PipelineWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        stages: StageMachine,
        transcripts: Arc<dyn TranscriptRepository>,
        notifications: Arc<dyn NotificationRepository>,
        quota: Arc<QuotaService>,
        cost: Arc<CostTracker>,
        selector: Arc<SmartSelector>,
        generator: Arc<SummaryGenerator>,
        progress: Arc<ProgressBroadcaster>,
        queue: Arc<dyn TaskQueue>,
        resolver: Arc<dyn MediaResolver>,
        downloader: Arc<dyn MediaDownloader>,
        transcoder: Arc<dyn Transcoder>,
        cancellations: Arc<CancellationRegistry>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            tasks,
            stages,
            transcripts,
            notifications,
            quota,
            cost,
            selector,
            generator,
            progress,
            queue,
            resolver,
            downloader,
            transcoder,
            cancellations,
            config,
        }
    }

    /// Consume the queue until it closes. One task at a time per worker.
    pub async fn run(self: Arc<Self>) {
        tracing::info!("Pipeline worker started");
        loop {
            match self.queue.pop().await {
                Ok(Some(message)) => self.dispatch(message).await,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Queue pop failed, backing off");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
        tracing::info!("Pipeline worker stopped: queue closed");
    }

    async fn dispatch(&self, message: TaskMessage) {
        let span = tracing::info_span!(
            "pipeline_task",
            task_id = %message.task_id,
            request_id = message.request_id.as_deref().unwrap_or("-"),
        );
        let _guard = span.enter();

        match message.job.clone() {
            QueueJob::ProcessTask => self.process_task(message.task_id).await,
            QueueJob::GenerateVisual {
                visual_type,
                content_style,
                provider,
                model_id,
                generate_image,
                image_format,
            } => {
                self.process_visual(
                    message.task_id,
                    &visual_type,
                    &content_style,
                    provider.as_deref(),
                    model_id.as_deref(),
                    generate_image,
                    &image_format,
                )
                .await
            }
        }
    }

    async fn process_task(&self, task_id: TaskId) {
        let mut task = match self.tasks.get_by_id(task_id).await {
            Ok(Some(task)) if task.deleted_at.is_none() => task,
            Ok(_) => {
                tracing::warn!("Task missing or deleted, dropping message");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load task");
                return;
            }
        };
        if task.status == TaskStatus::Completed {
            tracing::info!("Task already completed, nothing to do");
            return;
        }

        let cancel_flag = self.cancellations.register(task.id);
        let work_dir = std::env::temp_dir().join(format!("echoscribe-{}", task.id));
        if let Err(e) = tokio::fs::create_dir_all(&work_dir).await {
            tracing::error!(error = %e, "Failed to create work dir");
            return;
        }

        let result = self.run_stages(&mut task, &cancel_flag, &work_dir).await;

        match result {
            Ok(()) => {
                if let Err(e) = self
                    .tasks
                    .update_progress(task.id, TaskStatus::Completed, 100)
                    .await
                {
                    tracing::error!(error = %e, "Failed to mark task completed");
                }
                let title = task.title.as_deref().unwrap_or("Untitled");
                let notification = Notification::task_completed(task.user_id, task.id, title);
                if let Err(e) = self.notifications.insert(&notification).await {
                    tracing::warn!(error = %e, "Failed to store completion notification");
                }
                self.progress.publish(ProgressEvent::completed(task.id));
                tracing::info!("Task completed");
            }
            Err(failure) => {
                let message = failure.message().to_string();
                if let Err(e) = self.tasks.mark_failed(task.id, &message).await {
                    tracing::error!(error = %e, "Failed to mark task failed");
                }
                let title = task.title.as_deref().unwrap_or("Untitled");
                let notification =
                    Notification::task_failed(task.user_id, task.id, title, &message);
                if let Err(e) = self.notifications.insert(&notification).await {
                    tracing::warn!(error = %e, "Failed to store failure notification");
                }
                self.progress
                    .publish(ProgressEvent::error(task.id, task.progress));
                tracing::error!(error = %message, "Task failed");
            }
        }

        self.cancellations.remove(task.id);
        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            tracing::debug!(error = %e, "Work dir cleanup failed");
        }
    }

    async fn run_stages(
        &self,
        task: &mut Task,
        cancel_flag: &AtomicBool,
        work_dir: &Path,
    ) -> Result<(), StageFailure> {
        let flow = stage_flow(task.source_type);
        let mut ctx = StageContext::default();

        for stage_type in flow {
            if cancel_flag.load(Ordering::SeqCst) {
                return Err(StageFailure::Cancelled);
            }

            if self.can_skip(task, &ctx, *stage_type).await? {
                tracing::info!(stage = %stage_type, "Stage already completed, skipping");
                continue;
            }

            let status = stage_type.task_status();
            self.publish_progress(task, status, Some(*stage_type), band_progress(status, 0.0))
                .await;

            let stage = self.stages.begin(task.id, *stage_type).await?;
            let deadline = self.deadline_for(*stage_type);
            let mut attempt: u32 = 1;

            loop {
                if cancel_flag.load(Ordering::SeqCst) {
                    self.stages.fail(&stage, CANCELLED_MESSAGE).await?;
                    return Err(StageFailure::Cancelled);
                }

                let outcome = match tokio::time::timeout(
                    deadline,
                    self.execute_stage(task, &mut ctx, *stage_type, work_dir, stage.attempt),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(StageFailure::Transient(format!(
                        "{} stage exceeded its {}s deadline",
                        stage_type,
                        deadline.as_secs()
                    ))),
                };

                match outcome {
                    Ok(()) => {
                        self.stages.complete(&stage).await?;
                        self.publish_progress(
                            task,
                            status,
                            Some(*stage_type),
                            band_progress(status, 1.0),
                        )
                        .await;
                        break;
                    }
                    Err(StageFailure::Transient(message))
                        if self.config.retry.has_attempts_left(attempt)
                            && !cancel_flag.load(Ordering::SeqCst) =>
                    {
                        let delay = self.config.retry.delay_for(attempt);
                        tracing::warn!(
                            stage = %stage_type,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %message,
                            "Stage attempt failed, retrying"
                        );
                        attempt += 1;
                        tokio::time::sleep(delay).await;
                    }
                    Err(failure) => {
                        self.stages.fail(&stage, failure.message()).await?;
                        return Err(failure);
                    }
                }
            }

            if cancel_flag.load(Ordering::SeqCst) {
                // In-flight results were recorded above but the task itself
                // will not advance past the cancellation.
                return Err(StageFailure::Cancelled);
            }
        }

        Ok(())
    }

    /// A completed-and-active record short-circuits the stage, provided the
    /// artifacts later stages need still exist. Persisted artifacts
    /// (source key, transcripts) survive a crash; scratch files do not, so
    /// the early media stages re-run when the scratch is gone.
    async fn can_skip(
        &self,
        task: &Task,
        ctx: &StageContext,
        stage_type: StageType,
    ) -> Result<bool, StageFailure> {
        if self.stages.should_execute(task.id, stage_type).await? {
            return Ok(false);
        }
        let artifacts_present = match stage_type {
            StageType::Resolve => ctx.download_url.is_some(),
            StageType::Download => ctx.local_media.is_some(),
            StageType::Transcode => ctx.canonical_audio.is_some(),
            StageType::UploadStorage => task.source_key.is_some(),
            StageType::Transcribe | StageType::Summarize => true,
        };
        Ok(artifacts_present)
    }

    async fn execute_stage(
        &self,
        task: &mut Task,
        ctx: &mut StageContext,
        stage_type: StageType,
        work_dir: &Path,
        stage_attempt: i32,
    ) -> Result<(), StageFailure> {
        match stage_type {
            StageType::Resolve => self.execute_resolve(task, ctx).await,
            StageType::Download => self.execute_download(task, ctx, work_dir).await,
            StageType::Transcode => self.execute_transcode(task, ctx, work_dir).await,
            StageType::UploadStorage => self.execute_upload(task, ctx, work_dir).await,
            StageType::Transcribe => self.execute_transcribe(task, stage_attempt).await,
            StageType::Summarize => self.execute_summarize(task).await,
        }
    }

    async fn execute_resolve(
        &self,
        task: &Task,
        ctx: &mut StageContext,
    ) -> Result<(), StageFailure> {
        let source_url = task
            .source_url
            .as_deref()
            .ok_or_else(|| StageFailure::Terminal("task has no source URL".to_string()))?;
        let resolved = self.resolver.resolve(source_url).await?;
        tracing::info!(url = %resolved.download_url, "Resolved direct media URL");
        ctx.download_url = Some(resolved.download_url);
        Ok(())
    }

    async fn execute_download(
        &self,
        task: &Task,
        ctx: &mut StageContext,
        work_dir: &Path,
    ) -> Result<(), StageFailure> {
        let url = ctx
            .download_url
            .clone()
            .or_else(|| task.source_url.clone())
            .ok_or_else(|| StageFailure::Terminal("no download URL".to_string()))?;
        let dest = work_dir.join("source.media");
        let downloaded = self
            .downloader
            .download(&url, &dest, self.config.max_download_bytes)
            .await?;
        tracing::info!(bytes = downloaded.size_bytes, "Media downloaded");
        ctx.local_media = Some(downloaded.path);
        Ok(())
    }

    async fn execute_transcode(
        &self,
        task: &mut Task,
        ctx: &mut StageContext,
        work_dir: &Path,
    ) -> Result<(), StageFailure> {
        let input = ctx
            .local_media
            .clone()
            .ok_or_else(|| StageFailure::Terminal("no downloaded media to transcode".to_string()))?;
        let output = self.transcoder.normalize(&input, work_dir).await?;
        if task.duration_seconds.is_none() && output.duration_seconds > 0.0 {
            self.tasks
                .set_duration(task.id, output.duration_seconds)
                .await?;
            task.duration_seconds = Some(output.duration_seconds);
        }
        ctx.canonical_audio = Some(output.path);
        Ok(())
    }

    async fn execute_upload(
        &self,
        task: &mut Task,
        ctx: &mut StageContext,
        work_dir: &Path,
    ) -> Result<(), StageFailure> {
        let selection = self.selector.select_storage(None).await?;

        match task.source_type {
            SourceType::Upload => {
                // The client already PUT the object through a presigned URL;
                // this stage verifies it and backfills the duration.
                let source_key = task
                    .source_key
                    .clone()
                    .ok_or_else(|| StageFailure::Terminal("task has no file key".to_string()))?;
                let key = ObjectKey::from_raw(source_key);
                let exists = self
                    .storage_call(&selection.provider, selection.store.exists(&key))
                    .await?;
                if !exists {
                    return Err(StageFailure::Terminal(format!(
                        "uploaded object {} not found in storage",
                        key
                    )));
                }
                if task.duration_seconds.is_none() {
                    let url = self
                        .storage_call(
                            &selection.provider,
                            selection.store.get_object_url(&key, self.config.media_url_ttl),
                        )
                        .await?;
                    let dest = work_dir.join("uploaded.media");
                    let downloaded = self
                        .downloader
                        .download(&url, &dest, self.config.max_download_bytes)
                        .await?;
                    match self.transcoder.probe_duration(&downloaded.path).await {
                        Ok(duration) if duration > 0.0 => {
                            self.tasks.set_duration(task.id, duration).await?;
                            task.duration_seconds = Some(duration);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "Duration probe failed");
                        }
                    }
                }
            }
            SourceType::Url => {
                let canonical = ctx
                    .canonical_audio
                    .clone()
                    .ok_or_else(|| StageFailure::Terminal("no canonical audio".to_string()))?;
                let bytes = tokio::fs::read(&canonical)
                    .await
                    .map_err(|e| StageFailure::Transient(e.to_string()))?;
                let hash = hex_digest(&bytes);
                let key = ObjectKey::upload(&hash, "wav", Utc::now());

                let exists = self
                    .storage_call(&selection.provider, selection.store.exists(&key))
                    .await?;
                if exists {
                    tracing::info!(key = %key, "Object already stored, skipping upload");
                } else {
                    self.storage_call(
                        &selection.provider,
                        selection
                            .store
                            .put_object(&key, bytes.into(), "audio/wav"),
                    )
                    .await?;
                }
                self.tasks.set_source_key(task.id, key.as_str()).await?;
                task.source_key = Some(key.as_str().to_string());
            }
        }
        Ok(())
    }

    async fn execute_transcribe(
        &self,
        task: &mut Task,
        stage_attempt: i32,
    ) -> Result<(), StageFailure> {
        let source_key = task
            .source_key
            .clone()
            .ok_or_else(|| StageFailure::Terminal("no stored audio to transcribe".to_string()))?;

        let variant = task
            .options
            .asr_variant
            .as_deref()
            .and_then(|v| v.parse::<AsrVariant>().ok());
        let diarization = task.options.enable_speaker_diarization;
        let selection = self
            .selector
            .select_asr(
                Some(task.user_id),
                task.options.asr_provider.as_deref(),
                variant,
                task.duration_seconds,
                diarization == Some(true),
                None,
            )
            .await?;

        if !self
            .selector
            .circuits()
            .allow_request(ServiceKind::Asr, &selection.provider)
        {
            return Err(StageFailure::Transient(format!(
                "provider {} is between probes",
                selection.provider
            )));
        }

        let storage = self.selector.select_storage(None).await?;
        let key = ObjectKey::from_raw(source_key);
        let audio_url = self
            .storage_call(
                &storage.provider,
                storage.store.get_object_url(&key, self.config.media_url_ttl),
            )
            .await?;

        let request = AsrRequest {
            language: task.options.language.clone(),
            variant: Some(selection.variant),
            enable_speaker_diarization: diarization == Some(true),
            duration_hint: task.duration_seconds,
        };

        tracing::info!(provider = %selection.provider, variant = %selection.variant, "Transcribing");
        let transcription = match selection.engine.transcribe(&audio_url, &request).await {
            Ok(transcription) => {
                self.selector
                    .circuits()
                    .on_success(ServiceKind::Asr, &selection.provider);
                self.selector
                    .health()
                    .record_success(ServiceKind::Asr, &selection.provider);
                transcription
            }
            Err(e) => {
                // Only vendor-side failures count against the breaker.
                if e.is_transient() {
                    self.selector
                        .circuits()
                        .on_failure(ServiceKind::Asr, &selection.provider);
                }
                self.selector
                    .health()
                    .record_failure(ServiceKind::Asr, &selection.provider);
                return Err(classify_asr_error(e));
            }
        };

        let segments = normalize_speakers(transcription.segments, diarization);
        let rows: Vec<TranscriptSegment> = segments
            .into_iter()
            .enumerate()
            .map(|(index, segment)| {
                TranscriptSegment::new(
                    task.id,
                    (index + 1) as i32,
                    segment.speaker_id,
                    segment.start_time,
                    segment.end_time,
                    segment.content,
                    segment.confidence,
                    segment.words,
                )
            })
            .collect();
        self.transcripts.replace_for_task(task.id, &rows).await?;

        let duration = effective_duration(task, transcription.duration_seconds, &rows);
        if task.duration_seconds.is_none() && duration > 0.0 {
            self.tasks.set_duration(task.id, duration).await?;
            task.duration_seconds = Some(duration);
        }

        // One key per stage attempt; quota ledger and usage log both
        // dedup on it, so a crash-resumed attempt charges nothing twice.
        let attempt_key = format!("{}:transcribe:{}", task.id, stage_attempt);

        self.quota
            .commit(
                Some(task.user_id),
                &selection.provider,
                selection.variant,
                duration,
                &attempt_key,
                Utc::now(),
            )
            .await?;

        let estimated_cost = self
            .selector
            .asr_metadata(&selection.provider)
            .map(|metadata| CostTracker::estimate_asr_cost(&metadata, duration))
            .unwrap_or(0.0);
        let record = UsageRecord::new(
            ServiceKind::Asr,
            &selection.provider,
            estimated_cost,
            &attempt_key,
            stage_attempt,
        )
        .with_task(task.user_id, task.id)
        .with_duration(duration);
        self.cost.record(&record).await;

        self.tasks
            .set_providers(task.id, Some(&selection.provider), None)
            .await?;
        task.asr_provider = Some(selection.provider);

        tracing::info!(segments = rows.len(), duration, "Transcription persisted");
        Ok(())
    }

    async fn execute_summarize(&self, task: &mut Task) -> Result<(), StageFailure> {
        let segments = self.transcripts.list_all(task.id).await?;
        let outcome = self.generator.generate_for_task(task, &segments).await?;
        self.tasks
            .set_providers(task.id, None, Some(&outcome.provider))
            .await?;
        task.llm_provider = Some(outcome.provider.clone());
        tracing::info!(
            provider = %outcome.provider,
            model = %outcome.model,
            quality = outcome.quality.score.as_str(),
            summaries = outcome.summaries.len(),
            "Summaries generated"
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_visual(
        &self,
        task_id: TaskId,
        visual_type: &str,
        content_style: &str,
        provider: Option<&str>,
        model_id: Option<&str>,
        generate_image: bool,
        image_format: &str,
    ) {
        let task = match self.tasks.get_by_id(task_id).await {
            Ok(Some(task)) if task.deleted_at.is_none() => task,
            Ok(_) => {
                tracing::warn!("Task missing or deleted, dropping visual job");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load task for visual job");
                return;
            }
        };

        let summary_type = match visual_summary_type(visual_type) {
            Some(summary_type) => summary_type,
            None => {
                tracing::warn!(visual_type, "Unknown visual type, dropping job");
                return;
            }
        };

        let segments = match self.transcripts.list_all(task.id).await {
            Ok(segments) => segments,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load transcript for visual job");
                return;
            }
        };

        match self
            .generator
            .generate_visual(
                &task,
                &segments,
                summary_type,
                content_style,
                provider,
                model_id,
                generate_image,
                image_format,
                false,
            )
            .await
        {
            Ok(summary) => {
                tracing::info!(
                    visual_type,
                    summary_id = %summary.id,
                    has_image = summary.image_key.is_some(),
                    "Visual summary generated"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, visual_type, "Visual summary generation failed");
            }
        }
    }

    /// Wrap a storage backend call with breaker and health bookkeeping.
    async fn storage_call<T>(
        &self,
        provider: &str,
        fut: impl std::future::Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StageFailure> {
        match fut.await {
            Ok(value) => {
                self.selector
                    .circuits()
                    .on_success(ServiceKind::Storage, provider);
                self.selector
                    .health()
                    .record_success(ServiceKind::Storage, provider);
                Ok(value)
            }
            Err(e) => {
                if e.is_transient() {
                    self.selector
                        .circuits()
                        .on_failure(ServiceKind::Storage, provider);
                }
                self.selector
                    .health()
                    .record_failure(ServiceKind::Storage, provider);
                Err(e.into())
            }
        }
    }

    async fn publish_progress(
        &self,
        task: &Task,
        status: TaskStatus,
        stage: Option<StageType>,
        progress: i16,
    ) {
        if let Err(e) = self.tasks.update_progress(task.id, status, progress).await {
            tracing::warn!(error = %e, "Failed to persist progress");
        }
        self.progress.publish(ProgressEvent::progress(
            task.id,
            status,
            stage.map(|s| s.as_str().to_string()),
            progress,
        ));
    }

    fn deadline_for(&self, stage_type: StageType) -> Duration {
        let deadlines = &self.config.deadlines;
        match stage_type {
            StageType::Resolve => deadlines.resolve,
            StageType::Download => deadlines.download,
            StageType::Transcode => deadlines.transcode,
            StageType::UploadStorage => deadlines.upload,
            StageType::Transcribe => deadlines.transcribe,
            StageType::Summarize => deadlines.summarize,
        }
    }
}

fn classify_asr_error(e: AsrError) -> StageFailure {
    if e.is_transient() {
        StageFailure::Transient(e.to_string())
    } else {
        StageFailure::Terminal(e.to_string())
    }
}

/// Speaker tags follow the task's diarization option: stripped when it is
/// disabled, backfilled with a single speaker when it was requested but
/// the vendor returned none.
fn normalize_speakers(
    segments: Vec<AsrSegment>,
    enable_speaker_diarization: Option<bool>,
) -> Vec<AsrSegment> {
    match enable_speaker_diarization {
        Some(false) => segments
            .into_iter()
            .map(|mut segment| {
                segment.speaker_id = None;
                segment
            })
            .collect(),
        Some(true) => {
            let has_speaker = segments.iter().any(|segment| segment.speaker_id.is_some());
            if has_speaker {
                segments
            } else {
                segments
                    .into_iter()
                    .map(|mut segment| {
                        segment.speaker_id = Some("spk_0".to_string());
                        segment
                    })
                    .collect()
            }
        }
        None => segments,
    }
}

fn effective_duration(task: &Task, reported: f64, rows: &[TranscriptSegment]) -> f64 {
    if let Some(duration) = task.duration_seconds {
        if duration > 0.0 {
            return duration;
        }
    }
    if reported > 0.0 {
        return reported;
    }
    rows.iter().map(|row| row.end_time).fold(0.0, f64::max)
}

fn visual_summary_type(visual_type: &str) -> Option<SummaryType> {
    match visual_type {
        "mindmap" => Some(SummaryType::VisualMindmap),
        "timeline" => Some(SummaryType::VisualTimeline),
        "flowchart" => Some(SummaryType::VisualFlowchart),
        _ => None,
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
