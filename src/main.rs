use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;

use echoscribe::application::ports::{
    AsrEngine, CostIndex, LlmClient, ObjectStorage, TaskQueue, UsageLog,
};
use echoscribe::application::services::{
    CancellationRegistry, CircuitBreakerConfig, CircuitRegistry, CostTracker, HealthMonitor,
    PipelineConfig, PipelineWorker, PremiumLlm, ProgressBroadcaster, ProviderMetadata,
    QuotaService, SelectionStrategy, ServiceRegistry, SmartSelector, StageMachine,
    SummaryGenerator,
};
use echoscribe::domain::{AsrVariant, ServiceKind};
use echoscribe::infrastructure::asr::{DeepgramEngine, MockAsrEngine, OpenAiWhisperEngine};
use echoscribe::infrastructure::llm::{AnthropicClient, OpenAiChatClient};
use echoscribe::infrastructure::media::{
    FfmpegTranscoder, HttpMediaDownloader, HttpMediaResolver, MermaidCliRenderer,
};
use echoscribe::infrastructure::observability::{init_tracing, TracingConfig};
use echoscribe::infrastructure::persistence::{
    create_pool, InMemoryTaskQueue, PgNotificationRepository, PgQuotaStore, PgStageRepository,
    PgSummaryRepository, PgTaskRepository, PgTranscriptRepository, PgUsageLog, RedisCostIndex,
    RedisTaskQueue,
};
use echoscribe::infrastructure::storage::{AzureObjectStore, LocalObjectStore, S3ObjectStore};
use echoscribe::presentation::{create_router, AppState, Settings};

fn build_asr_registry(settings: &Settings) -> anyhow::Result<ServiceRegistry<dyn AsrEngine>> {
    let mut registry = ServiceRegistry::new(ServiceKind::Asr);

    let openai_key = settings.asr.openai_api_key.clone();
    let openai_base = settings.asr.openai_base_url.clone();
    registry.register(
        "whisper",
        ProviderMetadata::new("OpenAI Whisper")
            .cost_per_unit(0.0001)
            .variants(&[AsrVariant::File]),
        openai_key.is_some(),
        Box::new(move |_options| {
            Ok(Arc::new(OpenAiWhisperEngine::new(
                openai_key.clone().unwrap_or_default(),
                openai_base.clone(),
                None,
            )) as Arc<dyn AsrEngine>)
        }),
    )?;

    let deepgram_key = settings.asr.deepgram_api_key.clone();
    registry.register(
        "deepgram",
        ProviderMetadata::new("Deepgram Nova")
            .cost_per_unit(0.000072)
            .variants(&[AsrVariant::File, AsrVariant::FileFast])
            .diarization()
            .streaming()
            .free_tier_seconds_per_month(12_000.0),
        deepgram_key.is_some(),
        Box::new(move |_options| {
            Ok(Arc::new(DeepgramEngine::new(
                deepgram_key.clone().unwrap_or_default(),
                None,
                None,
            )) as Arc<dyn AsrEngine>)
        }),
    )?;

    if settings.asr.mock_enabled {
        registry.register(
            "mock",
            ProviderMetadata::new("Mock ASR")
                .variants(&[AsrVariant::File, AsrVariant::FileFast])
                .diarization(),
            true,
            Box::new(|_options| {
                Ok(Arc::new(MockAsrEngine::always(
                    MockAsrEngine::simple_transcription("mock transcript", 60.0),
                )) as Arc<dyn AsrEngine>)
            }),
        )?;
    }

    Ok(registry)
}

fn build_llm_registry(settings: &Settings) -> anyhow::Result<ServiceRegistry<dyn LlmClient>> {
    let mut registry = ServiceRegistry::new(ServiceKind::Llm);

    if let Some(openai) = &settings.llm.openai {
        let provider = openai.clone();
        registry.register(
            "openai",
            ProviderMetadata::new("OpenAI")
                .cost_per_million_tokens(provider.cost_per_million_tokens)
                .streaming()
                .models(&[provider.model.as_str()], Some(provider.model.as_str())),
            true,
            Box::new(move |options| {
                Ok(Arc::new(OpenAiChatClient::new(
                    provider.api_key.clone(),
                    provider.base_url.clone(),
                    options
                        .model_id
                        .clone()
                        .unwrap_or_else(|| provider.model.clone()),
                    provider.cost_per_million_tokens,
                )) as Arc<dyn LlmClient>)
            }),
        )?;
    }

    if let Some(openrouter) = &settings.llm.openrouter {
        let provider = openrouter.clone();
        registry.register(
            "openrouter",
            ProviderMetadata::new("OpenRouter")
                .cost_per_million_tokens(provider.cost_per_million_tokens)
                .streaming()
                .premium()
                .models(
                    &[
                        "anthropic/claude-3.5-sonnet",
                        "openai/gpt-4o",
                        "google/gemini-flash-1.5",
                    ],
                    Some(provider.model.as_str()),
                ),
            true,
            Box::new(move |options| {
                Ok(Arc::new(OpenAiChatClient::new(
                    provider.api_key.clone(),
                    provider.base_url.clone(),
                    options
                        .model_id
                        .clone()
                        .unwrap_or_else(|| provider.model.clone()),
                    provider.cost_per_million_tokens,
                )) as Arc<dyn LlmClient>)
            }),
        )?;
    }

    if let Some(anthropic) = &settings.llm.anthropic {
        let provider = anthropic.clone();
        registry.register(
            "anthropic",
            ProviderMetadata::new("Anthropic Claude")
                .cost_per_million_tokens(provider.cost_per_million_tokens)
                .premium()
                .models(&[provider.model.as_str()], Some(provider.model.as_str())),
            true,
            Box::new(move |options| {
                Ok(Arc::new(AnthropicClient::new(
                    provider.api_key.clone(),
                    provider.base_url.clone(),
                    options
                        .model_id
                        .clone()
                        .unwrap_or_else(|| provider.model.clone()),
                    provider.cost_per_million_tokens,
                )) as Arc<dyn LlmClient>)
            }),
        )?;
    }

    Ok(registry)
}

fn build_storage_registry(
    settings: &Settings,
) -> anyhow::Result<ServiceRegistry<dyn ObjectStorage>> {
    let mut registry = ServiceRegistry::new(ServiceKind::Storage);

    if let Some(s3) = &settings.storage.s3 {
        let s3 = s3.clone();
        registry.register(
            "s3",
            ProviderMetadata::new("S3"),
            true,
            Box::new(move |_options| {
                S3ObjectStore::new(
                    &s3.bucket,
                    &s3.region,
                    &s3.access_key_id,
                    &s3.secret_access_key,
                    s3.endpoint.as_deref(),
                )
                .map(|store| Arc::new(store) as Arc<dyn ObjectStorage>)
                .map_err(|e| {
                    echoscribe::application::services::RegistryError::Config(e.to_string())
                })
            }),
        )?;
    }

    if let Some(azure) = &settings.storage.azure {
        let azure = azure.clone();
        registry.register(
            "azure",
            ProviderMetadata::new("Azure Blob"),
            true,
            Box::new(move |_options| {
                AzureObjectStore::new(&azure.account, &azure.access_key, &azure.container)
                    .map(|store| Arc::new(store) as Arc<dyn ObjectStorage>)
                    .map_err(|e| {
                        echoscribe::application::services::RegistryError::Config(e.to_string())
                    })
            }),
        )?;
    }

    let local_path = settings
        .storage
        .local_path
        .clone()
        .unwrap_or_else(|| "./data/objects".to_string());
    let local_configured = settings.storage.s3.is_none() && settings.storage.azure.is_none();
    registry.register(
        "local",
        ProviderMetadata::new("Local Filesystem"),
        local_configured,
        Box::new(move |_options| {
            LocalObjectStore::new(PathBuf::from(&local_path))
                .map(|store| Arc::new(store) as Arc<dyn ObjectStorage>)
                .map_err(|e| {
                    echoscribe::application::services::RegistryError::Config(e.to_string())
                })
        }),
    )?;

    Ok(registry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env();
    init_tracing(
        TracingConfig::from_settings(&settings.logging),
        settings.server.port,
    );

    let pool = create_pool(&settings.database.url, settings.database.max_connections).await?;
    if settings.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let tasks = Arc::new(PgTaskRepository::new(pool.clone()));
    let stages = Arc::new(PgStageRepository::new(pool.clone()));
    let transcripts = Arc::new(PgTranscriptRepository::new(pool.clone()));
    let summaries = Arc::new(PgSummaryRepository::new(pool.clone()));
    let notifications = Arc::new(PgNotificationRepository::new(pool.clone()));
    let quota_store = Arc::new(PgQuotaStore::new(pool.clone()));
    let usage_log: Arc<dyn UsageLog> = Arc::new(PgUsageLog::new(pool.clone()));

    let (queue, cost_index): (Arc<dyn TaskQueue>, Option<Arc<dyn CostIndex>>) =
        if settings.redis.enabled {
            let queue = RedisTaskQueue::connect(&settings.redis.url).await?;
            let index = RedisCostIndex::connect(&settings.redis.url).await?;
            (Arc::new(queue), Some(Arc::new(index)))
        } else {
            tracing::warn!("Redis disabled; using in-process queue, cost fast-index off");
            (Arc::new(InMemoryTaskQueue::new(1024)), None)
        };

    let asr_registry = Arc::new(build_asr_registry(&settings)?);
    let llm_registry = Arc::new(build_llm_registry(&settings)?);
    let storage_registry = Arc::new(build_storage_registry(&settings)?);

    let health = Arc::new(HealthMonitor::new());
    let circuits = Arc::new(CircuitRegistry::new(
        CircuitBreakerConfig::default(),
        Arc::clone(&health),
    ));
    let quota = Arc::new(QuotaService::new(quota_store));
    let cost = Arc::new(CostTracker::new(Arc::clone(&usage_log), cost_index));

    let selector = Arc::new(SmartSelector::new(
        asr_registry,
        llm_registry,
        storage_registry,
        Arc::clone(&health),
        Arc::clone(&circuits),
        Arc::clone(&quota),
        Arc::clone(&usage_log),
        SelectionStrategy::Balanced,
    ));

    let premium = settings
        .llm
        .premium_provider
        .clone()
        .map(|provider| PremiumLlm {
            provider,
            model_id: settings.llm.premium_model_id.clone(),
        })
        .or_else(|| {
            settings.llm.openrouter.as_ref().map(|_| PremiumLlm {
                provider: "openrouter".to_string(),
                model_id: Some("anthropic/claude-3.5-sonnet".to_string()),
            })
        });

    let generator = Arc::new(SummaryGenerator::new(
        Arc::clone(&selector),
        summaries.clone(),
        Arc::clone(&cost),
        Some(Arc::new(MermaidCliRenderer::new(None))),
        premium,
    ));

    let progress = Arc::new(ProgressBroadcaster::new());
    let cancellations = Arc::new(CancellationRegistry::new());

    let pipeline_config = PipelineConfig {
        max_download_bytes: settings.pipeline.max_download_mb * 1024 * 1024,
        ..PipelineConfig::default()
    };
    let worker = Arc::new(PipelineWorker::new(
        tasks.clone(),
        StageMachine::new(stages),
        transcripts.clone(),
        notifications,
        Arc::clone(&quota),
        Arc::clone(&cost),
        Arc::clone(&selector),
        generator,
        Arc::clone(&progress),
        Arc::clone(&queue),
        Arc::new(HttpMediaResolver::new()),
        Arc::new(HttpMediaDownloader::new()),
        Arc::new(FfmpegTranscoder::default()),
        Arc::clone(&cancellations),
        pipeline_config,
    ));
    for index in 0..settings.pipeline.worker_count.max(1) {
        tracing::info!(worker = index, "Spawning pipeline worker");
        tokio::spawn(Arc::clone(&worker).run());
    }

    let state = AppState {
        tasks,
        transcripts,
        summaries,
        quota,
        selector,
        progress,
        queue,
        cancellations,
        upload: settings.upload.clone(),
    };
    let router = create_router(state);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    tracing::info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
