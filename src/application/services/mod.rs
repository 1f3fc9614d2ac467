mod circuit;
mod cost;
mod health;
mod pipeline;
mod progress;
pub mod prompts;
mod quota;
mod registry;
mod retry;
mod selector;
mod stage_machine;
mod summary_generator;
pub mod transcript_processor;

pub use circuit::{CircuitBreakerConfig, CircuitRegistry, CircuitState};
pub use cost::CostTracker;
pub use health::{HealthMonitor, ProbeTarget};
pub use pipeline::{CancellationRegistry, PipelineConfig, PipelineWorker, StageDeadlines};
pub use progress::{ProgressBroadcaster, ProgressEvent, ProgressEventType};
pub use quota::{QuotaAmount, QuotaService};
pub use registry::{
    InstantiateOptions, ProviderFactory, ProviderMetadata, RegistryError, ServiceRegistry,
};
pub use retry::RetryPolicy;
pub use selector::{
    AsrSelection, LlmSelection, PreferredReason, ProviderScore, SelectionStrategy, SelectorError,
    SmartSelector, StorageSelection,
};
pub use stage_machine::{is_canonical_prefix, StageMachine};
pub use summary_generator::{
    validate_mermaid, GenerationOutcome, PremiumLlm, SummaryError, SummaryGenerator,
};
