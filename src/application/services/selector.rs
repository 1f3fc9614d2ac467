use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;

use crate::application::ports::{AsrEngine, LlmClient, ObjectStorage, RepositoryError, UsageLog};
use crate::domain::{window_bounds, AsrVariant, ServiceKind, UserId, WindowType};

use super::circuit::CircuitRegistry;
use super::health::HealthMonitor;
use super::quota::QuotaService;
use super::registry::{InstantiateOptions, ProviderMetadata, RegistryError, ServiceRegistry};

/// Closed set of selection strategies; each is a different weight vector
/// over the same four scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    HealthFirst,
    CostFirst,
    PerformanceFirst,
    #[default]
    Balanced,
}

#[derive(Debug, Clone, Copy)]
struct ScoreWeights {
    free_quota: f64,
    health: f64,
    cost: f64,
    quota: f64,
}

impl SelectionStrategy {
    fn weights(&self) -> ScoreWeights {
        match self {
            SelectionStrategy::Balanced => ScoreWeights {
                free_quota: 0.40,
                health: 0.25,
                cost: 0.20,
                quota: 0.15,
            },
            SelectionStrategy::HealthFirst => ScoreWeights {
                free_quota: 0.20,
                health: 0.60,
                cost: 0.10,
                quota: 0.10,
            },
            SelectionStrategy::CostFirst => ScoreWeights {
                free_quota: 0.30,
                health: 0.10,
                cost: 0.50,
                quota: 0.10,
            },
            SelectionStrategy::PerformanceFirst => ScoreWeights {
                free_quota: 0.15,
                health: 0.45,
                cost: 0.10,
                quota: 0.30,
            },
        }
    }
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "health_first" => Ok(SelectionStrategy::HealthFirst),
            "cost_first" => Ok(SelectionStrategy::CostFirst),
            "performance_first" => Ok(SelectionStrategy::PerformanceFirst),
            "balanced" => Ok(SelectionStrategy::Balanced),
            _ => Err(format!("Invalid selection strategy: {}", s)),
        }
    }
}

/// Per-candidate scores computed during one selection.
#[derive(Debug, Clone)]
pub struct ProviderScore {
    pub provider: String,
    pub health: f64,
    pub cost: f64,
    pub quota: f64,
    pub free_quota: f64,
    pub total: f64,
}

pub struct AsrSelection {
    pub provider: String,
    pub variant: AsrVariant,
    pub engine: Arc<dyn AsrEngine>,
}

pub struct LlmSelection {
    pub provider: String,
    pub model_id: Option<String>,
    pub client: Arc<dyn LlmClient>,
}

pub struct StorageSelection {
    pub provider: String,
    pub store: Arc<dyn ObjectStorage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredReason {
    CircuitOpen,
    QuotaExhausted,
}

#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error("no available {0} provider")]
    NoProviderAvailable(ServiceKind),
    #[error("preferred provider '{provider}' unavailable: {reason:?}")]
    PreferredUnavailable {
        provider: String,
        reason: PreferredReason,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Scoring-based provider selection over the registries, consulting
/// health, circuits, quotas, free-tier usage and estimated cost.
pub struct SmartSelector {
    asr: Arc<ServiceRegistry<dyn AsrEngine>>,
    llm: Arc<ServiceRegistry<dyn LlmClient>>,
    storage: Arc<ServiceRegistry<dyn ObjectStorage>>,
    health: Arc<HealthMonitor>,
    circuits: Arc<CircuitRegistry>,
    quota: Arc<QuotaService>,
    usage: Arc<dyn UsageLog>,
    default_strategy: SelectionStrategy,
}

impl SmartSelector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        asr: Arc<ServiceRegistry<dyn AsrEngine>>,
        llm: Arc<ServiceRegistry<dyn LlmClient>>,
        storage: Arc<ServiceRegistry<dyn ObjectStorage>>,
        health: Arc<HealthMonitor>,
        circuits: Arc<CircuitRegistry>,
        quota: Arc<QuotaService>,
        usage: Arc<dyn UsageLog>,
        default_strategy: SelectionStrategy,
    ) -> Self {
        Self {
            asr,
            llm,
            storage,
            health,
            circuits,
            quota,
            usage,
            default_strategy,
        }
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn circuits(&self) -> &CircuitRegistry {
        &self.circuits
    }

    pub fn asr_metadata(&self, provider: &str) -> Option<ProviderMetadata> {
        self.asr.metadata(provider).cloned()
    }

    pub fn llm_metadata(&self, provider: &str) -> Option<ProviderMetadata> {
        self.llm.metadata(provider).cloned()
    }

    /// Pick an ASR provider and quota lane. With no explicit variant the
    /// selector tries `file_fast` first and falls back to `file`.
    pub async fn select_asr(
        &self,
        user_id: Option<UserId>,
        preferred: Option<&str>,
        variant: Option<AsrVariant>,
        duration_hint: Option<f64>,
        require_diarization: bool,
        strategy: Option<SelectionStrategy>,
    ) -> Result<AsrSelection, SelectorError> {
        let now = Utc::now();

        if let Some(preferred) = preferred {
            // A preferred provider is taken at its word; the only outs are
            // an open circuit or exhausted quota, and those fail loudly
            // instead of silently substituting someone else.
            if self.circuits.is_open(ServiceKind::Asr, preferred) {
                return Err(SelectorError::PreferredUnavailable {
                    provider: preferred.to_string(),
                    reason: PreferredReason::CircuitOpen,
                });
            }
            let variant = variant.unwrap_or(AsrVariant::File);
            if !self
                .quota
                .check_available(user_id, preferred, variant, now)
                .await?
            {
                return Err(SelectorError::PreferredUnavailable {
                    provider: preferred.to_string(),
                    reason: PreferredReason::QuotaExhausted,
                });
            }
            let engine = self
                .asr
                .instantiate(preferred, &InstantiateOptions::default())?;
            return Ok(AsrSelection {
                provider: preferred.to_string(),
                variant,
                engine,
            });
        }

        let variants: Vec<AsrVariant> = match variant {
            Some(v) => vec![v],
            None => AsrVariant::DEFAULT_PREFERENCE.to_vec(),
        };

        for lane in &variants {
            let mut candidates = Vec::new();
            for name in self.asr.discover() {
                let metadata = match self.asr.metadata(name) {
                    Some(m) => m.clone(),
                    None => continue,
                };
                if !metadata.variants.contains(lane) {
                    continue;
                }
                if require_diarization && !metadata.supports_diarization {
                    continue;
                }
                if self.circuits.is_open(ServiceKind::Asr, name) {
                    continue;
                }
                if !self.quota.check_available(user_id, name, *lane, now).await? {
                    continue;
                }
                candidates.push((name.to_string(), metadata));
            }

            if candidates.is_empty() {
                continue;
            }

            let mut scores = Vec::with_capacity(candidates.len());
            for (name, metadata) in &candidates {
                let quota_score = match self
                    .quota
                    .remaining_fraction(user_id, name, *lane, now)
                    .await?
                {
                    None => 1.0,
                    Some(fraction) => fraction,
                };
                let free_quota = self
                    .free_tier_fraction(ServiceKind::Asr, name, metadata)
                    .await;
                let estimated = metadata.cost_per_unit * duration_hint.unwrap_or(60.0);
                scores.push(ScoreInput {
                    provider: name.clone(),
                    health: self.health.score(ServiceKind::Asr, name),
                    estimated_cost: estimated,
                    quota: quota_score,
                    free_quota,
                });
            }

            let strategy = strategy.unwrap_or(self.default_strategy);
            if let Some(best) = pick_best(scores, strategy) {
                tracing::debug!(
                    provider = %best.provider,
                    variant = %lane,
                    total = best.total,
                    "ASR provider selected"
                );
                let engine = self
                    .asr
                    .instantiate(&best.provider, &InstantiateOptions::default())?;
                return Ok(AsrSelection {
                    provider: best.provider,
                    variant: *lane,
                    engine,
                });
            }
        }

        Err(SelectorError::NoProviderAvailable(ServiceKind::Asr))
    }

    pub async fn select_llm(
        &self,
        preferred: Option<&str>,
        model_id: Option<&str>,
        token_hint: Option<u64>,
        strategy: Option<SelectionStrategy>,
    ) -> Result<LlmSelection, SelectorError> {
        let options = InstantiateOptions {
            model_id: model_id.map(str::to_string),
        };

        if let Some(preferred) = preferred {
            if self.circuits.is_open(ServiceKind::Llm, preferred) {
                return Err(SelectorError::PreferredUnavailable {
                    provider: preferred.to_string(),
                    reason: PreferredReason::CircuitOpen,
                });
            }
            let client = self.llm.instantiate(preferred, &options)?;
            return Ok(LlmSelection {
                provider: preferred.to_string(),
                model_id: options.model_id,
                client,
            });
        }

        let mut scores = Vec::new();
        for name in self.llm.discover() {
            if self.circuits.is_open(ServiceKind::Llm, name) {
                continue;
            }
            let metadata = match self.llm.metadata(name) {
                Some(m) => m.clone(),
                None => continue,
            };
            let tokens = token_hint.unwrap_or(2_000);
            let estimated = metadata.cost_per_million_tokens * tokens as f64 / 1_000_000.0;
            let free_quota = self
                .free_tier_fraction(ServiceKind::Llm, name, &metadata)
                .await;
            scores.push(ScoreInput {
                provider: name.to_string(),
                health: self.health.score(ServiceKind::Llm, name),
                estimated_cost: estimated,
                quota: 1.0,
                free_quota,
            });
        }

        let strategy = strategy.unwrap_or(self.default_strategy);
        let best = pick_best(scores, strategy)
            .ok_or(SelectorError::NoProviderAvailable(ServiceKind::Llm))?;
        tracing::debug!(provider = %best.provider, total = best.total, "LLM provider selected");
        let client = self.llm.instantiate(&best.provider, &options)?;
        Ok(LlmSelection {
            provider: best.provider,
            model_id: options.model_id,
            client,
        })
    }

    pub async fn select_storage(
        &self,
        preferred: Option<&str>,
    ) -> Result<StorageSelection, SelectorError> {
        if let Some(preferred) = preferred {
            if self.circuits.is_open(ServiceKind::Storage, preferred) {
                return Err(SelectorError::PreferredUnavailable {
                    provider: preferred.to_string(),
                    reason: PreferredReason::CircuitOpen,
                });
            }
            let store = self
                .storage
                .instantiate(preferred, &InstantiateOptions::default())?;
            return Ok(StorageSelection {
                provider: preferred.to_string(),
                store,
            });
        }

        let mut best: Option<(String, f64)> = None;
        for name in self.storage.discover() {
            if self.circuits.is_open(ServiceKind::Storage, name) {
                continue;
            }
            let score = self.health.score(ServiceKind::Storage, name);
            let replace = match &best {
                None => true,
                Some((_, current)) => score > *current,
            };
            if replace {
                best = Some((name.to_string(), score));
            }
        }

        let (provider, _) =
            best.ok_or(SelectorError::NoProviderAvailable(ServiceKind::Storage))?;
        let store = self
            .storage
            .instantiate(&provider, &InstantiateOptions::default())?;
        Ok(StorageSelection { provider, store })
    }

    /// Remaining fraction of the provider's declared monthly free tier,
    /// from the durable usage log. No tier declared means the score is
    /// neutral (1.0); an unreadable log falls back the same way.
    async fn free_tier_fraction(
        &self,
        kind: ServiceKind,
        provider: &str,
        metadata: &ProviderMetadata,
    ) -> f64 {
        let tier = match metadata.free_tier_seconds_per_month {
            Some(tier) if tier > 0.0 => tier,
            _ => return 1.0,
        };
        let (month_start, _) = window_bounds(WindowType::Month, Utc::now());
        match self
            .usage
            .total_duration_seconds(kind, provider, month_start)
            .await
        {
            Ok(used) => (1.0 - used / tier).clamp(0.0, 1.0),
            Err(e) => {
                tracing::warn!(error = %e, provider, "Free-tier usage lookup failed");
                1.0
            }
        }
    }
}

struct ScoreInput {
    provider: String,
    health: f64,
    estimated_cost: f64,
    quota: f64,
    free_quota: f64,
}

/// Weighted scoring with deterministic tie-break on ascending provider
/// name (inputs arrive in registry order; strict `>` keeps the first).
fn pick_best(inputs: Vec<ScoreInput>, strategy: SelectionStrategy) -> Option<ProviderScore> {
    if inputs.is_empty() {
        return None;
    }
    let max_cost = inputs
        .iter()
        .map(|input| input.estimated_cost)
        .fold(0.0_f64, f64::max);
    let weights = strategy.weights();

    let mut best: Option<ProviderScore> = None;
    for input in inputs {
        let cost_score = if max_cost <= 0.0 {
            1.0
        } else {
            (1.0 - input.estimated_cost / max_cost).max(0.0)
        };
        let total = input.free_quota * weights.free_quota
            + input.health * weights.health
            + cost_score * weights.cost
            + input.quota * weights.quota;
        let score = ProviderScore {
            provider: input.provider,
            health: input.health,
            cost: cost_score,
            quota: input.quota,
            free_quota: input.free_quota,
            total,
        };
        let replace = match &best {
            None => true,
            Some(current) => score.total > current.total,
        };
        if replace {
            best = Some(score);
        }
    }
    best
}
