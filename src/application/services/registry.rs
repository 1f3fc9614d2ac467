use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::{AsrVariant, ServiceKind};

/// Static per-provider facts declared at registration time. Immutable
/// afterwards; the selector and cost tracker read it without locks.
#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    pub display_name: String,
    /// ASR: cost per second of audio. Storage: cost per operation.
    pub cost_per_unit: f64,
    /// LLM pricing, flat across input/output for estimation purposes.
    pub cost_per_million_tokens: f64,
    pub supports_streaming: bool,
    pub supports_diarization: bool,
    pub variants: Vec<AsrVariant>,
    pub models: Vec<String>,
    pub default_model: Option<String>,
    pub free_tier_seconds_per_month: Option<f64>,
    pub premium: bool,
}

impl ProviderMetadata {
    pub fn new(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            cost_per_unit: 0.0,
            cost_per_million_tokens: 0.0,
            supports_streaming: false,
            supports_diarization: false,
            variants: Vec::new(),
            models: Vec::new(),
            default_model: None,
            free_tier_seconds_per_month: None,
            premium: false,
        }
    }

    pub fn cost_per_unit(mut self, cost: f64) -> Self {
        self.cost_per_unit = cost;
        self
    }

    pub fn cost_per_million_tokens(mut self, cost: f64) -> Self {
        self.cost_per_million_tokens = cost;
        self
    }

    pub fn streaming(mut self) -> Self {
        self.supports_streaming = true;
        self
    }

    pub fn diarization(mut self) -> Self {
        self.supports_diarization = true;
        self
    }

    pub fn variants(mut self, variants: &[AsrVariant]) -> Self {
        self.variants = variants.to_vec();
        self
    }

    pub fn models(mut self, models: &[&str], default: Option<&str>) -> Self {
        self.models = models.iter().map(|m| m.to_string()).collect();
        self.default_model = default.map(|m| m.to_string());
        self
    }

    pub fn free_tier_seconds_per_month(mut self, seconds: f64) -> Self {
        self.free_tier_seconds_per_month = Some(seconds);
        self
    }

    pub fn premium(mut self) -> Self {
        self.premium = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstantiateOptions {
    pub model_id: Option<String>,
}

impl InstantiateOptions {
    pub fn with_model(model_id: &str) -> Self {
        Self {
            model_id: Some(model_id.to_string()),
        }
    }
}

pub type ProviderFactory<S> =
    Box<dyn Fn(&InstantiateOptions) -> Result<Arc<S>, RegistryError> + Send + Sync>;

struct Registration<S: ?Sized> {
    metadata: ProviderMetadata,
    credentials_configured: bool,
    factory: ProviderFactory<S>,
}

/// Catalog of interchangeable providers for one service kind. Populated
/// once at startup, read-only afterwards. `BTreeMap` keeps provider
/// enumeration in ascending name order, which the selector relies on for
/// deterministic tie-breaking.
pub struct ServiceRegistry<S: ?Sized> {
    kind: ServiceKind,
    providers: BTreeMap<String, Registration<S>>,
}

impl<S: ?Sized> ServiceRegistry<S> {
    pub fn new(kind: ServiceKind) -> Self {
        Self {
            kind,
            providers: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn register(
        &mut self,
        name: &str,
        metadata: ProviderMetadata,
        credentials_configured: bool,
        factory: ProviderFactory<S>,
    ) -> Result<(), RegistryError> {
        if self.providers.contains_key(name) {
            return Err(RegistryError::Duplicate {
                kind: self.kind,
                provider: name.to_string(),
            });
        }
        tracing::info!(
            kind = %self.kind,
            provider = name,
            configured = credentials_configured,
            "Registered provider"
        );
        self.providers.insert(
            name.to_string(),
            Registration {
                metadata,
                credentials_configured,
                factory,
            },
        );
        Ok(())
    }

    /// Providers whose credentials are present in the environment, in
    /// ascending name order.
    pub fn discover(&self) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|(_, reg)| reg.credentials_configured)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(|name| name.as_str()).collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn is_configured(&self, name: &str) -> bool {
        self.providers
            .get(name)
            .map(|reg| reg.credentials_configured)
            .unwrap_or(false)
    }

    pub fn metadata(&self, name: &str) -> Option<&ProviderMetadata> {
        self.providers.get(name).map(|reg| &reg.metadata)
    }

    /// Build a fresh client. Multi-model providers require a `model_id`
    /// unless the metadata declares a default.
    pub fn instantiate(
        &self,
        name: &str,
        options: &InstantiateOptions,
    ) -> Result<Arc<S>, RegistryError> {
        let registration = self
            .providers
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered {
                kind: self.kind,
                provider: name.to_string(),
            })?;

        if !registration.credentials_configured {
            return Err(RegistryError::CredentialsMissing {
                kind: self.kind,
                provider: name.to_string(),
            });
        }

        let mut options = options.clone();
        if options.model_id.is_none() {
            if let Some(default) = &registration.metadata.default_model {
                options.model_id = Some(default.clone());
            } else if registration.metadata.models.len() > 1 {
                return Err(RegistryError::Config(format!(
                    "provider '{}' serves multiple models and has no default; model_id is required",
                    name
                )));
            }
        }

        (registration.factory)(&options)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{kind} provider '{provider}' is already registered")]
    Duplicate {
        kind: ServiceKind,
        provider: String,
    },
    #[error("{kind} provider '{provider}' is not registered")]
    NotRegistered {
        kind: ServiceKind,
        provider: String,
    },
    #[error("{kind} provider '{provider}' has no credentials configured")]
    CredentialsMissing {
        kind: ServiceKind,
        provider: String,
    },
    #[error("provider configuration error: {0}")]
    Config(String),
}
