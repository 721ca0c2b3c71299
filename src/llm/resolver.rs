use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use opentelemetry::KeyValue;

use super::{Backend, Credential, ModelDescriptor};
use crate::error::DiscoveryError;
use crate::telemetry::metrics::MODEL_DISCOVERY_COUNT;

/// First preferred name that was discovered, else the provider's first model.
pub fn choose(discovered: &[String], preference: &[String]) -> Option<String> {
    preference
        .iter()
        .find(|pref| discovered.contains(pref))
        .or_else(|| discovered.first())
        .cloned()
}

pub struct ModelResolver {
    backend: Arc<dyn Backend>,
    preferred_models: Vec<String>,
    discovered: RwLock<HashMap<String, Vec<String>>>,
}

impl ModelResolver {
    pub fn new(backend: Arc<dyn Backend>, preferred_models: Vec<String>) -> Self {
        Self {
            backend,
            preferred_models,
            discovered: RwLock::new(HashMap::new()),
        }
    }

    pub fn preferred_models(&self) -> &[String] {
        &self.preferred_models
    }

    #[tracing::instrument(
        name = "model_resolver discover",
        skip(self, credential),
        fields(
            credential.fingerprint = %credential.fingerprint(),
            models.listed,
            models.usable,
        )
    )]
    pub async fn discover(&self, credential: &Credential) -> Result<Vec<String>, DiscoveryError> {
        let result = self.backend.list_models(credential).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(_) => "error",
        };
        MODEL_DISCOVERY_COUNT.add(1, &[KeyValue::new("outcome", outcome)]);

        let listed = result.map_err(|e| {
            tracing::warn!(error = %e, "Model discovery failed");
            DiscoveryError::new(e.to_string())
        })?;

        let usable = usable_models(listed);

        let span = tracing::Span::current();
        span.record("models.usable", usable.len());

        if usable.is_empty() {
            return Err(DiscoveryError::new("No valid models found."));
        }

        Ok(usable)
    }

    /// Cached per credential for the process lifetime unless `refresh` is set.
    /// Failed discoveries are never cached.
    pub async fn discover_cached(
        &self,
        credential: &Credential,
        refresh: bool,
    ) -> Result<Vec<String>, DiscoveryError> {
        let fingerprint = credential.fingerprint();

        if !refresh && let Some(models) = self.cached(&fingerprint) {
            return Ok(models);
        }

        let models = self.discover(credential).await?;

        self.discovered
            .write()
            .map_err(|_| DiscoveryError::new("model cache unavailable"))?
            .insert(fingerprint, models.clone());

        Ok(models)
    }

    fn cached(&self, fingerprint: &str) -> Option<Vec<String>> {
        self.discovered
            .read()
            .ok()
            .and_then(|cache| cache.get(fingerprint).cloned())
    }

    pub async fn resolve(
        &self,
        credential: &Credential,
        refresh: bool,
    ) -> Result<(String, Vec<String>), DiscoveryError> {
        let discovered = self.discover_cached(credential, refresh).await?;
        let chosen = choose(&discovered, &self.preferred_models)
            .ok_or_else(|| DiscoveryError::new("No valid models found."))?;

        tracing::info!(model = %chosen, available = discovered.len(), "Model resolved");

        Ok((chosen, discovered))
    }

    /// Explicit model first, then the preference order, without duplicates.
    pub fn explicit_chain(&self, explicit: &str) -> Vec<String> {
        dedup_chain(std::iter::once(explicit.to_string()).chain(self.preferred_models.iter().cloned()))
    }

    /// Chosen model first, then preferred models the credential can actually use.
    pub fn discovered_chain(&self, chosen: &str, discovered: &[String]) -> Vec<String> {
        dedup_chain(
            std::iter::once(chosen.to_string()).chain(
                self.preferred_models
                    .iter()
                    .filter(|m| discovered.contains(m))
                    .cloned(),
            ),
        )
    }
}

fn usable_models(listed: Vec<ModelDescriptor>) -> Vec<String> {
    let span = tracing::Span::current();
    span.record("models.listed", listed.len());

    listed
        .into_iter()
        .filter(|m| m.supports_generation)
        .map(|m| m.name)
        .collect()
}

fn dedup_chain(models: impl Iterator<Item = String>) -> Vec<String> {
    let mut chain: Vec<String> = Vec::new();
    for model in models {
        if !model.is_empty() && !chain.contains(&model) {
            chain.push(model);
        }
    }
    chain
}
