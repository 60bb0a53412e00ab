// src/providers/registry.rs
// Builds the runtime provider registry from configuration

use super::{GeminiProvider, GroqProvider, OpenRouterProvider, ProviderClient};
use crate::config::{CourierConfig, ProviderSettings};
use crate::orchestrator::{ProviderDescriptor, ProviderEntry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const MIN_KEY_LEN: usize = 8;
const VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Cheap structural check; catches copy-paste accidents before any network
/// call is ever made with the key.
pub fn key_looks_valid(key: &str) -> bool {
    key.len() >= MIN_KEY_LEN && key.is_ascii() && !key.chars().any(char::is_whitespace)
}

/// Loggable form of a credential: the first few characters only.
pub fn key_prefix(key: &str) -> String {
    let prefix: String = key.chars().take(6).collect();
    format!("{}…", prefix)
}

fn descriptor(
    name: &str,
    settings: &ProviderSettings,
    config: &CourierConfig,
    key: &str,
    priority: u32,
) -> ProviderDescriptor {
    ProviderDescriptor {
        name: name.to_string(),
        model: settings.model.clone(),
        priority,
        key_prefix: key_prefix(key),
        rate_limit_per_minute: settings.rate_limit_per_minute,
        failure_threshold: config.circuit_failure_threshold,
        cooldown: config.circuit_cooldown(),
        timeout: config.provider_timeout(),
    }
}

/// Assemble the provider registry: credential presence filters a provider in,
/// a failed key sanity check leaves it permanently unavailable, and the
/// configured primary preference is applied once here by promoting that
/// provider ahead of the rest. Ordering after this point is static.
pub fn build_registry(config: &CourierConfig) -> Vec<ProviderEntry> {
    let providers: [(&str, &ProviderSettings); 3] = [
        ("groq", &config.groq),
        ("gemini", &config.gemini),
        ("openrouter", &config.openrouter),
    ];

    let mut entries = Vec::new();
    for (name, settings) in providers {
        let Some(key) = settings.api_key.as_deref() else {
            info!("{} not configured (no API key), skipping", name);
            continue;
        };
        if !key_looks_valid(key) {
            warn!(
                "{} API key fails sanity check ({}); provider unavailable for this process",
                name,
                key_prefix(key)
            );
            continue;
        }

        let client: Arc<dyn ProviderClient> = match name {
            "groq" => Arc::new(GroqProvider::new(key.to_string(), settings.model.clone())),
            "gemini" => Arc::new(GeminiProvider::new(key.to_string(), settings.model.clone())),
            "openrouter" => Arc::new(OpenRouterProvider::new(
                key.to_string(),
                settings.model.clone(),
                config.cors_origin.clone(),
            )),
            _ => unreachable!("provider table and match arms must agree"),
        };

        let priority = if config.primary_provider == name {
            0
        } else {
            settings.priority
        };

        entries.push(ProviderEntry::new(
            descriptor(name, settings, config, key, priority),
            client,
        ));
        info!(
            "{} registered: model={}, priority={}, key={}",
            name,
            settings.model,
            priority,
            key_prefix(key)
        );
    }

    entries
}

/// Optional startup probe: one tiny generation per provider. Only a
/// definitive credential rejection removes a provider — a slow or flaky
/// network at boot must not disqualify anyone (it gets handled at runtime).
pub async fn validate_providers(entries: Vec<ProviderEntry>) -> Vec<ProviderEntry> {
    let mut validated = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry.descriptor.name.clone();
        match entry.client.generate("Hello", VALIDATION_TIMEOUT).await {
            Ok(_) => {
                info!("{} key validated", name);
                validated.push(entry);
            }
            Err(err) if err.is_auth() => {
                warn!("{} key validation failed ({}); provider removed", name, err);
            }
            Err(err) => {
                warn!("{} key validation inconclusive ({}); keeping provider", name, err);
                validated.push(entry);
            }
        }
    }
    validated
}
