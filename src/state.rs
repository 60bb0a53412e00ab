// src/state.rs

use crate::config::CourierConfig;
use crate::orchestrator::{Orchestrator, RetryPolicy};
use crate::providers;
use std::sync::Arc;
use std::time::Duration;

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub request_deadline: Duration,
    pub cors_origin: String,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        request_deadline: Duration,
        cors_origin: String,
    ) -> Self {
        Self {
            orchestrator,
            request_deadline,
            cors_origin,
        }
    }
}

pub async fn create_app_state(config: &CourierConfig) -> anyhow::Result<Arc<AppState>> {
    let mut entries = providers::build_registry(config);
    if config.validate_keys_on_startup {
        entries = providers::validate_providers(entries).await;
    }

    let retry_policy = RetryPolicy {
        max_attempts: config.ai_max_retries.max(1),
        base_delay: Duration::from_millis(config.retry_base_delay_ms),
        max_delay: Duration::from_millis(config.retry_max_delay_ms),
    };

    let orchestrator = Arc::new(Orchestrator::new(entries, retry_policy));

    Ok(Arc::new(AppState::new(
        orchestrator,
        config.request_deadline(),
        config.cors_origin.clone(),
    )))
}
