// tests/support.rs
#![allow(dead_code)]

use async_trait::async_trait;
use courier::orchestrator::{ProviderDescriptor, RetryPolicy};
use courier::providers::{ProviderClient, ProviderError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted stand-in for a remote provider.
pub enum Behavior {
    Succeed(&'static str),
    FailRemote,
    FailAuth,
    FailThenSucceed { failures: u32, text: &'static str },
}

pub struct FakeProvider {
    name: &'static str,
    behavior: Behavior,
    calls: AtomicU32,
}

impl FakeProvider {
    pub fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior,
            calls: AtomicU32::new(0),
        })
    }

    /// How many times the orchestration layer actually called this provider.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn generate(
        &self,
        _message: &str,
        _timeout: Duration,
    ) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed(text) => Ok((*text).to_string()),
            Behavior::FailRemote => Err(ProviderError::Remote {
                status: 503,
                message: "service unavailable".into(),
            }),
            Behavior::FailAuth => Err(ProviderError::Auth("invalid key".into())),
            Behavior::FailThenSucceed { failures, text } => {
                if call < *failures {
                    Err(ProviderError::Remote {
                        status: 503,
                        message: "service unavailable".into(),
                    })
                } else {
                    Ok((*text).to_string())
                }
            }
        }
    }
}

/// Descriptor with relaxed limits; tests tighten individual fields as needed.
pub fn descriptor(name: &str, priority: u32) -> ProviderDescriptor {
    ProviderDescriptor {
        name: name.to_string(),
        model: "test-model".to_string(),
        priority,
        key_prefix: "test-k…".to_string(),
        rate_limit_per_minute: 1000,
        failure_threshold: 5,
        cooldown: Duration::from_secs(30),
        timeout: Duration::from_secs(2),
    }
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}
