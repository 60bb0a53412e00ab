// tests/orchestrator_flow.rs
// End-to-end dispatch scenarios over scripted providers: priority order,
// circuit opening and probing, rate limiting, credential failure, fallback.

mod support;

use courier::orchestrator::{
    Orchestrator, ProviderEntry, DEFAULT_FALLBACK_RESPONSE,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use support::{descriptor, fast_retry, Behavior, FakeProvider};

#[tokio::test]
async fn healthy_primary_answers_with_one_attempt() {
    let groq = FakeProvider::new("groq", Behavior::Succeed("X"));
    let gemini = FakeProvider::new("gemini", Behavior::Succeed("Y"));
    let orchestrator = Orchestrator::new(
        vec![
            ProviderEntry::new(descriptor("groq", 1), groq.clone()),
            ProviderEntry::new(descriptor("gemini", 2), gemini.clone()),
        ],
        fast_retry(3),
    );

    let result = orchestrator.handle("hello there", "caller-x").await;

    assert_eq!(result.response, "X");
    assert_eq!(result.provider.as_deref(), Some("groq"));
    assert!(!result.is_fallback);
    assert_eq!(groq.call_count(), 1);
    assert_eq!(gemini.call_count(), 0);

    let snapshot = orchestrator.usage_snapshot();
    assert_eq!(snapshot["groq"].requests, 1);
    assert_eq!(snapshot["groq"].successes, 1);
}

#[tokio::test]
async fn transient_failure_is_retried_on_same_provider() {
    let groq = FakeProvider::new(
        "groq",
        Behavior::FailThenSucceed {
            failures: 1,
            text: "second try",
        },
    );
    let orchestrator = Orchestrator::new(
        vec![ProviderEntry::new(descriptor("groq", 1), groq.clone())],
        fast_retry(3),
    );

    let result = orchestrator.handle("hello", "caller-x").await;

    assert_eq!(result.response, "second try");
    assert!(!result.is_fallback);
    assert_eq!(groq.call_count(), 2);

    let snapshot = orchestrator.usage_snapshot();
    assert_eq!(snapshot["groq"].requests, 2);
    assert_eq!(snapshot["groq"].successes, 1);
    assert_eq!(snapshot["groq"].failures, 1);
}

#[tokio::test]
async fn sustained_failure_opens_every_circuit_and_stops_network_calls() {
    let groq = FakeProvider::new("groq", Behavior::FailRemote);
    let gemini = FakeProvider::new("gemini", Behavior::FailRemote);
    let orchestrator = Orchestrator::new(
        vec![
            ProviderEntry::new(descriptor("groq", 1), groq.clone()),
            ProviderEntry::new(descriptor("gemini", 2), gemini.clone()),
        ],
        fast_retry(1),
    );

    for _ in 0..5 {
        let result = orchestrator.handle("hello", "caller-x").await;
        assert!(result.is_fallback);
    }
    assert_eq!(groq.call_count(), 5);
    assert_eq!(gemini.call_count(), 5);

    for health in orchestrator.provider_health() {
        assert_eq!(health.circuit, "open", "{} should be open", health.name);
    }

    // With both circuits open the next request is pure admission rejection
    let result = orchestrator.handle("hello", "caller-x").await;
    assert!(result.is_fallback);
    assert!(result.provider.is_none());
    assert_eq!(groq.call_count(), 5);
    assert_eq!(gemini.call_count(), 5);

    let snapshot = orchestrator.usage_snapshot();
    assert_eq!(snapshot["groq"].rejected_circuit, 1);
    assert_eq!(snapshot["gemini"].rejected_circuit, 1);
}

#[tokio::test]
async fn open_primary_falls_through_to_healthy_secondary() {
    let groq = FakeProvider::new("groq", Behavior::FailRemote);
    let gemini = FakeProvider::new("gemini", Behavior::Succeed("gemini says hi"));
    let mut groq_desc = descriptor("groq", 1);
    groq_desc.failure_threshold = 1;
    let orchestrator = Orchestrator::new(
        vec![
            ProviderEntry::new(groq_desc, groq.clone()),
            ProviderEntry::new(descriptor("gemini", 2), gemini.clone()),
        ],
        fast_retry(1),
    );

    // First request burns groq's only allowed failure and lands on gemini
    let result = orchestrator.handle("hello", "caller-x").await;
    assert_eq!(result.provider.as_deref(), Some("gemini"));

    // groq is now open: it must not be attempted again
    let result = orchestrator.handle("services please", "caller-x").await;
    assert_eq!(result.provider.as_deref(), Some("gemini"));
    assert_eq!(result.response, "gemini says hi");
    assert!(!result.is_fallback);
    assert_eq!(groq.call_count(), 1);
}

#[tokio::test]
async fn empty_registry_always_falls_back() {
    let orchestrator = Orchestrator::new(vec![], fast_retry(3));

    let result = orchestrator.handle("zzz qqq", "caller-x").await;
    assert!(result.is_fallback);
    assert!(result.provider.is_none());
    assert_eq!(result.response, DEFAULT_FALLBACK_RESPONSE);

    // Keyword intents still work without any provider
    let result = orchestrator.handle("hello", "caller-x").await;
    assert!(result.is_fallback);
    assert!(result.response.contains("Hey there"));
}

#[tokio::test]
async fn rate_limited_caller_spills_to_next_provider() {
    let groq = FakeProvider::new("groq", Behavior::Succeed("from groq"));
    let gemini = FakeProvider::new("gemini", Behavior::Succeed("from gemini"));
    let mut groq_desc = descriptor("groq", 1);
    groq_desc.rate_limit_per_minute = 3;
    let orchestrator = Orchestrator::new(
        vec![
            ProviderEntry::new(groq_desc, groq.clone()),
            ProviderEntry::new(descriptor("gemini", 2), gemini.clone()),
        ],
        fast_retry(1),
    );

    for _ in 0..3 {
        let result = orchestrator.handle("hello", "caller-x").await;
        assert_eq!(result.provider.as_deref(), Some("groq"));
    }

    // Fourth request in the window: caller-x is over groq's quota
    let result = orchestrator.handle("hello", "caller-x").await;
    assert_eq!(result.provider.as_deref(), Some("gemini"));
    assert!(!result.is_fallback);

    // An unrelated caller still reaches groq
    let result = orchestrator.handle("hello", "caller-y").await;
    assert_eq!(result.provider.as_deref(), Some("groq"));

    let snapshot = orchestrator.usage_snapshot();
    assert_eq!(snapshot["groq"].rejected_rate_limit, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn half_open_circuit_grants_exactly_one_probe_under_concurrency() {
    let groq = FakeProvider::new("groq", Behavior::FailRemote);
    let mut groq_desc = descriptor("groq", 1);
    groq_desc.failure_threshold = 1;
    groq_desc.cooldown = Duration::from_millis(100);
    let orchestrator = Arc::new(Orchestrator::new(
        vec![ProviderEntry::new(groq_desc, groq.clone())],
        fast_retry(1),
    ));

    let result = orchestrator.handle("hello", "caller-x").await;
    assert!(result.is_fallback);
    assert_eq!(groq.call_count(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;

    // Everyone arrives at once after the cool-down; only one gets the probe
    let tasks = (0..8).map(|i| {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .handle("hello", &format!("caller-{}", i))
                .await
        })
    });
    let results = join_all(tasks).await;

    assert_eq!(groq.call_count(), 2);
    for result in results {
        assert!(result.unwrap().is_fallback);
    }
}

#[tokio::test]
async fn auth_rejection_disables_provider_for_process_lifetime() {
    let groq = FakeProvider::new("groq", Behavior::FailAuth);
    let gemini = FakeProvider::new("gemini", Behavior::Succeed("g"));
    let orchestrator = Orchestrator::new(
        vec![
            ProviderEntry::new(descriptor("groq", 1), groq.clone()),
            ProviderEntry::new(descriptor("gemini", 2), gemini.clone()),
        ],
        fast_retry(3),
    );

    let result = orchestrator.handle("hello", "caller-x").await;
    assert_eq!(result.provider.as_deref(), Some("gemini"));
    // Auth errors are not retried
    assert_eq!(groq.call_count(), 1);

    let result = orchestrator.handle("hello", "caller-x").await;
    assert_eq!(result.provider.as_deref(), Some("gemini"));
    assert_eq!(groq.call_count(), 1);

    let health = orchestrator.provider_health();
    let groq_health = health.iter().find(|h| h.name == "groq").unwrap();
    assert!(groq_health.disabled);
}

#[tokio::test]
async fn fallback_flag_set_exactly_when_no_provider_succeeded() {
    let groq = FakeProvider::new("groq", Behavior::FailRemote);
    let orchestrator = Orchestrator::new(
        vec![ProviderEntry::new(descriptor("groq", 1), groq.clone())],
        fast_retry(2),
    );

    let result = orchestrator.handle("what are your hours", "caller-x").await;
    assert!(result.is_fallback);
    assert!(result.provider.is_none());
    assert!(result.response.contains("Mon-Fri"));

    let snapshot = orchestrator.usage_snapshot();
    assert_eq!(snapshot["fallback"].successes, 1);
}
