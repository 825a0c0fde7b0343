use gateway::llm::MockCompletionService;
use gateway::{CircuitPhase, CompletionService, Gateway, GatewayConfig, GatewayError, UserId};
use std::sync::Arc;
use std::time::Duration;

fn base_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.provider.primary_model = "m1".to_string();
    config.provider.fallback_model = Some("m2".to_string());
    config
}

fn build(config: GatewayConfig, mock: &Arc<MockCompletionService>) -> Gateway {
    let service: Arc<dyn CompletionService> = mock.clone();
    Gateway::new(config, service).unwrap()
}

fn alice() -> UserId {
    "alice".parse().unwrap()
}

fn models(mock: &MockCompletionService) -> Vec<String> {
    mock.calls().into_iter().map(|c| c.model).collect()
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_call_succeeds_on_retry() {
    let mock = Arc::new(MockCompletionService::new());
    mock.push_rate_limited();
    mock.push_response("recovered");
    let gateway = build(base_config(), &mock);

    let started = tokio::time::Instant::now();
    let text = gateway.chat(&alice(), "hello").await.unwrap();

    assert_eq!(text, "recovered");
    assert_eq!(gateway.circuit_failures(), 0);
    assert_eq!(gateway.circuit_phase(), CircuitPhase::Closed);
    assert_eq!(models(&mock), vec!["m1", "m1"]);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_failures_open_the_circuit() {
    let mock = Arc::new(MockCompletionService::new());
    for _ in 0..3 {
        mock.push_failure("INVALID_ARGUMENT: malformed request");
    }
    let gateway = build(base_config(), &mock);

    for prompt in ["one", "two", "three"] {
        assert!(matches!(
            gateway.chat(&alice(), prompt).await,
            Err(GatewayError::Upstream { .. })
        ));
    }
    assert_eq!(gateway.circuit_phase(), CircuitPhase::Open);

    assert_eq!(
        gateway.chat(&alice(), "four").await,
        Err(GatewayError::Unavailable {
            retry_after_secs: 60
        })
    );
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_call_after_cooldown_reaches_upstream_and_closes() {
    let mock = Arc::new(MockCompletionService::new());
    for _ in 0..3 {
        mock.push_failure("internal error");
    }
    let gateway = build(base_config(), &mock);
    for prompt in ["one", "two", "three"] {
        let _ = gateway.chat(&alice(), prompt).await;
    }

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(
        gateway.chat(&alice(), "four").await,
        Err(GatewayError::Unavailable {
            retry_after_secs: 30
        })
    );

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(gateway.chat(&alice(), "four").await.is_ok());
    assert_eq!(mock.call_count(), 4);
    assert_eq!(gateway.circuit_phase(), CircuitPhase::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_failed_trial_reopens_the_circuit() {
    let mut config = base_config();
    config.circuit.max_failures = 1;
    let mock = Arc::new(MockCompletionService::new());
    mock.push_failure("boom");
    mock.push_failure("still broken");
    let gateway = build(config, &mock);

    assert!(gateway.chat(&alice(), "one").await.is_err());
    tokio::time::advance(Duration::from_secs(60)).await;
    assert!(matches!(
        gateway.chat(&alice(), "two").await,
        Err(GatewayError::Upstream { .. })
    ));

    assert_eq!(gateway.circuit_phase(), CircuitPhase::Open);
    assert!(matches!(
        gateway.chat(&alice(), "three").await,
        Err(GatewayError::Unavailable { .. })
    ));
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cache_hit_bypasses_open_circuit() {
    let mock = Arc::new(MockCompletionService::with_default_response("cached answer"));
    let gateway = build(base_config(), &mock);
    gateway.chat(&alice(), "hello").await.unwrap();

    for _ in 0..3 {
        mock.push_failure("internal error");
    }
    for prompt in ["one", "two", "three"] {
        let _ = gateway.chat(&alice(), prompt).await;
    }
    assert_eq!(gateway.circuit_phase(), CircuitPhase::Open);

    assert_eq!(gateway.chat(&alice(), "hello").await.unwrap(), "cached answer");
}

#[tokio::test(start_paused = true)]
async fn test_fallback_model_serves_after_two_rate_limits() {
    let mock = Arc::new(MockCompletionService::new());
    mock.push_rate_limited();
    mock.push_rate_limited();
    mock.push_response("from the fallback");
    let gateway = build(base_config(), &mock);

    let text = gateway.chat(&alice(), "hello").await.unwrap();

    assert_eq!(text, "from the fallback");
    assert_eq!(models(&mock), vec!["m1", "m1", "m2"]);
    assert_eq!(gateway.circuit_failures(), 0);

    // Cached under the primary model.
    assert_eq!(gateway.chat(&alice(), "hello").await.unwrap(), "from the fallback");
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_chain_is_one_breaker_failure() {
    let mock = Arc::new(MockCompletionService::new());
    for _ in 0..3 {
        mock.push_rate_limited();
    }
    let gateway = build(base_config(), &mock);

    let err = gateway.chat(&alice(), "hello").await.unwrap_err();

    assert!(matches!(err, GatewayError::Upstream { ref model, .. } if model == "m2"));
    assert_eq!(gateway.circuit_failures(), 1);
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_without_fallback_chain_stops_after_retry() {
    let mut config = base_config();
    config.provider.fallback_model = None;
    let mock = Arc::new(MockCompletionService::new());
    mock.push_rate_limited();
    mock.push_rate_limited();
    mock.push_response("never reached");
    let gateway = build(config, &mock);

    let err = gateway.chat(&alice(), "hello").await.unwrap_err();

    assert!(matches!(err, GatewayError::Upstream { ref model, .. } if model == "m1"));
    assert_eq!(models(&mock), vec!["m1", "m1"]);
}

#[tokio::test(start_paused = true)]
async fn test_blank_completion_is_empty_response() {
    let mock = Arc::new(MockCompletionService::new());
    mock.push_response("   \n");
    let gateway = build(base_config(), &mock);

    let err = gateway.chat(&alice(), "hello").await.unwrap_err();

    assert_eq!(
        err,
        GatewayError::EmptyResponse {
            model: "m1".to_string()
        }
    );
    assert_eq!(gateway.circuit_failures(), 0);
    assert_eq!(gateway.cache_stats().entries, 0);
    let snapshot = gateway.session_snapshot(&alice()).await.unwrap();
    assert!(snapshot.history.is_empty());
    assert_eq!(snapshot.token_usage, 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_aborts_slow_upstream() {
    let mut config = base_config();
    config.retry.request_deadline_secs = 5;
    let mock = Arc::new(MockCompletionService::with_default_response("too late"));
    mock.set_latency(Duration::from_secs(10));
    let gateway = build(config, &mock);

    let err = gateway.chat(&alice(), "hello").await.unwrap_err();

    match err {
        GatewayError::Upstream { model, reason } => {
            assert_eq!(model, "m1");
            assert!(reason.contains("deadline"));
        }
        other => panic!("expected upstream timeout, got {other:?}")
    }
    assert_eq!(gateway.circuit_failures(), 1);
    assert_eq!(gateway.cache_stats().entries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_cuts_backoff_short() {
    let mut config = base_config();
    config.retry.request_deadline_secs = 5;
    config.retry.backoff_ms = 10_000;
    let mock = Arc::new(MockCompletionService::new());
    mock.push_rate_limited();
    let gateway = build(config, &mock);

    let started = tokio::time::Instant::now();
    assert!(matches!(
        gateway.chat(&alice(), "hello").await,
        Err(GatewayError::Upstream { .. })
    ));

    assert_eq!(mock.call_count(), 1);
    assert!(started.elapsed() < Duration::from_secs(10));
}
