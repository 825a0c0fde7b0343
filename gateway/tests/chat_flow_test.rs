use gateway::llm::MockCompletionService;
use gateway::{
    CompletionService, Gateway, GatewayConfig, GatewayError, Message, Role, UserId, estimate_tokens
};
use config::QuotaPolicy;
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

fn user(id: &str) -> UserId {
    id.parse().unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_third_request_in_window_is_rate_limited() {
    let mut config = base_config();
    config.limits.max_requests_per_minute = 2;
    let mock = Arc::new(MockCompletionService::with_default_response("fine"));
    let gateway = build(config, &mock);
    let alice = user("alice");

    assert_eq!(gateway.chat(&alice, "one").await.unwrap(), "fine");
    assert_eq!(gateway.chat(&alice, "two").await.unwrap(), "fine");
    let err = gateway.chat(&alice, "three").await.unwrap_err();

    assert_eq!(
        err,
        GatewayError::RateLimited {
            retry_after_secs: 60
        }
    );
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_window_slides() {
    let mut config = base_config();
    config.limits.max_requests_per_minute = 1;
    let mock = Arc::new(MockCompletionService::with_default_response("fine"));
    let gateway = build(config, &mock);
    let alice = user("alice");

    gateway.chat(&alice, "one").await.unwrap();
    tokio::time::advance(Duration::from_secs(45)).await;
    assert_eq!(
        gateway.chat(&alice, "two").await,
        Err(GatewayError::RateLimited {
            retry_after_secs: 15
        })
    );

    tokio::time::advance(Duration::from_secs(15)).await;
    assert!(gateway.chat(&alice, "two").await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_is_per_user() {
    let mut config = base_config();
    config.limits.max_requests_per_minute = 1;
    let mock = Arc::new(MockCompletionService::with_default_response("fine"));
    let gateway = build(config, &mock);

    assert!(gateway.chat(&user("alice"), "hi").await.is_ok());
    assert!(gateway.chat(&user("bob"), "hi there").await.is_ok());
    assert!(matches!(
        gateway.chat(&user("alice"), "again").await,
        Err(GatewayError::RateLimited { .. })
    ));
    assert_eq!(gateway.session_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_identical_prompt_within_ttl_is_served_from_cache() {
    let mock = Arc::new(MockCompletionService::with_default_response("Hi! How can I help?"));
    let gateway = build(base_config(), &mock);
    let alice = user("alice");

    let first = gateway.chat(&alice, "hello").await.unwrap();
    tokio::time::advance(Duration::from_secs(1)).await;
    let second = gateway.chat(&alice, "hello").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(mock.call_count(), 1);
    assert_eq!(mock.calls()[0].model, "m1");

    let stats = gateway.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cache_is_shared_across_users_and_skips_memory() {
    let mock = Arc::new(MockCompletionService::with_default_response("shared"));
    let gateway = build(base_config(), &mock);

    gateway.chat(&user("alice"), "hello").await.unwrap();
    assert_eq!(gateway.chat(&user("bob"), "hello").await.unwrap(), "shared");

    assert_eq!(mock.call_count(), 1);
    let bob = gateway.session_snapshot(&user("bob")).await.unwrap();
    assert!(bob.history.is_empty());
    assert_eq!(bob.token_usage, 0);
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_is_a_fresh_call() {
    let mock = Arc::new(MockCompletionService::with_default_response("answer"));
    let gateway = build(base_config(), &mock);
    let alice = user("alice");

    gateway.chat(&alice, "hello").await.unwrap();
    tokio::time::advance(Duration::from_secs(300)).await;
    gateway.chat(&alice, "hello").await.unwrap();

    assert_eq!(mock.call_count(), 2);
    assert_eq!(gateway.cache_stats().expirations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_prompt_is_rejected_before_upstream() {
    let mock = Arc::new(MockCompletionService::new());
    let gateway = build(base_config(), &mock);
    let prompt = "x".repeat(2000 * 4 + 1);

    let err = gateway.chat(&user("alice"), &prompt).await.unwrap_err();

    assert_eq!(
        err,
        GatewayError::InputTooLarge {
            tokens: 2001,
            max: 2000
        }
    );
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_context_ceiling_rejects_and_rolls_back() {
    let mut config = base_config();
    config.limits.max_memory_tokens = 50;
    config.limits.max_context_tokens = 50;
    let mock = Arc::new(MockCompletionService::new());
    let gateway = build(config, &mock);
    let alice = user("alice");

    // "user: " + 400 chars + "\n" + "assistant:" = 417 chars
    let err = gateway.chat(&alice, &"x".repeat(400)).await.unwrap_err();

    assert_eq!(
        err,
        GatewayError::ContextExceeded {
            tokens: 105,
            max: 50
        }
    );
    assert_eq!(mock.call_count(), 0);
    let snapshot = gateway.session_snapshot(&alice).await.unwrap();
    assert!(snapshot.history.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_memory_records_both_turns() {
    let mock = Arc::new(MockCompletionService::with_default_response("pong"));
    let gateway = build(base_config(), &mock);
    let alice = user("alice");

    gateway.chat(&alice, "ping").await.unwrap();
    gateway.chat(&alice, "ping again").await.unwrap();

    let snapshot = gateway.session_snapshot(&alice).await.unwrap();
    assert_eq!(
        snapshot.history,
        vec![
            Message::user("ping"),
            Message::assistant("pong"),
            Message::user("ping again"),
            Message::assistant("pong")
        ]
    );
    assert_eq!(
        mock.calls()[1].prompt,
        "user: ping\nassistant: pong\nuser: ping again\nassistant:"
    );
}

#[tokio::test(start_paused = true)]
async fn test_compaction_replaces_older_turns_with_summary() {
    let mut config = base_config();
    config.limits.max_memory_tokens = 60;
    let mock = Arc::new(MockCompletionService::with_default_response("ok"));
    mock.respond_when("Summarize the following conversation", "SUMMARY");
    let gateway = build(config, &mock);
    let alice = user("alice");
    let first = "a".repeat(200);
    let second = "b".repeat(200);

    gateway.chat(&alice, &first).await.unwrap();
    gateway.chat(&alice, &second).await.unwrap();

    let calls = mock.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[1].prompt.contains(&first));
    assert_eq!(calls[1].max_output_tokens, 256);
    assert_eq!(
        calls[2].prompt,
        format!("system: SUMMARY\nassistant: ok\nuser: {second}\nassistant:")
    );

    let snapshot = gateway.session_snapshot(&alice).await.unwrap();
    assert_eq!(snapshot.compactions, 1);
    assert_eq!(snapshot.history[0], Message::system("SUMMARY"));
    assert_eq!(snapshot.history[1], Message::assistant("ok"));
    assert_eq!(snapshot.history[2], Message::user(second));
    assert_eq!(snapshot.history[3].role, Role::Assistant);
    assert_eq!(snapshot.history.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_failed_summarization_fails_the_turn() {
    let mut config = base_config();
    config.limits.max_memory_tokens = 60;
    let mock = Arc::new(MockCompletionService::new());
    mock.push_response("ok");
    mock.push_failure("summarizer exploded");
    let gateway = build(config, &mock);
    let alice = user("alice");

    gateway.chat(&alice, &"a".repeat(200)).await.unwrap();
    let err = gateway.chat(&alice, &"b".repeat(200)).await.unwrap_err();

    assert!(matches!(err, GatewayError::Upstream { .. }));
    let snapshot = gateway.session_snapshot(&alice).await.unwrap();
    assert_eq!(snapshot.history.len(), 2);
    assert_eq!(snapshot.compactions, 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_quota_debits_then_denies() {
    let mut config = base_config();
    config.accounting.max_session_tokens = 100;
    let mock = Arc::new(MockCompletionService::with_default_response("ok"));
    let gateway = build(config, &mock);
    let alice = user("alice");
    let second = "b".repeat(200);

    // 217 rendered chars -> 55 tokens, plus 1 for "ok"
    gateway.chat(&alice, &"a".repeat(200)).await.unwrap();
    // 438 rendered chars -> 110 tokens, plus 1 for "ok"
    let err = gateway.chat(&alice, &second).await.unwrap_err();
    assert_eq!(err, GatewayError::SessionQuotaExceeded { used: 167, max: 100 });

    let snapshot = gateway.session_snapshot(&alice).await.unwrap();
    assert_eq!(snapshot.token_usage, 167);
    assert_eq!(snapshot.history.len(), 4);

    // Over budget: rejected before the cache is consulted.
    assert_eq!(
        gateway.chat(&alice, &second).await,
        Err(GatewayError::SessionQuotaExceeded { used: 167, max: 100 })
    );
    assert_eq!(mock.call_count(), 2);

    // Other users are unaffected and may still hit the cached answer.
    assert_eq!(gateway.chat(&user("bob"), &second).await.unwrap(), "ok");
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_check_before_call_rejects_without_spending() {
    let mut config = base_config();
    config.accounting.max_session_tokens = 100;
    config.accounting.quota_policy = QuotaPolicy::CheckBeforeCall;
    let mock = Arc::new(MockCompletionService::with_default_response("ok"));
    let gateway = build(config, &mock);
    let alice = user("alice");

    gateway.chat(&alice, &"a".repeat(200)).await.unwrap();
    let err = gateway.chat(&alice, &"b".repeat(200)).await.unwrap_err();

    assert_eq!(err, GatewayError::SessionQuotaExceeded { used: 56, max: 100 });
    assert_eq!(mock.call_count(), 1);
    let snapshot = gateway.session_snapshot(&alice).await.unwrap();
    assert_eq!(snapshot.token_usage, 56);
    assert_eq!(snapshot.history.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_call_rolls_back_user_message() {
    let mock = Arc::new(MockCompletionService::new());
    mock.push_failure("bad request");
    mock.set_default_response("second time lucky");
    let gateway = build(base_config(), &mock);
    let alice = user("alice");

    assert!(gateway.chat(&alice, "question").await.is_err());
    let snapshot = gateway.session_snapshot(&alice).await.unwrap();
    assert!(snapshot.history.is_empty());
    assert_eq!(snapshot.token_usage, 0);

    gateway.chat(&alice, "question").await.unwrap();
    let snapshot = gateway.session_snapshot(&alice).await.unwrap();
    assert_eq!(
        snapshot.history,
        vec![Message::user("question"), Message::assistant("second time lucky")]
    );
}

#[tokio::test]
async fn test_chat_as_rejects_blank_user_id() {
    let mock = Arc::new(MockCompletionService::new());
    let gateway = build(base_config(), &mock);

    assert!(matches!(
        gateway.chat_as("   ", "hi").await,
        Err(GatewayError::InvalidUserId { .. })
    ));
    assert_eq!(gateway.session_count(), 0);
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected_at_construction() {
    let mut config = base_config();
    config.limits.max_memory_tokens = 9000;
    let service: Arc<dyn CompletionService> = Arc::new(MockCompletionService::new());

    assert!(matches!(
        Gateway::new(config, service),
        Err(GatewayError::Configuration { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_oversized_prompt_reported_before_exhausted_budget() {
    let mut config = base_config();
    config.accounting.max_session_tokens = 100;
    let mock = Arc::new(MockCompletionService::with_default_response("ok"));
    let gateway = build(config, &mock);
    let alice = user("alice");

    gateway.chat(&alice, &"a".repeat(200)).await.unwrap();
    assert!(matches!(
        gateway.chat(&alice, &"b".repeat(200)).await,
        Err(GatewayError::SessionQuotaExceeded { .. })
    ));

    let err = gateway.chat(&alice, &"x".repeat(2000 * 4 + 1)).await.unwrap_err();
    assert_eq!(
        err,
        GatewayError::InputTooLarge {
            tokens: 2001,
            max: 2000
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_from_one_user_lose_no_updates() {
    let mut config = base_config();
    config.limits.max_requests_per_minute = 3;
    let mock = Arc::new(MockCompletionService::with_default_response("ok"));
    mock.set_latency(Duration::from_millis(50));
    let gateway = Arc::new(build(config, &mock));

    let mut handles = Vec::new();
    for i in 0..6 {
        let gateway = Arc::clone(&gateway);
        handles.push(tokio::spawn(async move {
            gateway.chat(&user("alice"), &format!("question {i}")).await
        }));
    }

    let mut admitted = 0;
    let mut rate_limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(text) => {
                assert_eq!(text, "ok");
                admitted += 1;
            }
            Err(GatewayError::RateLimited { .. }) => rate_limited += 1,
            Err(other) => panic!("unexpected error: {other:?}")
        }
    }
    assert_eq!(admitted, 3);
    assert_eq!(rate_limited, 3);

    let snapshot = gateway.session_snapshot(&user("alice")).await.unwrap();
    assert_eq!(snapshot.requests_in_window, 3);
    assert_eq!(snapshot.history.len(), 6);
    let user_turns = snapshot.history.iter().filter(|m| m.role == Role::User).count();
    assert_eq!(user_turns, 3);

    // Every debit landed: usage is the sum over the prompts actually sent.
    let expected: usize = mock
        .calls()
        .iter()
        .map(|call| estimate_tokens(&call.prompt) + estimate_tokens("ok"))
        .sum();
    assert_eq!(mock.call_count(), 3);
    assert_eq!(snapshot.token_usage, expected);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_users_do_not_interfere() {
    let mock = Arc::new(MockCompletionService::new());
    mock.set_latency(Duration::from_millis(50));
    let gateway = Arc::new(build(base_config(), &mock));

    let mut handles = Vec::new();
    for i in 0..8 {
        let gateway = Arc::clone(&gateway);
        handles.push(tokio::spawn(async move {
            let id = user(&format!("user-{i}"));
            gateway.chat(&id, &format!("prompt {i}")).await
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let text = handle.await.unwrap().unwrap();
        assert!(text.ends_with(&format!("prompt {i}\nassistant:")));
    }

    assert_eq!(gateway.session_count(), 8);
    assert_eq!(mock.call_count(), 8);
}
