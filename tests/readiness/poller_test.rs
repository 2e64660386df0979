use readiness_poller::services::readiness::{
    wait_until_ready, AttemptOutcome, ConfigError, PollConfig, ProbeOptions, ReadinessError, SessionOutcome,
    Target,
};
use std::time::Duration;

use crate::common::{refused_base_url, spawn_target, Behaviour};

// =============================================================================
// INTEGRATION TESTS - READINESS POLLER AGAINST A LIVE TARGET
// =============================================================================

fn config(max_wait_ms: u64, retry_interval_ms: u64) -> PollConfig {
    PollConfig::new(
        Duration::from_millis(max_wait_ms),
        Duration::from_millis(retry_interval_ms),
    )
    .expect("valid poll config")
}

fn health_target(base: &str) -> Target {
    Target::parse(base, "/health").expect("valid target")
}

#[tokio::test]
async fn test_ready_target_needs_one_attempt() {
    let server = spawn_target(Behaviour::Healthy).await;
    let target = health_target(&server.base_url());
    let config = config(5_000, 200);

    // Same answer on a second run against an already-ready target
    for _ in 0..2 {
        let session = wait_until_ready(&target, &config, &ProbeOptions::default())
            .await
            .expect("target should be ready");

        assert_eq!(session.outcome, SessionOutcome::Ready);
        assert_eq!(session.attempt_count(), 1);
        assert!(session.elapsed < Duration::from_millis(500));
    }

    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_becomes_ready_after_startup_errors() {
    let server = spawn_target(Behaviour::FailFirst(2)).await;
    let config = config(5_000, 200);

    let session = wait_until_ready(&health_target(&server.base_url()), &config, &ProbeOptions::default())
        .await
        .expect("target should become ready");

    assert_eq!(session.attempt_count(), 3);
    assert_eq!(session.attempts[0].outcome, AttemptOutcome::Status { status: 503 });
    assert_eq!(session.attempts[1].outcome, AttemptOutcome::Status { status: 503 });
    assert_eq!(session.attempts[2].outcome, AttemptOutcome::Ready { status: 200 });
    assert!(session.elapsed >= Duration::from_millis(400));
    assert!(session.elapsed <= config.max_wait + config.retry_interval);
    assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn test_refused_target_times_out() {
    let config = config(600, 200);

    let err = wait_until_ready(&health_target(&refused_base_url()), &config, &ProbeOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 1);
    let session = err.session().expect("timed out session");
    assert_eq!(session.outcome, SessionOutcome::TimedOut);
    assert!(session.attempt_count() >= 2);
    assert!(session.elapsed >= config.max_wait);
    assert!(session.elapsed < config.max_wait + config.retry_interval + config.attempt_timeout);
    assert!(session.attempts.iter().all(|a| !a.outcome.is_ready()));
}

#[tokio::test]
async fn test_hung_target_bounded_by_attempt_timeout() {
    let server = spawn_target(Behaviour::Slow(Duration::from_secs(5))).await;
    let config = config(1_000, 300).with_attempt_timeout(Duration::from_millis(100)).unwrap();

    let err = wait_until_ready(&health_target(&server.base_url()), &config, &ProbeOptions::default())
        .await
        .unwrap_err();

    let session = err.session().unwrap();
    assert!(session.attempts.iter().all(|a| a.outcome == AttemptOutcome::Timeout));
    assert!(session.attempts.iter().all(|a| a.duration < Duration::from_millis(300)));
    assert!(session.elapsed < Duration::from_millis(1_000 + 300 + 100));
}

#[tokio::test]
async fn test_client_error_never_counts_as_ready() {
    let server = spawn_target(Behaviour::AlwaysStatus(404)).await;

    let err = wait_until_ready(
        &health_target(&server.base_url()),
        &config(500, 200),
        &ProbeOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ReadinessError::TimedOut(_)));
    assert_eq!(
        err.session().unwrap().last_failure(),
        Some(&AttemptOutcome::Status { status: 404 })
    );
    assert!(err.to_string().contains("HTTP 404"));
}

#[tokio::test]
async fn test_zero_budget_makes_no_requests() {
    let server = spawn_target(Behaviour::Healthy).await;
    let config = PollConfig {
        max_wait: Duration::ZERO,
        retry_interval: Duration::from_millis(200),
        attempt_timeout: Duration::from_millis(100),
    };

    let err = wait_until_ready(&health_target(&server.base_url()), &config, &ProbeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReadinessError::Configuration(ConfigError::NonPositiveMaxWait(_))
    ));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(server.hits(), 0);
}
