use chrono::Utc;
use tokio::time::Instant;

use super::config::PollConfig;
use super::probe::{HttpProbe, Probe, ProbeOptions};
use super::types::{Attempt, AttemptOutcome, PollSession, ReadinessError, SessionOutcome, Target};

/// Log target of the per-attempt progress lines
pub const PROGRESS_TARGET: &str = "readiness_poller::progress";

/// Blocks until a target answers its health check or the time budget runs out
pub struct ReadinessPoller<P = HttpProbe> {
    probe: P,
    config: PollConfig,
}

impl<P: Probe> ReadinessPoller<P> {
    pub fn new(probe: P, config: PollConfig) -> Self {
        Self { probe, config }
    }

    /// Probe `target` until it is ready.
    ///
    /// Returns the session on the first successful attempt. Once `max_wait` has
    /// elapsed without success the session is returned inside
    /// `ReadinessError::TimedOut`. Configuration is validated before any probe
    /// is issued.
    pub async fn wait_until_ready(&self, target: &Target) -> Result<PollSession, ReadinessError> {
        self.config.validate()?;

        let config = &self.config;
        if config.retry_interval > config.max_wait {
            tracing::warn!(
                "Retry interval {:?} exceeds maximum wait {:?}; only one attempt will be made",
                config.retry_interval,
                config.max_wait
            );
        }

        tracing::info!(
            "Waiting up to {:.1}s for {} (retry every {:.1}s, attempt timeout {:.1}s, at most {} attempts)",
            config.max_wait.as_secs_f64(),
            target,
            config.retry_interval.as_secs_f64(),
            config.attempt_timeout.as_secs_f64(),
            config.max_attempts()
        );

        let started_at = Utc::now();
        let start = Instant::now();
        let mut attempts: Vec<Attempt> = Vec::new();

        loop {
            let number = attempts.len() as u32 + 1;
            let attempt = self.attempt(target, number, start).await;
            let elapsed = start.elapsed();

            if attempt.outcome.is_ready() {
                tracing::info!(
                    target: PROGRESS_TARGET,
                    "Attempt {} ({:.1}s elapsed): {}",
                    number,
                    elapsed.as_secs_f64(),
                    attempt.outcome
                );
                attempts.push(attempt);
                return Ok(self.session(target, started_at, attempts, elapsed, SessionOutcome::Ready));
            }

            tracing::info!(
                target: PROGRESS_TARGET,
                "Attempt {} ({:.1}s elapsed): not ready, {}",
                number,
                elapsed.as_secs_f64(),
                attempt.outcome
            );
            attempts.push(attempt);

            // Never sleep past the deadline
            let remaining = config.max_wait.saturating_sub(elapsed);
            tokio::time::sleep(config.retry_interval.min(remaining)).await;

            let elapsed = start.elapsed();
            if elapsed >= config.max_wait {
                let session = self.session(target, started_at, attempts, elapsed, SessionOutcome::TimedOut);
                return Err(ReadinessError::TimedOut(Box::new(session)));
            }
        }
    }

    async fn attempt(&self, target: &Target, number: u32, session_start: Instant) -> Attempt {
        let started_at = Utc::now();
        let attempt_start = Instant::now();

        let outcome = match tokio::time::timeout(self.config.attempt_timeout, self.probe.probe(target)).await {
            Ok(outcome) => outcome,
            Err(_) => AttemptOutcome::Timeout,
        };

        Attempt {
            number,
            started_at,
            offset: attempt_start.duration_since(session_start),
            duration: attempt_start.elapsed(),
            outcome,
        }
    }

    fn session(
        &self,
        target: &Target,
        started_at: chrono::DateTime<Utc>,
        attempts: Vec<Attempt>,
        elapsed: std::time::Duration,
        outcome: SessionOutcome,
    ) -> PollSession {
        PollSession {
            target: target.to_string(),
            started_at,
            max_wait: self.config.max_wait,
            retry_interval: self.config.retry_interval,
            attempt_timeout: self.config.attempt_timeout,
            attempts,
            elapsed,
            outcome,
        }
    }
}

/// Wait for `target` using an HTTP probe built from `options`
pub async fn wait_until_ready(
    target: &Target,
    config: &PollConfig,
    options: &ProbeOptions,
) -> Result<PollSession, ReadinessError> {
    config.validate()?;
    let probe = HttpProbe::new(options.clone(), config.attempt_timeout)?;
    ReadinessPoller::new(probe, config.clone()).wait_until_ready(target).await
}
