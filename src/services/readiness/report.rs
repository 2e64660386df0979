use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::{Attempt, AttemptOutcome, PollSession, SessionOutcome};

/// Serializable view of a finished session
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub target: String,
    pub outcome: SessionOutcome,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub max_wait_ms: u64,
    pub retry_interval_ms: u64,
    pub attempt_timeout_ms: u64,
    pub attempt_count: usize,
    pub last_failure: Option<AttemptOutcome>,
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Debug, Serialize)]
pub struct AttemptRecord {
    pub number: u32,
    pub started_at: DateTime<Utc>,
    pub offset_ms: u64,
    pub duration_ms: u64,
    pub outcome: AttemptOutcome,
}

impl From<&Attempt> for AttemptRecord {
    fn from(attempt: &Attempt) -> Self {
        Self {
            number: attempt.number,
            started_at: attempt.started_at,
            offset_ms: attempt.offset.as_millis() as u64,
            duration_ms: attempt.duration.as_millis() as u64,
            outcome: attempt.outcome.clone(),
        }
    }
}

impl From<&PollSession> for SessionSummary {
    fn from(session: &PollSession) -> Self {
        Self {
            target: session.target.clone(),
            outcome: session.outcome,
            started_at: session.started_at,
            elapsed_ms: session.elapsed.as_millis() as u64,
            max_wait_ms: session.max_wait.as_millis() as u64,
            retry_interval_ms: session.retry_interval.as_millis() as u64,
            attempt_timeout_ms: session.attempt_timeout.as_millis() as u64,
            attempt_count: session.attempt_count(),
            last_failure: session.last_failure().cloned(),
            attempts: session.attempts.iter().map(AttemptRecord::from).collect(),
        }
    }
}

/// One-line result printed when the session ends
pub fn summary_line(session: &PollSession) -> String {
    let elapsed = session.elapsed.as_secs_f64();
    match session.outcome {
        SessionOutcome::Ready => format!(
            "{} is ready after {} attempt(s) in {:.1}s",
            session.target,
            session.attempt_count(),
            elapsed
        ),
        SessionOutcome::TimedOut => format!(
            "{} not ready: deadline of {:.1}s exceeded after {} attempt(s) in {:.1}s",
            session.target,
            session.max_wait.as_secs_f64(),
            session.attempt_count(),
            elapsed
        ),
    }
}

/// Attempt history, one line per attempt, for diagnosing a timeout
pub fn history_lines(session: &PollSession) -> Vec<String> {
    session
        .attempts
        .iter()
        .map(|a| {
            format!(
                "  #{:<3} {} +{:>7.2}s ({:>5}ms) {}",
                a.number,
                a.started_at.format("%H:%M:%S%.3f"),
                a.offset.as_secs_f64(),
                a.duration.as_millis(),
                a.outcome
            )
        })
        .collect()
}
