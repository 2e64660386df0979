use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::config::MIN_RETRY_INTERVAL;

pub const EXIT_READY: u8 = 0;
pub const EXIT_TIMED_OUT: u8 = 1;
pub const EXIT_CONFIGURATION_ERROR: u8 = 2;

/// Network endpoint probed for readiness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    health_path: String,
    url: Url,
}

impl Target {
    /// Parse a base address and health-check path.
    ///
    /// A bare `host:port` is treated as `http://host:port`. The health path is
    /// appended to any path prefix already present on the base address.
    pub fn parse(base: &str, health_path: &str) -> Result<Self, ConfigError> {
        let trimmed = base.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidTarget {
                target: base.to_string(),
                reason: "address is empty".to_string(),
            });
        }

        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let base_url = Url::parse(&candidate).map_err(|e| ConfigError::InvalidTarget {
            target: base.to_string(),
            reason: e.to_string(),
        })?;

        match base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::InvalidTarget {
                    target: base.to_string(),
                    reason: format!("unsupported scheme '{}'", other),
                })
            }
        }

        match base_url.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => return Err(ConfigError::EmptyHost(base.to_string())),
        }

        let health_path = normalize_health_path(health_path);
        let (path, query) = match health_path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (health_path.as_str(), None),
        };

        let joined = format!("{}{}", base_url.path().trim_end_matches('/'), path);
        let mut url = base_url;
        url.set_path(&joined);
        url.set_query(query);
        url.set_fragment(None);

        Ok(Self { health_path, url })
    }

    pub fn health_path(&self) -> &str {
        &self.health_path
    }

    /// Full URL requested on every attempt
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

fn normalize_health_path(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Result of a single probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Ready { status: u16 },
    ConnectionRefused,
    Timeout,
    Transport { reason: String },
    Status { status: u16 },
    BodyMismatch { status: u16 },
    MalformedResponse { reason: String },
    ProbeError { reason: String },
}

impl AttemptOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready { status } => write!(f, "ready (HTTP {})", status),
            Self::ConnectionRefused => write!(f, "connection refused"),
            Self::Timeout => write!(f, "attempt timed out"),
            Self::Transport { reason } => write!(f, "transport error: {}", reason),
            Self::Status { status } => write!(f, "HTTP {}", status),
            Self::BodyMismatch { status } => {
                write!(f, "HTTP {} without expected body text", status)
            }
            Self::MalformedResponse { reason } => write!(f, "malformed response: {}", reason),
            Self::ProbeError { reason } => write!(f, "probe error: {}", reason),
        }
    }
}

/// One probe against the target
#[derive(Debug, Clone)]
pub struct Attempt {
    /// 1-based position in the session
    pub number: u32,
    pub started_at: DateTime<Utc>,
    /// Time since the session started when the probe was issued
    pub offset: Duration,
    pub duration: Duration,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Ready,
    TimedOut,
}

/// The bounded sequence of attempts made by one `wait_until_ready` call
#[derive(Debug, Clone)]
pub struct PollSession {
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub max_wait: Duration,
    pub retry_interval: Duration,
    pub attempt_timeout: Duration,
    pub attempts: Vec<Attempt>,
    pub elapsed: Duration,
    pub outcome: SessionOutcome,
}

impl PollSession {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Most recent non-ready outcome, if any
    pub fn last_failure(&self) -> Option<&AttemptOutcome> {
        self.attempts
            .iter()
            .rev()
            .map(|a| &a.outcome)
            .find(|o| !o.is_ready())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },
    #[error("Target '{0}' has no host")]
    EmptyHost(String),
    #[error("No target given (pass an address or set READINESS_TARGET)")]
    MissingTarget,
    #[error("Maximum wait must be strictly positive (got {0}s)")]
    NonPositiveMaxWait(f64),
    #[error("Retry interval must be strictly positive (got {0}s)")]
    NonPositiveRetryInterval(f64),
    #[error("Attempt timeout must be strictly positive (got {0}s)")]
    NonPositiveAttemptTimeout(f64),
    #[error("{name} of {secs}s is out of range")]
    OutOfRange { name: &'static str, secs: f64 },
    #[error("Retry interval ({0:?}) must be at least {min:?}", min = MIN_RETRY_INTERVAL)]
    RetryIntervalTooShort(Duration),
    #[error("Attempt timeout ({attempt_timeout:?}) must be shorter than the retry interval ({retry_interval:?})")]
    AttemptTimeoutTooLong {
        attempt_timeout: Duration,
        retry_interval: Duration,
    },
    #[error("A body check requires GET requests")]
    BodyCheckRequiresGet,
    #[error("Password supplied without a user")]
    PasswordWithoutUser,
    #[error("Basic and bearer authentication are mutually exclusive")]
    ConflictingAuth,
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ReadinessError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("{}", timed_out_message(.0))]
    TimedOut(Box<PollSession>),
}

impl ReadinessError {
    /// Process exit status reported to the pipeline
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => EXIT_CONFIGURATION_ERROR,
            Self::TimedOut(_) => EXIT_TIMED_OUT,
        }
    }

    pub fn session(&self) -> Option<&PollSession> {
        match self {
            Self::TimedOut(session) => Some(session.as_ref()),
            Self::Configuration(_) => None,
        }
    }
}

fn timed_out_message(session: &PollSession) -> String {
    let mut message = format!(
        "Timed out after {:.1}s waiting for {} ({} attempts)",
        session.elapsed.as_secs_f64(),
        session.target,
        session.attempt_count()
    );
    if let Some(last) = session.last_failure() {
        message.push_str(&format!(", last failure: {}", last));
    }
    message
}
