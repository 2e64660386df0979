use async_trait::async_trait;
use reqwest::{Client, Method};
use std::error::Error as StdError;
use std::time::Duration;

use super::types::{AttemptOutcome, ConfigError, Target};

const USER_AGENT: &str = concat!("readiness-poller/", env!("CARGO_PKG_VERSION"));

/// A single readiness check against a target.
///
/// Implementations never fail: every problem is reported as a non-ready
/// `AttemptOutcome` so the poller can keep retrying.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &Target) -> AttemptOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMethod {
    #[default]
    Get,
    Head,
}

impl ProbeMethod {
    fn as_method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Head => Method::HEAD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeAuth {
    Basic { username: String, password: Option<String> },
    Bearer { token: String },
}

/// Request shape used by `HttpProbe`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOptions {
    pub method: ProbeMethod,
    /// Text that must appear in a 2xx body for the target to count as ready
    pub expect_body: Option<String>,
    pub auth: Option<ProbeAuth>,
}

impl ProbeOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.expect_body.is_some() && self.method == ProbeMethod::Head {
            return Err(ConfigError::BodyCheckRequiresGet);
        }
        Ok(())
    }
}

/// HTTP health-check probe
pub struct HttpProbe {
    client: Client,
    options: ProbeOptions,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(options: ProbeOptions, timeout: Duration) -> Result<Self, ConfigError> {
        options.validate()?;

        // No idle pool: each attempt's connection is dropped once the probe returns
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(0)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self {
            client,
            options,
            timeout,
        })
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, target: &Target) -> AttemptOutcome {
        let mut request = self
            .client
            .request(self.options.method.as_method(), target.url().clone())
            .timeout(self.timeout);

        if let Some(auth) = &self.options.auth {
            request = match auth {
                ProbeAuth::Basic { username, password } => request.basic_auth(username, password.as_ref()),
                ProbeAuth::Bearer { token } => request.bearer_auth(token),
            };
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => return classify_error(&e),
        };

        let status = response.status();
        tracing::debug!("{} answered HTTP {}", target, status.as_u16());

        if !status.is_success() {
            return AttemptOutcome::Status {
                status: status.as_u16(),
            };
        }

        let Some(needle) = &self.options.expect_body else {
            return AttemptOutcome::Ready {
                status: status.as_u16(),
            };
        };

        match response.text().await {
            Ok(body) if body.contains(needle.as_str()) => AttemptOutcome::Ready {
                status: status.as_u16(),
            },
            Ok(_) => AttemptOutcome::BodyMismatch {
                status: status.as_u16(),
            },
            Err(e) => classify_error(&e),
        }
    }
}

/// Map a reqwest failure onto a not-ready outcome
pub fn classify_error(error: &reqwest::Error) -> AttemptOutcome {
    if error.is_timeout() {
        return AttemptOutcome::Timeout;
    }

    if error.is_connect() {
        if is_connection_refused(error) {
            return AttemptOutcome::ConnectionRefused;
        }
        return AttemptOutcome::Transport {
            reason: error_chain(error),
        };
    }

    if error.is_body() || error.is_decode() {
        return AttemptOutcome::MalformedResponse {
            reason: error_chain(error),
        };
    }

    if error.is_builder() {
        return AttemptOutcome::ProbeError {
            reason: error_chain(error),
        };
    }

    AttemptOutcome::Transport {
        reason: error_chain(error),
    }
}

fn is_connection_refused(error: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = err.source();
    }
    false
}

/// Flatten an error and its sources into one line
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        let text = err.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = err.source();
    }
    message
}
