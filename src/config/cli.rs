use clap::{ArgAction, Parser, ValueEnum};

use crate::services::readiness::{
    ConfigError, PollConfig, ProbeAuth, ProbeMethod, ProbeOptions, Target, DEFAULT_MAX_WAIT_SECS,
    DEFAULT_RETRY_INTERVAL_SECS,
};

pub const DEFAULT_HEALTH_PATH: &str = "/";
pub const DEFAULT_LOG_FILTER: &str = "readiness_poller=info";
/// Keeps the per-attempt progress lines on under any `RUST_LOG`
pub const PROGRESS_DIRECTIVE: &str = "readiness_poller::progress=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Get,
    Head,
}

impl From<MethodArg> for ProbeMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Get => ProbeMethod::Get,
            MethodArg::Head => ProbeMethod::Head,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Wait for a service's health check to pass before continuing a pipeline.
///
/// Exits 0 once the target answers with a 2xx status, 1 when the deadline
/// passes first and 2 on invalid configuration.
#[derive(Debug, Parser)]
#[command(name = "readiness-poller", version)]
pub struct Cli {
    /// Base address of the service, e.g. http://localhost:8080
    #[arg(env = "READINESS_TARGET")]
    pub target: Option<String>,

    /// Health-check path appended to the base address
    #[arg(long, env = "READINESS_HEALTH_PATH", default_value = DEFAULT_HEALTH_PATH)]
    pub health_path: String,

    /// Total seconds to wait for readiness
    #[arg(
        long,
        env = "READINESS_MAX_WAIT",
        value_name = "SECS",
        default_value_t = DEFAULT_MAX_WAIT_SECS,
        allow_negative_numbers = true
    )]
    pub max_wait: f64,

    /// Seconds between attempts
    #[arg(
        long,
        env = "READINESS_RETRY_INTERVAL",
        value_name = "SECS",
        default_value_t = DEFAULT_RETRY_INTERVAL_SECS,
        allow_negative_numbers = true
    )]
    pub retry_interval: f64,

    /// Seconds allowed per attempt; must be below the retry interval.
    /// Defaults to half the retry interval, at most 2
    #[arg(long, env = "READINESS_ATTEMPT_TIMEOUT", value_name = "SECS", allow_negative_numbers = true)]
    pub attempt_timeout: Option<f64>,

    /// HTTP method used for the health check
    #[arg(long, value_enum, default_value_t = MethodArg::Get)]
    pub method: MethodArg,

    /// Only count a 2xx response as ready when its body contains this text
    #[arg(long, value_name = "TEXT")]
    pub expect_body: Option<String>,

    /// User for HTTP basic authentication
    #[arg(long, env = "READINESS_USER")]
    pub user: Option<String>,

    /// Password for HTTP basic authentication
    #[arg(long, env = "READINESS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Bearer token
    #[arg(long, env = "READINESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Format of the final summary
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Only log warnings and errors; drops the per-attempt progress lines
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Validated inputs for one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub target: Target,
    pub poll: PollConfig,
    pub probe: ProbeOptions,
    pub output: OutputFormat,
}

impl Cli {
    /// Filter directives for the log subscriber.
    ///
    /// `-q`/`-v` replace `rust_log`. Otherwise `rust_log` (or the default)
    /// applies, and the progress lines are switched back on whatever it says.
    pub fn log_directives(&self, rust_log: Option<&str>) -> String {
        if self.quiet {
            return "readiness_poller=warn".to_string();
        }
        match self.verbose {
            0 => {
                let base = rust_log
                    .map(str::trim)
                    .filter(|directives| !directives.is_empty())
                    .unwrap_or(DEFAULT_LOG_FILTER);
                format!("{},{}", base, PROGRESS_DIRECTIVE)
            }
            1 => "readiness_poller=debug".to_string(),
            _ => "readiness_poller=trace,reqwest=debug".to_string(),
        }
    }

    /// Validate the parsed arguments into `Settings`
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let address = self.target.ok_or(ConfigError::MissingTarget)?;
        let target = Target::parse(&address, &self.health_path)?;

        let poll = PollConfig::from_secs(self.max_wait, self.retry_interval, self.attempt_timeout)?;

        let auth = match (self.user, self.password, self.token) {
            (Some(_), _, Some(_)) => return Err(ConfigError::ConflictingAuth),
            (None, Some(_), _) => return Err(ConfigError::PasswordWithoutUser),
            (Some(username), password, None) => Some(ProbeAuth::Basic { username, password }),
            (None, None, Some(token)) => Some(ProbeAuth::Bearer { token }),
            (None, None, None) => None,
        };

        let probe = ProbeOptions {
            method: self.method.into(),
            expect_body: self.expect_body,
            auth,
        };
        probe.validate()?;

        Ok(Settings {
            target,
            poll,
            probe,
            output: self.output,
        })
    }
}
