pub mod config;
pub mod services;

pub use services::readiness::{
    wait_until_ready, PollConfig, PollSession, ProbeOptions, ReadinessError, ReadinessPoller, Target,
};
