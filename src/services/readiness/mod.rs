pub mod types;
pub mod config;
pub mod probe;
pub mod poller;
pub mod report;

pub use types::*;
pub use config::*;
pub use probe::*;
pub use poller::*;
pub use report::*;
