mod service;
mod sweeper;

pub use service::{PurgeStats, SessionService, SessionToken};
pub use sweeper::run_sweeper;
