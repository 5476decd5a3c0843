//! # VCS Facade Server
//!
//! HTTP gateway over the configured VCS backends: commit-range and issue
//! queries served through the deferred-result job protocol, webhook
//! ingestion into the search index, and admin endpoints over the sync
//! engine.

pub mod cache;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod job;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod settings;
pub mod signature;
pub mod state;

pub use error::AppError;
pub use job::{JobExecutor, JobSettings};
pub use server::{API_PREFIX, create_router, run_server};
pub use settings::Settings;
pub use state::AppState;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
