//! # VCS Facade Index
//!
//! Keeps a searchable index of repositories, refs, commits and pull
//! requests consistent with the live backends.
//!
//! Two write paths feed the index:
//!
//! - [`WebhookIngestor`] applies webhook events as targeted upserts and
//!   deletes.
//! - [`Scanner`] reconciles one repository at a time: orphans are deleted
//!   by id-set difference and every live document is upserted. Scans are
//!   queued on a [`ScanExecutor`] by the leader-gated [`SyncScheduler`].

pub mod executor;
pub mod ingest;
pub mod leadership;
pub mod scanner;
pub mod scheduler;
pub mod store;

pub use executor::{ExecutorSettings, ScanExecutor, ScanTicket};
pub use ingest::WebhookIngestor;
pub use leadership::{HostnameLeadership, Leadership, StaticLeadership};
pub use scanner::{FamilyReport, ScanReport, ScanSettings, Scanner};
pub use scheduler::{RescanSummary, SchedulerHandle, SyncScheduler};
pub use store::{
    DocumentStore, InMemoryDocumentStore, IndexStore, IssueReferences, collect_all, collect_ids,
};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
