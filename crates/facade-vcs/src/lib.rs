//! # VCS Facade Backends
//!
//! Provider adapters for Bitbucket Server, Gitea and GitLab behind one
//! async [`VcsClient`] trait, plus the commit-range resolver that works on
//! top of it.
//!
//! ## Features
//!
//! - Uniform repository, ref, commit and pull-request operations
//! - Native or graph-walk commit ranges, chosen per backend
//! - Webhook payload normalization into [`WebhookEvent`]s
//! - Ssh-url routing across several backend instances
//!
//! ## Example
//!
//! ```ignore
//! use facade_vcs::{BackendRegistry, RangeQuery, RangeResolver};
//!
//! let registry = BackendRegistry::from_configs(&configs)?;
//! let backend = registry.resolve("ssh://git@gitea.example.com/team/service.git")?;
//! let repo = backend.client.get_repository(&coordinates).await?;
//!
//! let query = RangeQuery::to("main").from_ref("v1.0");
//! let commits = RangeResolver::new(backend.client.as_ref()).resolve(&repo, &query).await?;
//! ```

pub mod adapters;
pub mod client;
pub mod range;
pub mod registry;
pub mod webhook;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adapters::{BitbucketClient, GiteaClient, GitlabClient, build_client};
pub use client::{BackendKind, NewPullRequest, VcsClient};
pub use range::{CommitGraph, RangeQuery, RangeResolver, RangeStart, RangeStrategy};
pub use registry::{Backend, BackendConfig, BackendRegistry};
pub use webhook::{WebhookEvent, WebhookHeaders};

pub use facade_core;
