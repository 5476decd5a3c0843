//! Provider adapters.
//!
//! Each adapter implements [`VcsClient`] over one provider's REST API.

pub mod bitbucket;
pub mod gitea;
pub mod gitlab;
pub mod http;

use std::sync::Arc;

use facade_core::Result;

use crate::client::{BackendKind, VcsClient};
use crate::registry::BackendConfig;

pub use bitbucket::BitbucketClient;
pub use gitea::GiteaClient;
pub use gitlab::GitlabClient;
pub use http::HttpApi;

/// Builds the adapter matching a backend entry's kind.
pub fn build_client(config: &BackendConfig) -> Result<Arc<dyn VcsClient>> {
    let client: Arc<dyn VcsClient> = match config.kind {
        BackendKind::Bitbucket => Arc::new(BitbucketClient::new(config)?),
        BackendKind::Gitea => Arc::new(GiteaClient::new(config)?),
        BackendKind::Gitlab => Arc::new(GitlabClient::new(config)?),
    };
    Ok(client)
}
