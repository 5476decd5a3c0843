//! Backend configuration and ssh-url routing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use facade_core::{FacadeError, Result};

use crate::adapters::build_client;
use crate::client::{BackendKind, VcsClient};

/// One configured backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend id, stamped as `vcsServiceId` on its repositories.
    pub id: String,

    pub kind: BackendKind,

    /// Base url of the provider API.
    pub url: String,

    /// Glob matched against ssh urls to route requests to this backend.
    pub ssh_url_pattern: String,

    /// API token.
    #[serde(default, skip_serializing)]
    pub token: String,

    /// Shared secret for webhook HMAC signatures. Unset disables checking.
    #[serde(default, skip_serializing)]
    pub webhook_secret: Option<String>,

    /// Maximum commits loaded for a graph-walk range.
    #[serde(default = "default_graph_depth")]
    pub graph_depth: usize,

    /// Page size for listing calls.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_graph_depth() -> usize {
    100
}

fn default_page_size() -> u32 {
    50
}

impl BackendConfig {
    /// Creates an entry with default depth and page size.
    pub fn new(
        id: impl Into<String>,
        kind: BackendKind,
        url: impl Into<String>,
        ssh_url_pattern: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            url: url.into(),
            ssh_url_pattern: ssh_url_pattern.into(),
            token: String::new(),
            webhook_secret: None,
            graph_depth: default_graph_depth(),
            page_size: default_page_size(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    pub fn with_graph_depth(mut self, depth: usize) -> Self {
        self.graph_depth = depth;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Checks the entry before an adapter is built from it.
    ///
    /// # Errors
    ///
    /// Returns `FacadeError::InvalidArgument` if `page_size` or
    /// `graph_depth` is zero; paging loops end on a short page and would
    /// never terminate.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(FacadeError::invalid_argument(format!(
                "backend '{}': page_size must be at least 1",
                self.id
            )));
        }
        if self.graph_depth == 0 {
            return Err(FacadeError::invalid_argument(format!(
                "backend '{}': graph_depth must be at least 1",
                self.id
            )));
        }
        Ok(())
    }
}

/// A registered backend: its client plus routing data.
#[derive(Clone)]
pub struct Backend {
    pub id: String,
    pattern: glob::Pattern,
    pub client: Arc<dyn VcsClient>,
    pub webhook_secret: Option<String>,
}

impl Backend {
    /// Creates a backend routing urls matching `ssh_url_pattern` to `client`.
    ///
    /// # Errors
    ///
    /// Returns `FacadeError::InvalidArgument` if the pattern is not a valid glob.
    pub fn new(
        client: Arc<dyn VcsClient>,
        ssh_url_pattern: &str,
        webhook_secret: Option<String>,
    ) -> Result<Self> {
        let pattern = glob::Pattern::new(ssh_url_pattern).map_err(|e| {
            FacadeError::invalid_argument(format!(
                "invalid ssh url pattern '{}' for backend '{}': {}",
                ssh_url_pattern,
                client.service_id(),
                e
            ))
        })?;
        Ok(Self {
            id: client.service_id().to_string(),
            pattern,
            client,
            webhook_secret,
        })
    }

    /// Returns true if this backend serves `ssh_url`.
    pub fn matches(&self, ssh_url: &str) -> bool {
        self.pattern.matches(ssh_url.trim())
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("id", &self.id)
            .field("pattern", &self.pattern.as_str())
            .field("kind", &self.client.kind())
            .finish()
    }
}

/// Ordered set of backends. The first backend whose pattern matches wins.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: Vec<Backend>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry, creating one adapter per entry.
    ///
    /// # Errors
    ///
    /// Returns `FacadeError::InvalidArgument` on duplicate ids, bad patterns,
    /// zero page sizes or unusable credentials.
    pub fn from_configs(configs: &[BackendConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            let client = build_client(config)?;
            registry.register(Backend::new(
                client,
                &config.ssh_url_pattern,
                config.webhook_secret.clone(),
            )?)?;
            info!(
                backend = %config.id,
                kind = %config.kind,
                pattern = %config.ssh_url_pattern,
                "Registered VCS backend"
            );
        }
        Ok(registry)
    }

    /// Adds a backend.
    ///
    /// # Errors
    ///
    /// Returns `FacadeError::InvalidArgument` if the id is already registered.
    pub fn register(&mut self, backend: Backend) -> Result<()> {
        if self.backends.iter().any(|b| b.id == backend.id) {
            return Err(FacadeError::invalid_argument(format!(
                "duplicate backend id '{}'",
                backend.id
            )));
        }
        self.backends.push(backend);
        Ok(())
    }

    /// Finds the backend serving `ssh_url`.
    ///
    /// # Errors
    ///
    /// Returns `FacadeError::NotFound` if no pattern matches.
    pub fn resolve(&self, ssh_url: &str) -> Result<&Backend> {
        self.backends
            .iter()
            .find(|b| b.matches(ssh_url))
            .ok_or_else(|| FacadeError::not_found(format!("no backend serves '{}'", ssh_url)))
    }

    /// Finds a backend by id.
    ///
    /// # Errors
    ///
    /// Returns `FacadeError::NotFound` for an unknown id.
    pub fn by_service_id(&self, id: &str) -> Result<&Backend> {
        self.backends
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| FacadeError::not_found(format!("backend '{}'", id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Backend> {
        self.backends.iter()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
