//! Normalized webhook events.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use facade_core::{FacadeError, RefType, RepositoryCoordinates, Result};

/// Case-insensitive view over the headers of a webhook delivery.
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    headers: HashMap<String, String>,
}

impl WebhookHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style method to add a header.
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for WebhookHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value);
        }
        headers
    }
}

/// A provider-independent change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookEvent {
    /// A branch or tag was created.
    RefCreated {
        coordinates: RepositoryCoordinates,
        ref_type: RefType,
        name: String,
    },
    /// A branch or tag was deleted.
    RefDeleted {
        coordinates: RepositoryCoordinates,
        ref_type: RefType,
        name: String,
    },
    /// Commits were pushed.
    Pushed {
        coordinates: RepositoryCoordinates,
        commit_ids: Vec<String>,
    },
    /// A pull request was opened, updated, reviewed or closed.
    PullRequestChanged {
        coordinates: RepositoryCoordinates,
        index: u64,
    },
}

impl WebhookEvent {
    /// Repository the event belongs to.
    pub fn coordinates(&self) -> &RepositoryCoordinates {
        match self {
            Self::RefCreated { coordinates, .. }
            | Self::RefDeleted { coordinates, .. }
            | Self::Pushed { coordinates, .. }
            | Self::PullRequestChanged { coordinates, .. } => coordinates,
        }
    }

    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RefCreated { .. } => "ref_created",
            Self::RefDeleted { .. } => "ref_deleted",
            Self::Pushed { .. } => "pushed",
            Self::PullRequestChanged { .. } => "pull_request_changed",
        }
    }
}

/// Parses a webhook body, mapping malformed payloads to `InvalidArgument`.
pub(crate) fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| FacadeError::invalid_argument(format!("malformed webhook payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_case_insensitive() {
        let headers = WebhookHeaders::new().with("X-Gitea-Event", "push");
        assert_eq!(headers.get("x-gitea-event"), Some("push"));
        assert_eq!(headers.get("X-GITEA-EVENT"), Some("push"));
        assert_eq!(headers.get("X-Gitlab-Event"), None);
    }

    #[test]
    fn test_headers_from_iterator() {
        let headers: WebhookHeaders = [("X-Event-Key", "pr:opened")].into_iter().collect();
        assert_eq!(headers.get("x-event-key"), Some("pr:opened"));
    }

    #[test]
    fn test_event_accessors() {
        let event = WebhookEvent::Pushed {
            coordinates: RepositoryCoordinates::new("team", "service"),
            commit_ids: vec!["abc".to_string()],
        };
        assert_eq!(event.coordinates().to_string(), "team/service");
        assert_eq!(event.label(), "pushed");
    }

    #[test]
    fn test_malformed_body_is_invalid_argument() {
        let err = parse_body::<serde_json::Value>(b"{not json").unwrap_err();
        assert!(matches!(err, FacadeError::InvalidArgument(_)));
    }
}
