//! Indexed document abstraction.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::issue::issue_keys;

/// An entity stored in the search index.
///
/// Documents are keyed by a deterministic id and grouped by the repository
/// they belong to so that a whole repository can be torn down at once.
pub trait Document: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Collection name, used in logs and metrics.
    const FAMILY: &'static str;

    /// Deterministic document id.
    fn id(&self) -> &str;

    /// Id of the owning repository.
    fn repository_id(&self) -> &str;

    /// Free text scanned for issue keys.
    fn searchable_text(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Returns true if any searchable field mentions `key`.
    fn mentions_issue(&self, key: &str) -> bool {
        self.searchable_text()
            .into_iter()
            .any(|text| issue_keys(text).iter().any(|k| k == key))
    }
}
