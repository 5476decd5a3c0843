//! Repository identity and scan bookkeeping.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{FacadeError, Result};
use crate::id::document_id;

/// Group/name pair addressing a repository inside one backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryCoordinates {
    /// Project, organization or (nested) group path.
    pub group: String,
    /// Repository slug.
    pub name: String,
}

impl RepositoryCoordinates {
    /// Creates coordinates from a group and a name.
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Parses the coordinates out of a clone url.
    ///
    /// Accepts `ssh://git@host[:port]/group/name.git`, the scp-like
    /// `git@host:group/name.git` and `https://host/group/name.git`. The last
    /// path segment is the name; everything before it is the group, so
    /// nested GitLab groups are kept whole.
    ///
    /// # Example
    ///
    /// ```
    /// use facade_core::RepositoryCoordinates;
    ///
    /// let c = RepositoryCoordinates::from_ssh_url("ssh://git@gitlab.example.com:2222/platform/api/billing.git").unwrap();
    /// assert_eq!(c.group, "platform/api");
    /// assert_eq!(c.name, "billing");
    /// ```
    pub fn from_ssh_url(url: &str) -> Result<Self> {
        let url = url.trim();
        let path = match url.split_once("://") {
            Some((_, rest)) => rest.split_once('/').map(|(_, path)| path),
            None => url.split_once(':').map(|(_, path)| path),
        }
        .ok_or_else(|| FacadeError::invalid_argument(format!("malformed ssh url '{}'", url)))?;

        let path = path.trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        match path.rsplit_once('/') {
            Some((group, name)) if !group.is_empty() && !name.is_empty() => {
                Ok(Self::new(group, name))
            },
            _ => Err(FacadeError::invalid_argument(format!(
                "ssh url '{}' has no group/name path",
                url
            ))),
        }
    }
}

impl fmt::Display for RepositoryCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

/// A repository as seen by one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// `hash(vcsServiceId, group, name)`.
    pub id: String,
    /// Id of the backend instance that hosts the repository.
    pub vcs_service_id: String,
    pub group: String,
    pub name: String,
    pub ssh_url: String,
    pub web_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Repository {
    /// Creates a repository, deriving its id from the identifying fields.
    pub fn new(
        vcs_service_id: impl Into<String>,
        group: impl Into<String>,
        name: impl Into<String>,
        ssh_url: impl Into<String>,
        web_link: impl Into<String>,
    ) -> Self {
        let vcs_service_id = vcs_service_id.into();
        let group = group.into();
        let name = name.into();
        Self {
            id: Self::id_for(&vcs_service_id, &group, &name),
            vcs_service_id,
            group,
            name,
            ssh_url: ssh_url.into(),
            web_link: web_link.into(),
            avatar: None,
        }
    }

    /// Builder-style method to set the avatar.
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Computes the id of the repository with the given identity.
    pub fn id_for(vcs_service_id: &str, group: &str, name: &str) -> String {
        document_id(&[vcs_service_id, group, name])
    }

    /// Returns the group/name coordinates.
    pub fn coordinates(&self) -> RepositoryCoordinates {
        RepositoryCoordinates::new(&self.group, &self.name)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.vcs_service_id, self.group, self.name)
    }
}

/// Scan state of one indexed repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInfo {
    pub repository: Repository,
    pub scan_required: bool,
    pub last_scan_at: Option<DateTime<Utc>>,
}

impl RepositoryInfo {
    /// Creates the record for a repository seen for the first time.
    pub fn discovered(repository: Repository) -> Self {
        Self {
            repository,
            scan_required: true,
            last_scan_at: None,
        }
    }

    /// Marks the repository for a rescan.
    pub fn require_scan(mut self) -> Self {
        self.scan_required = true;
        self
    }

    /// Records a successful scan finished at `at`.
    pub fn scanned_at(mut self, at: DateTime<Utc>) -> Self {
        self.scan_required = false;
        self.last_scan_at = Some(at);
        self
    }
}

impl Document for RepositoryInfo {
    const FAMILY: &'static str = "repository_info";

    fn id(&self) -> &str {
        &self.repository.id
    }

    fn repository_id(&self) -> &str {
        &self.repository.id
    }
}
