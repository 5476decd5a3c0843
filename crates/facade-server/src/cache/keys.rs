//! Cache key generation and normalization.

use std::fmt;

use facade_core::RepositoryCoordinates;

/// Key unica para el cache de repositorios.
/// Normaliza group/name a lowercase para consistencia.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryKey {
    vcs_service_id: String,
    group: String,
    name: String,
}

impl RepositoryKey {
    /// Crea una nueva key normalizando group y name a lowercase.
    ///
    /// # Examples
    ///
    /// ```
    /// use facade_core::RepositoryCoordinates;
    /// use facade_server::cache::RepositoryKey;
    ///
    /// let key = RepositoryKey::new("gitea", &RepositoryCoordinates::new("Platform", "Billing"));
    /// assert_eq!(key.to_string(), "gitea:platform/billing");
    /// ```
    pub fn new(vcs_service_id: impl Into<String>, coordinates: &RepositoryCoordinates) -> Self {
        Self {
            vcs_service_id: vcs_service_id.into(),
            group: coordinates.group.to_lowercase(),
            name: coordinates.name.to_lowercase(),
        }
    }

    /// Retorna el id del backend.
    pub fn vcs_service_id(&self) -> &str {
        &self.vcs_service_id
    }
}

impl fmt::Display for RepositoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.vcs_service_id, self.group, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalization() {
        let key1 = RepositoryKey::new("gitea", &RepositoryCoordinates::new("Team", "Service"));
        let key2 = RepositoryKey::new("gitea", &RepositoryCoordinates::new("team", "service"));

        assert_eq!(key1, key2);
        assert_eq!(key1.to_string(), "gitea:team/service");
    }

    #[test]
    fn test_backends_do_not_collide() {
        let coordinates = RepositoryCoordinates::new("team", "service");
        let gitea = RepositoryKey::new("gitea", &coordinates);
        let gitlab = RepositoryKey::new("gitlab", &coordinates);

        assert_ne!(gitea, gitlab);
        assert_eq!(gitlab.vcs_service_id(), "gitlab");
    }
}
