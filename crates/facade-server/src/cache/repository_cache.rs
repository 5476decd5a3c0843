//! Repository resolution cache using Moka.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use facade_core::{FacadeError, Repository, RepositoryCoordinates, Result};
use facade_vcs::VcsClient;

use crate::cache::keys::RepositoryKey;
use crate::metrics::CacheMetrics;

/// Configuracion del cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL de cada entry (default: 60 segundos)
    pub ttl: Duration,
    /// Maximo numero de entries (default: 10000)
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_capacity: 10_000,
        }
    }
}

/// Cache de repositorios resueltos, keyed por backend y coordenadas.
/// Thread-safe y async-friendly.
#[derive(Clone)]
pub struct RepositoryCache {
    inner: Cache<RepositoryKey, Repository>,
    metrics: CacheMetrics,
}

impl RepositoryCache {
    /// Crea un nuevo cache con la configuracion dada.
    pub fn new(config: CacheConfig) -> Self {
        let metrics = CacheMetrics::new();

        let eviction_metrics = metrics.clone();
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .eviction_listener(move |_key, _value, cause| {
                let reason = match cause {
                    moka::notification::RemovalCause::Expired => "ttl",
                    moka::notification::RemovalCause::Size => "capacity",
                    moka::notification::RemovalCause::Explicit => "manual",
                    moka::notification::RemovalCause::Replaced => "replaced",
                };
                eviction_metrics.record_eviction(reason);
            })
            .build();

        Self { inner, metrics }
    }

    /// Resuelve un repositorio, consultando el backend solo en cache miss.
    /// Evita cache stampede: solo una tarea consulta el backend para una key.
    ///
    /// Los errores no se cachean.
    pub async fn resolve(
        &self,
        client: &dyn VcsClient,
        coordinates: &RepositoryCoordinates,
    ) -> Result<Repository> {
        let key = RepositoryKey::new(client.service_id(), coordinates);

        if let Some(cached) = self.inner.get(&key).await {
            self.metrics.record_hit();
            return Ok(cached);
        }

        self.metrics.record_miss();
        debug!(key = %key, "Repository cache miss");

        let repository = self
            .inner
            .try_get_with(key, client.get_repository(coordinates))
            .await
            .map_err(|e: Arc<FacadeError>| (*e).clone())?;

        self.metrics.update_entry_count(self.inner.entry_count());
        Ok(repository)
    }

    /// Invalida la entrada de un repositorio.
    pub async fn invalidate(&self, vcs_service_id: &str, coordinates: &RepositoryCoordinates) {
        self.inner
            .invalidate(&RepositoryKey::new(vcs_service_id, coordinates))
            .await;
    }

    /// Retorna el numero aproximado de entries en cache.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Retorna las metricas para acceso externo.
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Sincroniza el cache (para tests principalmente).
    #[cfg(test)]
    pub(crate) async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}
