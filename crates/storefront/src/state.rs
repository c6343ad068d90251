//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::proof::{ProofError, ProofSessions, ReclaimClient};
use crate::shopify::{CommerceBackend, StorefrontClient};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the commerce backend, the proof clients and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: Arc<dyn CommerceBackend>,
    reclaim: ReclaimClient,
    proof_sessions: ProofSessions,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create the production state, talking to the Shopify Storefront API.
    ///
    /// # Errors
    ///
    /// Returns an error if the Reclaim application secret is not a valid key.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, ProofError> {
        let backend = Arc::new(StorefrontClient::new(&config.shopify));
        Self::with_backend(config, backend, Some(pool))
    }

    /// Create state around any commerce backend.
    ///
    /// Tests pass an in-memory backend and no database pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the Reclaim application secret is not a valid key.
    pub fn with_backend(
        config: StorefrontConfig,
        backend: Arc<dyn CommerceBackend>,
        pool: Option<PgPool>,
    ) -> Result<Self, ProofError> {
        let reclaim = ReclaimClient::new(&config.reclaim, &config.base_url)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                reclaim,
                proof_sessions: ProofSessions::new(),
                pool,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the commerce backend.
    #[must_use]
    pub fn backend(&self) -> &dyn CommerceBackend {
        self.inner.backend.as_ref()
    }

    /// Get the Reclaim client.
    #[must_use]
    pub fn reclaim(&self) -> &ReclaimClient {
        &self.inner.reclaim
    }

    /// Pending Reclaim sessions awaiting their callback.
    #[must_use]
    pub fn proof_sessions(&self) -> &ProofSessions {
        &self.inner.proof_sessions
    }

    /// Get the database pool, if the sessions are database-backed.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
