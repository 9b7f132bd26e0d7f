//! The session manager

use crate::cache::{DisabledCache, InMemoryCache, ObjectCache};
use crate::stats::{OperationCounters, SessionStats};
use crate::{AcquisitionStrategy, SessionError, SessionResult};
use caseflow_config::CaseflowConfig;
use caseflow_types::{ObjectKind, PlatformObject, PlatformResult, WorkflowPlatform};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// How [`SessionManager::execute`] ends a successful transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxMode {
    /// Commit unless the environment forces rollback for test isolation
    Policy,
    /// Always roll back
    Rollback,
    /// Always commit. Used for mutations the external engine must observe.
    Commit,
}

/// What setup validation found on a fresh handle
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub identities: usize,
    pub applications: usize,
    pub admin_present: bool,
    pub problems: Vec<String>,
}

impl ValidationReport {
    pub fn is_healthy(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Owner of the single live platform handle
pub struct SessionManager {
    config: CaseflowConfig,
    handle: RwLock<Option<Arc<dyn WorkflowPlatform>>>,
    /// Serializes every operation against the handle
    exclusive: tokio::sync::Mutex<()>,
    cache: Box<dyn ObjectCache>,
    counters: OperationCounters,
    initialized_at: RwLock<Option<DateTime<Utc>>>,
}

impl SessionManager {
    /// Create an uninitialized manager. The cache implementation follows
    /// the environment's caching policy.
    pub fn new(config: CaseflowConfig) -> Self {
        let cache: Box<dyn ObjectCache> = if config.caching_enabled() {
            Box::new(InMemoryCache::new())
        } else {
            Box::new(DisabledCache)
        };
        Self::with_cache(config, cache)
    }

    pub fn with_cache(config: CaseflowConfig, cache: Box<dyn ObjectCache>) -> Self {
        Self {
            config,
            handle: RwLock::new(None),
            exclusive: tokio::sync::Mutex::new(()),
            cache,
            counters: OperationCounters::default(),
            initialized_at: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &CaseflowConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.read().is_some()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Obtain a handle by trying `strategies` in order, repeating the whole
    /// list up to the environment's retry count. The first handle returned
    /// is kept and validated; validation problems are only logged.
    pub async fn initialize(&self, strategies: &[Box<dyn AcquisitionStrategy>]) -> SessionResult<()> {
        if self.is_initialized() {
            return Err(SessionError::AlreadyInitialized);
        }

        let passes = self.config.max_retry_count().max(1);
        let mut attempts = 0u32;

        for pass in 1..=passes {
            for strategy in strategies {
                attempts += 1;
                match strategy.acquire(&self.config.connection).await {
                    Ok(handle) => {
                        {
                            let mut slot = self.handle.write();
                            if slot.is_some() {
                                return Err(SessionError::AlreadyInitialized);
                            }
                            *slot = Some(handle);
                        }
                        *self.initialized_at.write() = Some(Utc::now());

                        tracing::info!(
                            strategy = strategy.name(),
                            attempts,
                            environment = %self.config.environment.name,
                            profile = %self.config.kind(),
                            "Platform session initialized"
                        );

                        match self.validate().await {
                            Ok(report) if report.is_healthy() => {
                                tracing::info!(
                                    identities = report.identities,
                                    applications = report.applications,
                                    "Session validation passed"
                                );
                            }
                            Ok(report) => {
                                for problem in &report.problems {
                                    tracing::warn!(problem = %problem, "Session validation problem");
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "Session validation failed"),
                        }
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::warn!(
                            strategy = strategy.name(),
                            pass,
                            error = %e,
                            "Acquisition strategy failed"
                        );
                    }
                }
            }
        }

        tracing::error!(attempts, "Unable to acquire a platform handle");
        Err(SessionError::AcquisitionFailed { attempts })
    }

    /// Check the handle can see the directory and the administrator account
    pub async fn validate(&self) -> SessionResult<ValidationReport> {
        let identities = self
            .query("count_identities", |h| async move { h.count(ObjectKind::Identity).await })
            .await?;
        let applications = self
            .query("count_applications", |h| async move {
                h.count(ObjectKind::Application).await
            })
            .await?;
        let admin = self
            .resolve_cached(ObjectKind::Identity, &self.config.connection.username)
            .await?;

        let mut report = ValidationReport {
            identities,
            applications,
            admin_present: admin.is_some(),
            problems: Vec::new(),
        };
        if identities == 0 {
            report.problems.push("no identities visible".into());
        }
        if !report.admin_present {
            report.problems.push(format!(
                "administrator identity '{}' not found",
                self.config.connection.username
            ));
        }
        Ok(report)
    }

    /// Clear caches and release the handle. Later calls fail with
    /// [`SessionError::NotInitialized`].
    pub async fn shutdown(&self) -> SessionResult<()> {
        let _guard = self.exclusive.lock().await;
        let handle = self.handle.write().take();
        self.cache.clear();
        *self.initialized_at.write() = None;

        match handle {
            Some(handle) => {
                handle
                    .close()
                    .await
                    .map_err(|e| SessionError::operation("shutdown", e))?;
                tracing::info!(
                    total_operations = self.counters.total(),
                    "Platform session closed"
                );
                Ok(())
            }
            None => Ok(()),
        }
    }

    // ── Access ───────────────────────────────────────────────────────

    /// The live handle
    pub fn acquire(&self) -> SessionResult<Arc<dyn WorkflowPlatform>> {
        self.handle
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(SessionError::NotInitialized)
    }

    fn should_commit(&self, mode: TxMode) -> bool {
        match mode {
            TxMode::Commit => true,
            TxMode::Rollback => false,
            TxMode::Policy => !self.config.should_rollback_transactions(),
        }
    }

    /// Run `op` inside a transaction while holding the session lock.
    ///
    /// On success the transaction is committed or rolled back per `mode`.
    /// On failure it is rolled back and the error is returned as
    /// [`SessionError::OperationFailed`]. The lock is released either way.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mode: TxMode, op: F) -> SessionResult<T>
    where
        F: FnOnce(Arc<dyn WorkflowPlatform>) -> Fut,
        Fut: Future<Output = PlatformResult<T>>,
    {
        let handle = self.acquire()?;
        let _guard = self.exclusive.lock().await;
        let sequence = self.counters.record_operation(operation);

        tracing::debug!(operation, sequence, ?mode, "Beginning transaction");
        handle
            .begin_transaction()
            .await
            .map_err(|e| SessionError::operation(operation, e))?;

        match op(Arc::clone(&handle)).await {
            Ok(value) => {
                if self.should_commit(mode) {
                    if let Err(e) = handle.commit().await {
                        tracing::error!(operation, error = %e, "Commit failed, rolling back");
                        Self::rollback_quietly(&handle, operation).await;
                        return Err(SessionError::operation(operation, e));
                    }
                    tracing::debug!(operation, sequence, "Transaction committed");
                } else {
                    handle
                        .rollback()
                        .await
                        .map_err(|e| SessionError::operation(operation, e))?;
                    tracing::debug!(operation, sequence, "Transaction rolled back");
                }
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(operation, sequence, error = %e, "Operation failed, rolling back");
                Self::rollback_quietly(&handle, operation).await;
                Err(SessionError::operation(operation, e))
            }
        }
    }

    async fn rollback_quietly(handle: &Arc<dyn WorkflowPlatform>, operation: &str) {
        if let Err(e) = handle.rollback().await {
            tracing::error!(operation, error = %e, "Rollback failed");
        }
    }

    /// Run a read under the session lock without opening a transaction
    pub async fn query<T, F, Fut>(&self, operation: &str, op: F) -> SessionResult<T>
    where
        F: FnOnce(Arc<dyn WorkflowPlatform>) -> Fut,
        Fut: Future<Output = PlatformResult<T>>,
    {
        let handle = self.acquire()?;
        let _guard = self.exclusive.lock().await;
        self.counters.record_read();

        op(handle).await.map_err(|e| {
            tracing::debug!(operation, error = %e, "Read failed");
            SessionError::operation(operation, e)
        })
    }

    // ── Caching ──────────────────────────────────────────────────────

    /// Resolve a named object, serving repeats from the cache when caching
    /// is enabled. Misses are not cached.
    pub async fn resolve_cached(
        &self,
        kind: ObjectKind,
        name: &str,
    ) -> SessionResult<Option<Arc<PlatformObject>>> {
        if let Some(hit) = self.cache.get(kind, name) {
            tracing::trace!(%kind, name, "Cache hit");
            return Ok(Some(hit));
        }

        let key = name.to_string();
        let found = self
            .query("lookup", move |h| async move { h.lookup(kind, &key).await })
            .await?;

        Ok(found.map(|object| {
            let object = Arc::new(object);
            self.cache.put(kind, name, Arc::clone(&object));
            object
        }))
    }

    pub fn clear_caches(&self) {
        let size = self.cache.len();
        self.cache.clear();
        tracing::debug!(cleared = size, "Caches cleared");
    }

    /// Drop everything fetched through the handle so the next read sees
    /// the platform's current state. The handle itself is kept.
    pub async fn refresh(&self) -> SessionResult<()> {
        let handle = self.acquire()?;
        let _guard = self.exclusive.lock().await;
        handle
            .decache()
            .await
            .map_err(|e| SessionError::operation("refresh", e))?;
        self.cache.clear();
        Ok(())
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    pub fn statistics(&self) -> SessionStats {
        SessionStats {
            initialized: self.is_initialized(),
            environment: self.config.environment.name.clone(),
            profile: self.config.kind().profile().to_string(),
            total_operations: self.counters.total(),
            operations: self.counters.histogram(),
            reads: self.counters.reads(),
            cache_enabled: self.cache.is_enabled(),
            cache_size: self.cache.len(),
            initialized_at: *self.initialized_at.read(),
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("environment", &self.config.environment.name)
            .field("initialized", &self.is_initialized())
            .field("total_operations", &self.counters.total())
            .finish()
    }
}
