//! The write pipeline.
//!
//! [`CrudService`] composes a gateway, a mapper, the mutation strategy and the
//! lifecycle observers. Operations are split per family:
//! - `resolver`: reads and "previous" snapshots
//! - `save_paths`: `save`, `save_many`
//! - `update_paths`: `update*`, `update_many*`
//! - `edit_paths`: JSON Patch edits layered over the update pipeline
//! - `delete_paths`: `delete*`, `delete_many*`, `delete_all`
//! - `child_paths`: parent-scoped writes on embedded child collections
//!
//! Every public operation runs in exactly one gateway transaction. Internal
//! delegation (edit into update, batch into single-item) reuses it.

mod child_paths;
mod delete_paths;
mod edit_paths;
mod reconciler;
mod resolver;
mod save_paths;
mod update_paths;

pub use child_paths::{ChildAccessor, ChildMutation};
pub use reconciler::{Reconciled, reconcile};

use crate::audit::{AuditAction, AuditAugmenter};
use crate::config::PipelineConfig;
use crate::core::{Actor, Criteria, CrudError, CrudTypes, Identifiable, Result};
use crate::gateway::{Repository, TransactionId, TransactionOutcome};
use crate::hooks::{HookRegistry, LifecycleHooks, MutationHooks, NoopHooks};
use crate::mapper::DomainMapper;
use crate::metrics::{Operation, OperationMetrics};
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, Level, event, info_span};

pub struct CrudService<T: CrudTypes> {
    repository: Arc<dyn Repository<T>>,
    mapper: Arc<dyn DomainMapper<T>>,
    hooks: Arc<dyn MutationHooks<T>>,
    lifecycle: HookRegistry<T>,
    audit: AuditAugmenter,
    config: PipelineConfig,
    metrics: Arc<OperationMetrics>,
}

impl<T: CrudTypes> Clone for CrudService<T> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            mapper: Arc::clone(&self.mapper),
            hooks: Arc::clone(&self.hooks),
            lifecycle: self.lifecycle.clone(),
            audit: self.audit.clone(),
            config: self.config.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<T: CrudTypes> CrudService<T> {
    pub fn new(repository: Arc<dyn Repository<T>>, mapper: Arc<dyn DomainMapper<T>>) -> Self {
        Self {
            repository,
            mapper,
            hooks: Arc::new(NoopHooks),
            lifecycle: HookRegistry::new(),
            audit: AuditAugmenter::default(),
            config: PipelineConfig::default(),
            metrics: Arc::new(OperationMetrics::new()),
        }
    }

    /// Replace the mutation strategy (`pre_*` / `post_*` hooks)
    pub fn with_hooks(mut self, hooks: Arc<dyn MutationHooks<T>>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Register an observer that runs before entity-specific observers
    pub fn with_global_hooks(mut self, hooks: Arc<dyn LifecycleHooks<T>>) -> Self {
        self.lifecycle = self.lifecycle.with_global(hooks);
        self
    }

    pub fn with_domain_hooks(mut self, hooks: Arc<dyn LifecycleHooks<T>>) -> Self {
        self.lifecycle = self.lifecycle.with_domain(hooks);
        self
    }

    pub fn with_audit(mut self, audit: AuditAugmenter) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a metrics sink between several services
    pub fn with_metrics(mut self, metrics: Arc<OperationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &OperationMetrics {
        &self.metrics
    }

    /// Runs `body` inside one gateway transaction, with span, log and metrics.
    async fn execute<R, F, Fut>(
        &self,
        operation: Operation,
        user: Option<&T::User>,
        body: F,
    ) -> Result<R>
    where
        F: FnOnce(TransactionId) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let started = Instant::now();
        let actor = actor_label(user);
        let entity = T::ENTITY;
        let span = info_span!(
            "crud.operation",
            entity = %entity,
            operation = %operation,
            actor = %actor
        );
        debug!("{operation}, entity: {entity}, user: {actor}");

        let result = async {
            let tx = self.repository.begin().await?;
            let outcome = body(tx).await;
            self.finalize(operation, tx, outcome).await
        }
        .instrument(span.clone())
        .await;

        let elapsed = started.elapsed();
        self.metrics.record(operation, elapsed, result.is_err());
        match &result {
            Ok(_) => event!(
                parent: &span,
                Level::DEBUG,
                elapsed_ms = elapsed.as_millis() as u64,
                "crud operation completed"
            ),
            Err(err) => event!(
                parent: &span,
                Level::WARN,
                error = %err,
                code = err.code(),
                elapsed_ms = elapsed.as_millis() as u64,
                "crud operation failed"
            ),
        }
        result
    }

    async fn finalize<R>(
        &self,
        operation: Operation,
        tx: TransactionId,
        outcome: Result<R>,
    ) -> Result<R> {
        match outcome {
            Ok(value) => {
                if let Err(commit_err) = self.repository.commit(tx).await {
                    let _ = self.repository.rollback(tx).await;
                    return Err(CrudError::persistence(format!(
                        "{operation} on {} failed to commit {tx}: {commit_err}",
                        T::ENTITY
                    )));
                }
                let outcome = TransactionOutcome::Committed;
                event!(Level::TRACE, tx = %tx, outcome = %outcome);
                Ok(value)
            }
            Err(err) => {
                match self.repository.rollback(tx).await {
                    Ok(()) => warn!(
                        "{operation} on {} {}: {err}",
                        T::ENTITY,
                        TransactionOutcome::RolledBack
                    ),
                    Err(rollback_err) => warn!(
                        "{operation} on {} failed ({err}) and rollback of {tx} failed: {rollback_err}",
                        T::ENTITY
                    ),
                }
                Err(err)
            }
        }
    }

    /// Returns an audited copy of `dto` when an entry was appended.
    fn audited(
        &self,
        dto: &T::Dto,
        action: AuditAction,
        user: Option<&T::User>,
    ) -> Option<T::Dto> {
        if !self.config.audit_enabled {
            return None;
        }
        let mut audited = dto.clone();
        self.audit.append(&mut audited, action, user).then_some(audited)
    }

    /// Maps `dto`, re-mapping its audited copy when the audit appended an entry.
    fn domain_for_write(
        &self,
        dto: &T::Dto,
        mapped: T::Domain,
        action: AuditAction,
        user: Option<&T::User>,
    ) -> Result<T::Domain> {
        match self.audited(dto, action, user) {
            Some(audited) => self.mapper.to_domain(&audited, user),
            None => Ok(mapped),
        }
    }

    /// Reads back a freshly written entity, bypassing get hooks.
    async fn reload(
        &self,
        tx: TransactionId,
        id: &T::Id,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        let domain = self
            .repository
            .get_one(tx, &Criteria::by_id(id.clone()))
            .await?
            .ok_or_else(|| CrudError::not_found(T::ENTITY, id))?;
        self.mapper.to_dto(&domain, user)
    }
}

fn assigned_id<T: CrudTypes>(domain: &T::Domain) -> Result<T::Id> {
    domain.id().cloned().ok_or_else(|| {
        CrudError::persistence(format!("{} gateway returned an entity without id", T::ENTITY))
    })
}

fn actor_label<U: Actor>(user: Option<&U>) -> String {
    user.map(|u| u.actor_id())
        .unwrap_or_else(|| "anonymous".to_string())
}
