use super::{CrudService, Reconciled, assigned_id, reconcile};
use crate::audit::AuditAction;
use crate::config::BatchWriteMode;
use crate::core::{Criteria, CrudDto, CrudError, CrudTypes, Identifiable, Result};
use crate::gateway::TransactionId;
use crate::metrics::Operation;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;

/// A batch element that passed its before/pre stages.
struct PendingUpdate<T: CrudTypes> {
    previous: T::Dto,
    dto: T::Dto,
    domain: T::Domain,
}

impl<T: CrudTypes> CrudService<T> {
    /// Full replacement; the identifier is taken from `dto`.
    pub async fn update(&self, dto: T::Dto, user: Option<&T::User>) -> Result<T::Dto> {
        let id = dto.id().cloned().ok_or_else(|| {
            CrudError::bad_request(format!("{} update without identifier", T::ENTITY))
        })?;
        self.update_by_id(id, dto, user).await
    }

    /// Full replacement of the entity `id`; the DTO's own id is overwritten.
    pub async fn update_by_id(
        &self,
        id: T::Id,
        mut dto: T::Dto,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        dto.set_id(id.clone());
        self.execute(Operation::Update, user, |tx| async move {
            let previous = self.resolve_one_by_id(tx, &id, user).await?;
            self.update_in(tx, previous, dto, user).await
        })
        .await
    }

    /// Full replacement against a caller-supplied previous snapshot.
    pub async fn update_with_previous(
        &self,
        previous: T::Dto,
        mut dto: T::Dto,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        let id = previous.id().cloned().ok_or_else(|| {
            CrudError::bad_request(format!("previous {} without identifier", T::ENTITY))
        })?;
        match dto.id() {
            Some(own) if *own != id => {
                return Err(CrudError::bad_request(format!(
                    "{} identifier {own} does not match previous {id}",
                    T::ENTITY
                )));
            }
            Some(_) => {}
            None => dto.set_id(id),
        }
        self.execute(Operation::Update, user, |tx| {
            self.update_in(tx, previous, dto, user)
        })
        .await
    }

    /// Resolves, reconciles and updates a batch; results follow submission order.
    /// An empty batch returns an empty list.
    pub async fn update_many(
        &self,
        dtos: Vec<T::Dto>,
        user: Option<&T::User>,
    ) -> Result<Vec<T::Dto>> {
        self.execute(Operation::UpdateMany, user, |tx| async move {
            if dtos.is_empty() {
                return Ok(Vec::new());
            }
            let previous = self.resolve_many_by_dto(tx, &dtos, user).await?;
            let pairs = reconcile(T::ENTITY, previous, dtos)?;
            self.update_reconciled(tx, pairs, user).await
        })
        .await
    }

    /// Batch update against caller-supplied previous snapshots.
    pub async fn update_many_with_previous(
        &self,
        previous: Vec<T::Dto>,
        dtos: Vec<T::Dto>,
        user: Option<&T::User>,
    ) -> Result<Vec<T::Dto>> {
        self.execute(Operation::UpdateMany, user, |tx| async move {
            if dtos.is_empty() {
                return Ok(Vec::new());
            }
            let pairs = reconcile(T::ENTITY, previous, dtos)?;
            self.update_reconciled(tx, pairs, user).await
        })
        .await
    }

    pub(super) async fn update_in(
        &self,
        tx: TransactionId,
        previous: T::Dto,
        dto: T::Dto,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        let pending = self.prepare_update(previous, dto, user).await?;
        let updated = self.repository.update_one(tx, pending.domain).await?;
        self.hooks.post_update(&pending.dto, &updated, user).await?;
        let reloaded = self.reload(tx, &assigned_id::<T>(&updated)?, user).await?;
        self.lifecycle
            .after_update(&pending.previous, &reloaded, user)
            .await?;
        Ok(reloaded)
    }

    /// Stage-wise batch update. Every element clears its before/pre hooks
    /// before anything is written; the reload is one bulk read.
    pub(super) async fn update_reconciled(
        &self,
        tx: TransactionId,
        pairs: Vec<Reconciled<T::Dto>>,
        user: Option<&T::User>,
    ) -> Result<Vec<T::Dto>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let width = self.config.concurrency();
        let pending: Vec<PendingUpdate<T>> = stream::iter(
            pairs
                .into_iter()
                .map(|pair| self.prepare_update(pair.previous, pair.incoming, user)),
        )
        .buffered(width)
        .try_collect()
        .await?;

        let (staged, domains): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .map(|p| ((p.previous, p.dto), p.domain))
            .unzip();
        let updated = match self.config.update_many_mode {
            BatchWriteMode::Bulk => self.repository.update_many(tx, domains).await?,
            BatchWriteMode::PerItem => {
                let mut updated = Vec::with_capacity(domains.len());
                for domain in domains {
                    updated.push(self.repository.update_one(tx, domain).await?);
                }
                updated
            }
        };
        if updated.len() != staged.len() {
            return Err(CrudError::persistence(format!(
                "{} batch update wrote {} of {} entities",
                T::ENTITY,
                updated.len(),
                staged.len()
            )));
        }

        stream::iter(
            staged
                .iter()
                .zip(updated.iter())
                .map(|((_, dto), domain)| self.hooks.post_update(dto, domain, user)),
        )
        .buffered(width)
        .try_collect::<Vec<()>>()
        .await?;

        let ids = updated
            .iter()
            .map(assigned_id::<T>)
            .collect::<Result<Vec<_>>>()?;
        let mut reloaded: BTreeMap<T::Id, T::Dto> = BTreeMap::new();
        for domain in self
            .repository
            .get_many(tx, &Criteria::by_ids(ids.clone()))
            .await?
        {
            let dto = self.mapper.to_dto(&domain, user)?;
            reloaded.insert(assigned_id::<T>(&domain)?, dto);
        }
        let reloaded = ids
            .iter()
            .map(|id| {
                reloaded
                    .remove(id)
                    .ok_or_else(|| CrudError::not_found(T::ENTITY, id))
            })
            .collect::<Result<Vec<_>>>()?;

        stream::iter(
            staged
                .iter()
                .zip(reloaded.iter())
                .map(|((previous, _), dto)| self.lifecycle.after_update(previous, dto, user)),
        )
        .buffered(width)
        .try_collect::<Vec<()>>()
        .await?;
        Ok(reloaded)
    }

    /// Validation, mapping, before/pre hooks and audit for one element.
    async fn prepare_update(
        &self,
        previous: T::Dto,
        mut dto: T::Dto,
        user: Option<&T::User>,
    ) -> Result<PendingUpdate<T>> {
        dto.validate()?;
        if self.config.audit_enabled {
            self.audit.inherit_trail(&previous, &mut dto);
        }
        let mapped = self.mapper.to_domain(&dto, user)?;
        self.lifecycle.before_update(&previous, &dto, user).await?;
        self.hooks.pre_update(&previous, &dto, user).await?;
        let domain = self.domain_for_write(&dto, mapped, AuditAction::Update, user)?;
        Ok(PendingUpdate {
            previous,
            dto,
            domain,
        })
    }
}
