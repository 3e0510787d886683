use super::CrudService;
use crate::audit::AuditAction;
use crate::config::BatchWriteMode;
use crate::core::{Criteria, CrudError, CrudTypes, Identifiable, Result};
use crate::gateway::TransactionId;
use crate::metrics::Operation;
use futures::stream::{self, StreamExt, TryStreamExt};

impl<T: CrudTypes> CrudService<T> {
    pub async fn delete(&self, id: T::Id, user: Option<&T::User>) -> Result<T::Id> {
        self.delete_by_criteria(&Criteria::by_id(id), user).await
    }

    /// Removes the entity matching `criteria` and returns its identifier.
    pub async fn delete_by_criteria(
        &self,
        criteria: &Criteria<T::Id>,
        user: Option<&T::User>,
    ) -> Result<T::Id> {
        self.execute(Operation::Delete, user, |tx| async move {
            let dto = self.resolve_one(tx, criteria, user).await?;
            self.delete_in(tx, criteria, dto, user).await
        })
        .await
    }

    pub async fn delete_many(
        &self,
        ids: Vec<T::Id>,
        user: Option<&T::User>,
    ) -> Result<Vec<T::Id>> {
        self.delete_many_by_criteria(&Criteria::by_ids(ids), user)
            .await
    }

    /// Removes every entity matching `criteria`; identifiers follow resolve order.
    pub async fn delete_many_by_criteria(
        &self,
        criteria: &Criteria<T::Id>,
        user: Option<&T::User>,
    ) -> Result<Vec<T::Id>> {
        let width = self.config.concurrency();
        self.execute(Operation::DeleteMany, user, |tx| async move {
            let resolved = self.resolve_many(tx, criteria, user).await?;
            if resolved.is_empty() {
                return Err(CrudError::not_found(T::ENTITY, criteria));
            }
            stream::iter(
                resolved
                    .into_iter()
                    .map(|dto| self.delete_in(tx, criteria, dto, user)),
            )
            .buffered(width)
            .try_collect()
            .await
        })
        .await
    }

    /// Removes the whole matching set. An empty store yields an empty list.
    pub async fn delete_all(&self, user: Option<&T::User>) -> Result<Vec<T::Id>> {
        let width = self.config.concurrency();
        let criteria = Criteria::all();
        self.execute(Operation::DeleteAll, user, |tx| async move {
            let resolved = self.resolve_streamed(tx, &criteria, user).await?;
            if resolved.is_empty() {
                return Ok(Vec::new());
            }
            match self.config.delete_all_mode {
                BatchWriteMode::PerItem => {
                    stream::iter(
                        resolved
                            .into_iter()
                            .map(|dto| self.delete_in(tx, &criteria, dto, user)),
                    )
                    .buffered(width)
                    .try_collect()
                    .await
                }
                BatchWriteMode::Bulk => self.delete_all_bulk(tx, &criteria, resolved, user).await,
            }
        })
        .await
    }

    /// Single-entity removal:
    /// `before_delete -> pre_delete -> remove -> post_delete -> after_delete`.
    async fn delete_in(
        &self,
        tx: TransactionId,
        criteria: &Criteria<T::Id>,
        dto: T::Dto,
        user: Option<&T::User>,
    ) -> Result<T::Id> {
        let id = stored_id::<T>(&dto)?;
        self.lifecycle.before_delete(criteria, &dto, user).await?;
        self.hooks.pre_delete(criteria, &dto, user).await?;
        let removed = self
            .repository
            .remove_one(tx, &Criteria::by_id(id.clone()))
            .await?;
        if removed == 0 {
            return Err(CrudError::not_found(T::ENTITY, &id));
        }
        let removed = self.audited(&dto, AuditAction::Delete, user).unwrap_or(dto);
        self.hooks.post_delete(criteria, &removed, user).await?;
        self.lifecycle.after_delete(criteria, &removed, user).await?;
        Ok(id)
    }

    async fn delete_all_bulk(
        &self,
        tx: TransactionId,
        criteria: &Criteria<T::Id>,
        resolved: Vec<T::Dto>,
        user: Option<&T::User>,
    ) -> Result<Vec<T::Id>> {
        let ids = resolved
            .iter()
            .map(stored_id::<T>)
            .collect::<Result<Vec<_>>>()?;
        for dto in &resolved {
            self.lifecycle.before_delete(criteria, dto, user).await?;
            self.hooks.pre_delete(criteria, dto, user).await?;
        }
        self.repository.remove_all(tx).await?;
        for dto in resolved {
            let removed = self.audited(&dto, AuditAction::Delete, user).unwrap_or(dto);
            self.hooks.post_delete(criteria, &removed, user).await?;
            self.lifecycle.after_delete(criteria, &removed, user).await?;
        }
        Ok(ids)
    }
}

fn stored_id<T: CrudTypes>(dto: &T::Dto) -> Result<T::Id> {
    dto.id().cloned().ok_or_else(|| {
        CrudError::persistence(format!("stored {} without identifier", T::ENTITY))
    })
}
