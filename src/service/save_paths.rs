use super::{CrudService, assigned_id};
use crate::audit::AuditAction;
use crate::core::{Criteria, CrudDto, CrudTypes, Result};
use crate::gateway::TransactionId;
use crate::metrics::Operation;
use futures::stream::{self, StreamExt, TryStreamExt};
use log::debug;
use serde_json::Value as JsonValue;

impl<T: CrudTypes> CrudService<T> {
    /// Persists a new entity and returns it as reloaded from the gateway.
    ///
    /// When the DTO type declares a unique field and an entity with the same
    /// value already exists, that entity is returned and nothing is written.
    pub async fn save(&self, dto: T::Dto, user: Option<&T::User>) -> Result<T::Dto> {
        self.execute(Operation::Save, user, |tx| self.save_in(tx, dto, user))
            .await
    }

    /// Saves every DTO; results follow submission order. The first failure
    /// aborts the batch and rolls back every insert.
    pub async fn save_many(
        &self,
        dtos: Vec<T::Dto>,
        user: Option<&T::User>,
    ) -> Result<Vec<T::Dto>> {
        let width = self.config.concurrency();
        self.execute(Operation::SaveMany, user, |tx| {
            stream::iter(dtos.into_iter().map(move |dto| self.save_in(tx, dto, user)))
                .buffered(width)
                .try_collect()
        })
        .await
    }

    pub(super) async fn save_in(
        &self,
        tx: TransactionId,
        dto: T::Dto,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        dto.validate()?;
        let mapped = self.mapper.to_domain(&dto, user)?;
        if let Some(existing) = self.find_duplicate(tx, &dto, user).await? {
            return Ok(existing);
        }

        self.lifecycle.before_save(&dto, user).await?;
        self.hooks.pre_save(&dto, user).await?;
        let domain = self.domain_for_write(&dto, mapped, AuditAction::Create, user)?;
        let saved = self.repository.insert_one(tx, domain).await?;
        self.hooks.post_save(&dto, &saved, user).await?;
        let reloaded = self.reload(tx, &assigned_id::<T>(&saved)?, user).await?;
        self.lifecycle.after_save(&dto, &reloaded, user).await?;
        Ok(reloaded)
    }

    /// Safe-save lookup by the declared unique field.
    async fn find_duplicate(
        &self,
        tx: TransactionId,
        dto: &T::Dto,
        user: Option<&T::User>,
    ) -> Result<Option<T::Dto>> {
        if !self.config.safe_save_enabled {
            return Ok(None);
        }
        let Some(field) = <T::Dto as CrudDto>::UNIQUE_FIELD else {
            return Ok(None);
        };
        let value = match serde_json::to_value(dto)?.get(field) {
            None | Some(JsonValue::Null) => return Ok(None),
            Some(value) => value.clone(),
        };
        let criteria = Criteria::unique(field, value);
        let Some(existing) = self.repository.get_one(tx, &criteria).await? else {
            return Ok(None);
        };
        debug!("Save deduplicated, entity: {}, {criteria}", T::ENTITY);
        self.mapper.to_dto(&existing, user).map(Some)
    }
}
