use super::CrudService;
use crate::core::{Criteria, CrudError, CrudTypes, Identifiable, Result};
use crate::gateway::TransactionId;
use crate::metrics::Operation;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

impl<T: CrudTypes> CrudService<T> {
    /// Fetches the single entity matching `criteria`.
    pub async fn get_one(&self, criteria: &Criteria<T::Id>, user: Option<&T::User>) -> Result<T::Dto> {
        self.execute(Operation::Get, user, |tx| self.resolve_one(tx, criteria, user))
            .await
    }

    pub async fn get_one_by_id(&self, id: &T::Id, user: Option<&T::User>) -> Result<T::Dto> {
        self.execute(Operation::Get, user, |tx| self.resolve_one_by_id(tx, id, user))
            .await
    }

    /// Fetches every entity matching `criteria`; an empty result is not an error.
    pub async fn get_many(
        &self,
        criteria: &Criteria<T::Id>,
        user: Option<&T::User>,
    ) -> Result<Vec<T::Dto>> {
        self.execute(Operation::GetMany, user, |tx| {
            self.resolve_many(tx, criteria, user)
        })
        .await
    }

    /// Fetches the stored counterparts of `dtos`; every DTO must carry an id.
    pub async fn get_many_by_dto(
        &self,
        dtos: &[T::Dto],
        user: Option<&T::User>,
    ) -> Result<Vec<T::Dto>> {
        self.execute(Operation::GetMany, user, |tx| {
            self.resolve_many_by_dto(tx, dtos, user)
        })
        .await
    }

    /// Unbounded cursor over the matching set.
    ///
    /// The cursor is not bound to a transaction and `after_get` does not run;
    /// `before_get` runs when the cursor is first polled.
    pub fn get_stream<'a>(
        &'a self,
        criteria: Criteria<T::Id>,
        user: Option<&'a T::User>,
    ) -> BoxStream<'a, Result<T::Dto>> {
        let tx = TransactionId::new();
        stream::once(async move {
            criteria.validate()?;
            self.lifecycle.before_get(&criteria, user).await?;
            Ok::<_, CrudError>(self.repository.stream(tx, criteria))
        })
        .try_flatten()
        .and_then(move |domain| async move { self.mapper.to_dto(&domain, user) })
        .boxed()
    }

    pub(super) async fn resolve_one(
        &self,
        tx: TransactionId,
        criteria: &Criteria<T::Id>,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        criteria.validate()?;
        self.lifecycle.before_get(criteria, user).await?;
        let domain = self
            .repository
            .get_one(tx, criteria)
            .await?
            .ok_or_else(|| CrudError::not_found(T::ENTITY, criteria))?;
        let dto = self.mapper.to_dto(&domain, user)?;
        let ids: Vec<T::Id> = dto.id().cloned().into_iter().collect();
        self.lifecycle
            .after_get(&ids, std::slice::from_ref(&dto), criteria, user)
            .await?;
        Ok(dto)
    }

    pub(super) async fn resolve_one_by_id(
        &self,
        tx: TransactionId,
        id: &T::Id,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        self.resolve_one(tx, &Criteria::by_id(id.clone()), user)
            .await
    }

    pub(super) async fn resolve_many(
        &self,
        tx: TransactionId,
        criteria: &Criteria<T::Id>,
        user: Option<&T::User>,
    ) -> Result<Vec<T::Dto>> {
        criteria.validate()?;
        self.lifecycle.before_get(criteria, user).await?;
        let dtos = self
            .repository
            .get_many(tx, criteria)
            .await?
            .iter()
            .map(|domain| self.mapper.to_dto(domain, user))
            .collect::<Result<Vec<_>>>()?;
        self.observe_loaded(criteria, &dtos, user).await?;
        Ok(dtos)
    }

    pub(super) async fn resolve_many_by_dto(
        &self,
        tx: TransactionId,
        dtos: &[T::Dto],
        user: Option<&T::User>,
    ) -> Result<Vec<T::Dto>> {
        let ids = dtos
            .iter()
            .map(|dto| {
                dto.id().cloned().ok_or_else(|| {
                    CrudError::bad_request(format!("{} without identifier in batch", T::ENTITY))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.resolve_many(tx, &Criteria::by_ids(ids), user).await
    }

    /// Drains the gateway cursor for `criteria`; used where no bound applies.
    pub(super) async fn resolve_streamed(
        &self,
        tx: TransactionId,
        criteria: &Criteria<T::Id>,
        user: Option<&T::User>,
    ) -> Result<Vec<T::Dto>> {
        self.lifecycle.before_get(criteria, user).await?;
        let dtos: Vec<T::Dto> = self
            .repository
            .stream(tx, criteria.clone())
            .and_then(move |domain| async move { self.mapper.to_dto(&domain, user) })
            .try_collect()
            .await?;
        self.observe_loaded(criteria, &dtos, user).await?;
        Ok(dtos)
    }

    async fn observe_loaded(
        &self,
        criteria: &Criteria<T::Id>,
        dtos: &[T::Dto],
        user: Option<&T::User>,
    ) -> Result<()> {
        let ids: Vec<T::Id> = dtos.iter().filter_map(|dto| dto.id().cloned()).collect();
        self.lifecycle.after_get(&ids, dtos, criteria, user).await
    }
}
