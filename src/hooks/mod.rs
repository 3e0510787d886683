//! Extension points around every pipeline stage.
//!
//! Two tiers run around each mutation:
//! - [`LifecycleHooks`] observers (`before_*` / `after_*`), many per service,
//!   executed through a [`HookRegistry`].
//! - one [`MutationHooks`] strategy (`pre_*` / `post_*`) per service.
//!
//! Every method defaults to a no-op, so implementors override only the stages
//! they care about. Returning an error aborts the operation and rolls back its
//! transaction.

mod registry;

pub use registry::HookRegistry;

use crate::core::{Criteria, CrudTypes, Result};
use async_trait::async_trait;

#[async_trait]
pub trait LifecycleHooks<T: CrudTypes>: Send + Sync {
    async fn before_get(&self, _criteria: &Criteria<T::Id>, _user: Option<&T::User>) -> Result<()> {
        Ok(())
    }

    async fn after_get(
        &self,
        _ids: &[T::Id],
        _dtos: &[T::Dto],
        _criteria: &Criteria<T::Id>,
        _user: Option<&T::User>,
    ) -> Result<()> {
        Ok(())
    }

    async fn before_save(&self, _dto: &T::Dto, _user: Option<&T::User>) -> Result<()> {
        Ok(())
    }

    /// Receives the submitted DTO and the DTO reloaded after insert.
    async fn after_save(
        &self,
        _dto: &T::Dto,
        _saved: &T::Dto,
        _user: Option<&T::User>,
    ) -> Result<()> {
        Ok(())
    }

    async fn before_update(
        &self,
        _previous: &T::Dto,
        _dto: &T::Dto,
        _user: Option<&T::User>,
    ) -> Result<()> {
        Ok(())
    }

    /// Receives the pre-update snapshot and the DTO reloaded after update.
    async fn after_update(
        &self,
        _previous: &T::Dto,
        _updated: &T::Dto,
        _user: Option<&T::User>,
    ) -> Result<()> {
        Ok(())
    }

    async fn before_delete(
        &self,
        _criteria: &Criteria<T::Id>,
        _dto: &T::Dto,
        _user: Option<&T::User>,
    ) -> Result<()> {
        Ok(())
    }

    async fn after_delete(
        &self,
        _criteria: &Criteria<T::Id>,
        _removed: &T::Dto,
        _user: Option<&T::User>,
    ) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait MutationHooks<T: CrudTypes>: Send + Sync {
    async fn pre_save(&self, _dto: &T::Dto, _user: Option<&T::User>) -> Result<()> {
        Ok(())
    }

    async fn post_save(
        &self,
        _dto: &T::Dto,
        _saved: &T::Domain,
        _user: Option<&T::User>,
    ) -> Result<()> {
        Ok(())
    }

    async fn pre_update(
        &self,
        _previous: &T::Dto,
        _dto: &T::Dto,
        _user: Option<&T::User>,
    ) -> Result<()> {
        Ok(())
    }

    async fn post_update(
        &self,
        _dto: &T::Dto,
        _updated: &T::Domain,
        _user: Option<&T::User>,
    ) -> Result<()> {
        Ok(())
    }

    async fn pre_delete(
        &self,
        _criteria: &Criteria<T::Id>,
        _dto: &T::Dto,
        _user: Option<&T::User>,
    ) -> Result<()> {
        Ok(())
    }

    async fn post_delete(
        &self,
        _criteria: &Criteria<T::Id>,
        _removed: &T::Dto,
        _user: Option<&T::User>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Mutation strategy that does nothing at every stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl<T: CrudTypes> MutationHooks<T> for NoopHooks {}

impl<T: CrudTypes> LifecycleHooks<T> for NoopHooks {}
