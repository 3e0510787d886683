use super::LifecycleHooks;
use crate::core::{Criteria, CrudTypes, Result};
use std::sync::Arc;

/// Ordered set of lifecycle observers.
///
/// Global observers run before domain observers; within each tier observers
/// run in registration order. The first error stops the chain.
pub struct HookRegistry<T: CrudTypes> {
    global: Vec<Arc<dyn LifecycleHooks<T>>>,
    domain: Vec<Arc<dyn LifecycleHooks<T>>>,
}

impl<T: CrudTypes> Default for HookRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CrudTypes> Clone for HookRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            global: self.global.clone(),
            domain: self.domain.clone(),
        }
    }
}

impl<T: CrudTypes> HookRegistry<T> {
    pub fn new() -> Self {
        Self {
            global: Vec::new(),
            domain: Vec::new(),
        }
    }

    /// Registers an observer shared across services.
    pub fn with_global(mut self, hooks: Arc<dyn LifecycleHooks<T>>) -> Self {
        self.global.push(hooks);
        self
    }

    /// Registers an observer specific to this entity.
    pub fn with_domain(mut self, hooks: Arc<dyn LifecycleHooks<T>>) -> Self {
        self.domain.push(hooks);
        self
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn observers(&self) -> impl Iterator<Item = &Arc<dyn LifecycleHooks<T>>> {
        self.global.iter().chain(self.domain.iter())
    }

    pub async fn before_get(&self, criteria: &Criteria<T::Id>, user: Option<&T::User>) -> Result<()> {
        for hooks in self.observers() {
            hooks.before_get(criteria, user).await?;
        }
        Ok(())
    }

    pub async fn after_get(
        &self,
        ids: &[T::Id],
        dtos: &[T::Dto],
        criteria: &Criteria<T::Id>,
        user: Option<&T::User>,
    ) -> Result<()> {
        for hooks in self.observers() {
            hooks.after_get(ids, dtos, criteria, user).await?;
        }
        Ok(())
    }

    pub async fn before_save(&self, dto: &T::Dto, user: Option<&T::User>) -> Result<()> {
        for hooks in self.observers() {
            hooks.before_save(dto, user).await?;
        }
        Ok(())
    }

    pub async fn after_save(
        &self,
        dto: &T::Dto,
        saved: &T::Dto,
        user: Option<&T::User>,
    ) -> Result<()> {
        for hooks in self.observers() {
            hooks.after_save(dto, saved, user).await?;
        }
        Ok(())
    }

    pub async fn before_update(
        &self,
        previous: &T::Dto,
        dto: &T::Dto,
        user: Option<&T::User>,
    ) -> Result<()> {
        for hooks in self.observers() {
            hooks.before_update(previous, dto, user).await?;
        }
        Ok(())
    }

    pub async fn after_update(
        &self,
        previous: &T::Dto,
        updated: &T::Dto,
        user: Option<&T::User>,
    ) -> Result<()> {
        for hooks in self.observers() {
            hooks.after_update(previous, updated, user).await?;
        }
        Ok(())
    }

    pub async fn before_delete(
        &self,
        criteria: &Criteria<T::Id>,
        dto: &T::Dto,
        user: Option<&T::User>,
    ) -> Result<()> {
        for hooks in self.observers() {
            hooks.before_delete(criteria, dto, user).await?;
        }
        Ok(())
    }

    pub async fn after_delete(
        &self,
        criteria: &Criteria<T::Id>,
        removed: &T::Dto,
        user: Option<&T::User>,
    ) -> Result<()> {
        for hooks in self.observers() {
            hooks.after_delete(criteria, removed, user).await?;
        }
        Ok(())
    }
}
