//! Persistence gateway contract.
//!
//! The pipeline never touches storage directly; every physical write and every
//! read goes through a [`Repository`]. Criteria-to-query translation is the
//! gateway's concern.

pub mod memory;
mod transaction;

pub use memory::{GeneratedId, InMemoryRepository, WriteCounts};
pub use transaction::{TransactionId, TransactionOutcome};

use crate::core::{Criteria, CrudTypes, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

#[async_trait]
pub trait Repository<T: CrudTypes>: Send + Sync {
    /// Opens a transaction. Gateways without transactions just hand out an id.
    async fn begin(&self) -> Result<TransactionId> {
        Ok(TransactionId::new())
    }

    async fn commit(&self, _tx: TransactionId) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self, _tx: TransactionId) -> Result<()> {
        Ok(())
    }

    /// Inserts a new entity and returns it with its identifier assigned.
    async fn insert_one(&self, tx: TransactionId, domain: T::Domain) -> Result<T::Domain>;

    /// Replaces a stored entity. Fails with `DomainNotFound` if it is absent.
    async fn update_one(&self, tx: TransactionId, domain: T::Domain) -> Result<T::Domain>;

    async fn update_many(
        &self,
        tx: TransactionId,
        domains: Vec<T::Domain>,
    ) -> Result<Vec<T::Domain>> {
        let mut updated = Vec::with_capacity(domains.len());
        for domain in domains {
            updated.push(self.update_one(tx, domain).await?);
        }
        Ok(updated)
    }

    /// Removes every entity matching `criteria`; returns how many were removed.
    async fn remove_one(&self, tx: TransactionId, criteria: &Criteria<T::Id>) -> Result<u64>;

    async fn remove_all(&self, tx: TransactionId) -> Result<u64>;

    async fn get_one(
        &self,
        tx: TransactionId,
        criteria: &Criteria<T::Id>,
    ) -> Result<Option<T::Domain>>;

    async fn get_many(&self, tx: TransactionId, criteria: &Criteria<T::Id>)
    -> Result<Vec<T::Domain>>;

    /// Unbounded cursor over the matching set.
    fn stream<'a>(
        &'a self,
        tx: TransactionId,
        criteria: Criteria<T::Id>,
    ) -> BoxStream<'a, Result<T::Domain>> {
        stream::once(async move { self.get_many(tx, &criteria).await })
            .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }
}
