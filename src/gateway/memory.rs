use super::{Repository, TransactionId};
use crate::core::{Criteria, CrudError, CrudTypes, Identifiable, Result};
use async_trait::async_trait;
use im::OrdMap;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use uuid::Uuid;

/// Identifier types the in-memory gateway can allocate on insert.
pub trait GeneratedId: Sized {
    /// `sequence` starts at 1 and grows by one per allocation.
    /// Returns `None` once the identifier space is exhausted.
    fn generate(sequence: u64) -> Option<Self>;
}

impl GeneratedId for u64 {
    fn generate(sequence: u64) -> Option<Self> {
        (sequence != 0).then_some(sequence)
    }
}

impl GeneratedId for i64 {
    fn generate(sequence: u64) -> Option<Self> {
        i64::try_from(sequence).ok().filter(|id| *id > 0)
    }
}

impl GeneratedId for Uuid {
    fn generate(_sequence: u64) -> Option<Self> {
        Some(Uuid::new_v4())
    }
}

impl GeneratedId for String {
    fn generate(_sequence: u64) -> Option<Self> {
        Some(Uuid::new_v4().to_string())
    }
}

/// Physical writes performed so far, rolled-back ones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub inserts: u64,
    pub updates: u64,
    pub removes: u64,
}

struct ActiveTransaction<T: CrudTypes> {
    snapshot: OrdMap<T::Id, T::Domain>,
    _permit: OwnedSemaphorePermit,
}

/// Reference gateway holding entities in a persistent ordered map.
///
/// Transactions are serialized: `begin` waits until the previous transaction
/// finished. Writes go straight to the live map and `rollback` restores the
/// snapshot taken at `begin`, which is O(1) thanks to structural sharing.
pub struct InMemoryRepository<T: CrudTypes> {
    store: RwLock<OrdMap<T::Id, T::Domain>>,
    transactions: RwLock<HashMap<TransactionId, ActiveTransaction<T>>>,
    gate: Arc<Semaphore>,
    sequence: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    removes: AtomicU64,
}

impl<T: CrudTypes> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CrudTypes> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Gateway whose next allocated sequence value is `sequence`, for stores
    /// seeded with externally numbered entities.
    pub fn starting_at(sequence: u64) -> Self {
        Self {
            store: RwLock::new(OrdMap::new()),
            transactions: RwLock::new(HashMap::new()),
            gate: Arc::new(Semaphore::new(1)),
            sequence: AtomicU64::new(sequence),
            inserts: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            removes: AtomicU64::new(0),
        }
    }

    pub fn write_counts(&self) -> WriteCounts {
        WriteCounts {
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Current committed-or-pending content, in identifier order.
    pub async fn entities(&self) -> Vec<T::Domain> {
        self.store.read().await.values().cloned().collect()
    }

    async fn ensure_active(&self, tx: TransactionId) -> Result<()> {
        if self.transactions.read().await.contains_key(&tx) {
            Ok(())
        } else {
            Err(inactive(tx))
        }
    }
}

fn inactive(tx: TransactionId) -> CrudError {
    CrudError::persistence(format!("transaction {tx} is not active"))
}

impl<T> InMemoryRepository<T>
where
    T: CrudTypes,
    T::Domain: Serialize,
{
    fn select(
        store: &OrdMap<T::Id, T::Domain>,
        criteria: &Criteria<T::Id>,
    ) -> Result<Vec<T::Domain>> {
        criteria.validate()?;
        match criteria {
            Criteria::All => Ok(store.values().cloned().collect()),
            Criteria::Id(id) => Ok(store.get(id).cloned().into_iter().collect()),
            Criteria::Ids(ids) => {
                let mut seen = BTreeSet::new();
                Ok(ids
                    .iter()
                    .filter(|id| seen.insert(*id))
                    .filter_map(|id| store.get(id).cloned())
                    .collect())
            }
            Criteria::Unique { .. } | Criteria::Field { .. } => {
                let mut matched = Vec::new();
                for domain in store.values() {
                    let json = serde_json::to_value(domain).map_err(|err| {
                        CrudError::persistence(format!("cannot evaluate {criteria}: {err}"))
                    })?;
                    if criteria.matches_json(&json) {
                        matched.push(domain.clone());
                    }
                }
                Ok(matched)
            }
        }
    }
}

#[async_trait]
impl<T> Repository<T> for InMemoryRepository<T>
where
    T: CrudTypes,
    T::Id: GeneratedId,
    T::Domain: Serialize,
{
    async fn begin(&self) -> Result<TransactionId> {
        let permit = self
            .gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CrudError::persistence("transaction gate closed"))?;
        let snapshot = self.store.read().await.clone();
        let tx = TransactionId::new();
        self.transactions.write().await.insert(
            tx,
            ActiveTransaction {
                snapshot,
                _permit: permit,
            },
        );
        debug!("{} store: begin {tx}", T::ENTITY);
        Ok(tx)
    }

    async fn commit(&self, tx: TransactionId) -> Result<()> {
        self.transactions
            .write()
            .await
            .remove(&tx)
            .ok_or_else(|| inactive(tx))?;
        debug!("{} store: commit {tx}", T::ENTITY);
        Ok(())
    }

    async fn rollback(&self, tx: TransactionId) -> Result<()> {
        let finished = self
            .transactions
            .write()
            .await
            .remove(&tx)
            .ok_or_else(|| inactive(tx))?;
        let restored = finished.snapshot.len();
        *self.store.write().await = finished.snapshot;
        debug!(
            "{} store: rollback {tx}, restored {restored} entities",
            T::ENTITY
        );
        Ok(())
    }

    async fn insert_one(&self, tx: TransactionId, mut domain: T::Domain) -> Result<T::Domain> {
        self.ensure_active(tx).await?;
        let mut store = self.store.write().await;
        let id = match domain.id() {
            Some(id) if store.contains_key(id) => {
                return Err(CrudError::persistence(format!(
                    "{} with id {id} already exists",
                    T::ENTITY
                )));
            }
            Some(id) => id.clone(),
            None => {
                let id = loop {
                    let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
                    let candidate = T::Id::generate(sequence).ok_or_else(|| {
                        CrudError::persistence(format!(
                            "{} identifier space exhausted at sequence {sequence}",
                            T::ENTITY
                        ))
                    })?;
                    if !store.contains_key(&candidate) {
                        break candidate;
                    }
                };
                domain.set_id(id.clone());
                id
            }
        };
        store.insert(id, domain.clone());
        self.inserts.fetch_add(1, Ordering::Relaxed);
        Ok(domain)
    }

    async fn update_one(&self, tx: TransactionId, domain: T::Domain) -> Result<T::Domain> {
        self.update_many(tx, vec![domain])
            .await?
            .pop()
            .ok_or_else(|| CrudError::persistence("update produced no entity"))
    }

    async fn update_many(
        &self,
        tx: TransactionId,
        domains: Vec<T::Domain>,
    ) -> Result<Vec<T::Domain>> {
        self.ensure_active(tx).await?;
        let mut store = self.store.write().await;
        // Check every target first so a bulk update is all-or-nothing.
        let mut ids = Vec::with_capacity(domains.len());
        for domain in &domains {
            let id = domain.id().ok_or_else(|| {
                CrudError::bad_request(format!("{} update without identifier", T::ENTITY))
            })?;
            if !store.contains_key(id) {
                return Err(CrudError::not_found(T::ENTITY, id));
            }
            ids.push(id.clone());
        }
        for (id, domain) in ids.into_iter().zip(domains.iter()) {
            store.insert(id, domain.clone());
        }
        self.updates
            .fetch_add(domains.len() as u64, Ordering::Relaxed);
        Ok(domains)
    }

    async fn remove_one(&self, tx: TransactionId, criteria: &Criteria<T::Id>) -> Result<u64> {
        self.ensure_active(tx).await?;
        let mut store = self.store.write().await;
        let matched = Self::select(&store, criteria)?;
        let mut removed = 0;
        for domain in &matched {
            if let Some(id) = domain.id() {
                if store.remove(id).is_some() {
                    removed += 1;
                }
            }
        }
        self.removes.fetch_add(removed, Ordering::Relaxed);
        Ok(removed)
    }

    async fn remove_all(&self, tx: TransactionId) -> Result<u64> {
        self.ensure_active(tx).await?;
        let mut store = self.store.write().await;
        let removed = store.len() as u64;
        *store = OrdMap::new();
        self.removes.fetch_add(removed, Ordering::Relaxed);
        Ok(removed)
    }

    async fn get_one(
        &self,
        _tx: TransactionId,
        criteria: &Criteria<T::Id>,
    ) -> Result<Option<T::Domain>> {
        let store = self.store.read().await;
        Ok(Self::select(&store, criteria)?.into_iter().next())
    }

    async fn get_many(
        &self,
        _tx: TransactionId,
        criteria: &Criteria<T::Id>,
    ) -> Result<Vec<T::Domain>> {
        let store = self.store.read().await;
        Self::select(&store, criteria)
    }
}
