//! Audit-trail augmentation for audit-capable DTOs.
//!
//! Entries are only ever appended. The augmenter never reorders or drops
//! entries already present on a DTO.

use crate::core::{Actor, CrudDto};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action_type: AuditAction,
    pub action_date: DateTime<Utc>,
    /// `None` when the mutation ran without an acting user.
    pub actor_id: Option<String>,
}

/// Time source for audit timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone)]
pub struct AuditAugmenter {
    clock: Arc<dyn Clock>,
}

impl Default for AuditAugmenter {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl AuditAugmenter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Appends one entry to `dto` if it is audit-capable.
    ///
    /// Returns `true` when an entry was appended.
    pub fn append<D, U>(&self, dto: &mut D, action: AuditAction, user: Option<&U>) -> bool
    where
        D: CrudDto,
        U: Actor,
    {
        let Some(trail) = dto.audit_trail_mut() else {
            return false;
        };
        trail.push(AuditEntry {
            action_type: action,
            action_date: self.clock.now(),
            actor_id: user.map(|u| u.actor_id()),
        });
        true
    }

    /// Replaces the trail of `dto` with the stored trail of `previous`.
    ///
    /// Full-replacement updates carry whatever trail the caller sent; the
    /// stored one wins so earlier entries survive.
    pub fn inherit_trail<D: CrudDto>(&self, previous: &D, dto: &mut D) {
        let mut stored = previous.clone();
        if let (Some(prior), Some(trail)) = (stored.audit_trail_mut(), dto.audit_trail_mut()) {
            *trail = std::mem::take(prior);
        }
    }
}

impl fmt::Debug for AuditAugmenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditAugmenter").finish_non_exhaustive()
    }
}
