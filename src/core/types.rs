use super::Result;
use crate::audit::AuditEntry;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Bound set shared by every identifier type the pipeline can carry.
pub trait EntityId:
    Clone + Eq + Ord + Hash + Debug + Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> EntityId for T where
    T: Clone
        + Eq
        + Ord
        + Hash
        + Debug
        + Display
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// A value that carries a stable identifier once persisted.
pub trait Identifiable {
    type Id: EntityId;

    /// Returns the identifier, or `None` before the first persistence.
    fn id(&self) -> Option<&Self::Id>;

    fn set_id(&mut self, id: Self::Id);
}

/// Wire-facing mirror of a persisted entity.
///
/// Capabilities are opt-in through the provided items:
/// - `UNIQUE_FIELD` declares the field checked by safe save.
/// - `validate` runs declared constraints before any mutation.
/// - `audit_trail_mut` exposes the audit trail of audit-capable DTOs.
pub trait CrudDto:
    Identifiable + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Serialized field name whose value must be unique across the store.
    const UNIQUE_FIELD: Option<&'static str> = None;

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn audit_trail_mut(&mut self) -> Option<&mut Vec<AuditEntry>> {
        None
    }
}

/// Acting user (security context) attached to a pipeline call.
pub trait Actor: Debug + Send + Sync + 'static {
    fn actor_id(&self) -> String;

    fn display_name(&self) -> Option<&str> {
        None
    }
}

/// Minimal user context for callers without their own security model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Actor for User {
    fn actor_id(&self) -> String {
        self.id.clone()
    }

    fn display_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Entity context: the correlated types threaded through one pipeline.
///
/// ```ignore
/// struct Samples;
///
/// impl CrudTypes for Samples {
///     const ENTITY: &'static str = "sample";
///     type Id = u64;
///     type User = User;
///     type Domain = SampleDomain;
///     type Dto = SampleDto;
/// }
/// ```
pub trait CrudTypes: Send + Sync + 'static {
    /// Entity label used in log lines and error messages.
    const ENTITY: &'static str;

    type Id: EntityId;
    type User: Actor;
    type Domain: Identifiable<Id = Self::Id> + Clone + Debug + Send + Sync + 'static;
    type Dto: CrudDto<Id = Self::Id>;
}
