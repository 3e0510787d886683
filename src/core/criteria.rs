use super::{CrudError, EntityId, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Predicate selecting zero or more entities.
///
/// Gateways translate a criteria into their own query form. `Criteria::Id`
/// matches at most one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criteria<Id> {
    All,
    Id(Id),
    Ids(Vec<Id>),
    Unique { field: String, value: JsonValue },
    Field { field: String, value: JsonValue },
}

impl<Id: EntityId> Criteria<Id> {
    pub fn all() -> Self {
        Self::All
    }

    pub fn by_id(id: Id) -> Self {
        Self::Id(id)
    }

    pub fn by_ids(ids: impl IntoIterator<Item = Id>) -> Self {
        Self::Ids(ids.into_iter().collect())
    }

    pub fn unique(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::Unique {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn field(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::Field {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Rejects criteria that cannot be translated into a query.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Ids(ids) if ids.is_empty() => {
                Err(CrudError::bad_request("identifier set must not be empty"))
            }
            Self::Unique { field, .. } | Self::Field { field, .. } if field.trim().is_empty() => {
                Err(CrudError::bad_request("criteria field name must not be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Evaluates the predicate against an entity's serialized form.
    ///
    /// The identifier is read from the top-level `id` field.
    pub fn matches_json(&self, entity: &JsonValue) -> bool {
        match self {
            Self::All => true,
            Self::Id(id) => id_matches(entity, id),
            Self::Ids(ids) => ids.iter().any(|id| id_matches(entity, id)),
            Self::Unique { field, value } | Self::Field { field, value } => {
                entity.get(field.as_str()) == Some(value)
            }
        }
    }
}

fn id_matches<Id: EntityId>(entity: &JsonValue, id: &Id) -> bool {
    match (entity.get("id"), serde_json::to_value(id)) {
        (Some(stored), Ok(wanted)) => *stored == wanted,
        _ => false,
    }
}

impl<Id: fmt::Display> fmt::Display for Criteria<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Id(id) => write!(f, "id={id}"),
            Self::Ids(ids) => {
                f.write_str("ids=[")?;
                for (idx, id) in ids.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{id}")?;
                }
                f.write_str("]")
            }
            Self::Unique { field, value } => write!(f, "unique {field}={value}"),
            Self::Field { field, value } => write!(f, "{field}={value}"),
        }
    }
}
