//! RFC 6902 JSON Patch over `serde_json::Value`.
//!
//! A [`JsonPatch`] is an immutable, ordered list of operations. Applying it
//! never touches the input document: operations run against a private copy,
//! and the copy is only returned when every operation succeeded.

mod pointer;

pub use pointer::JsonPointer;

use pointer::parse_index;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("invalid JSON pointer: {0}")]
    InvalidPointer(String),

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("invalid array index: {0}")]
    InvalidIndex(String),

    #[error("cannot address a child of a scalar at {0}")]
    NotAContainer(String),

    #[error("test failed at {0}")]
    TestFailed(String),

    #[error("cannot move {from} into its own child {path}")]
    MoveIntoDescendant { from: String, path: String },

    #[error("cannot remove the document root")]
    RemoveRoot,

    #[error("patched document does not fit the target type: {0}")]
    Materialize(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: JsonPointer, value: JsonValue },
    Remove { path: JsonPointer },
    Replace { path: JsonPointer, value: JsonValue },
    Move { from: JsonPointer, path: JsonPointer },
    Copy { from: JsonPointer, path: JsonPointer },
    Test { path: JsonPointer, value: JsonValue },
}

impl PatchOperation {
    pub fn path(&self) -> &JsonPointer {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. }
            | Self::Copy { path, .. }
            | Self::Test { path, .. } => path,
        }
    }

    fn apply_in_place(&self, doc: &mut JsonValue) -> Result<(), PatchError> {
        match self {
            Self::Add { path, value } => add(doc, path, value.clone()),
            Self::Remove { path } => remove(doc, path).map(|_| ()),
            Self::Replace { path, value } => {
                let target = path
                    .resolve_mut(doc)
                    .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?;
                *target = value.clone();
                Ok(())
            }
            Self::Move { from, path } => {
                if from == path {
                    return Ok(());
                }
                if path.is_descendant_of(from) {
                    return Err(PatchError::MoveIntoDescendant {
                        from: from.to_string(),
                        path: path.to_string(),
                    });
                }
                let value = remove(doc, from)?;
                add(doc, path, value)
            }
            Self::Copy { from, path } => {
                let value = from
                    .resolve(doc)
                    .cloned()
                    .ok_or_else(|| PatchError::PathNotFound(from.to_string()))?;
                add(doc, path, value)
            }
            Self::Test { path, value } => match path.resolve(doc) {
                Some(current) if current == value => Ok(()),
                Some(_) => Err(PatchError::TestFailed(path.to_string())),
                None => Err(PatchError::PathNotFound(path.to_string())),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonPatch(Vec<PatchOperation>);

impl JsonPatch {
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self(operations)
    }

    /// Parses a patch document (a JSON array of operation objects).
    pub fn from_value(value: JsonValue) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Applies every operation in order and returns the patched document.
    pub fn apply(&self, doc: &JsonValue) -> Result<JsonValue, PatchError> {
        let mut patched = doc.clone();
        for operation in &self.0 {
            operation.apply_in_place(&mut patched)?;
        }
        Ok(patched)
    }

    /// Applies the patch to the structural form of `target` and re-materializes
    /// a value of the same type.
    pub fn apply_to<T>(&self, target: &T) -> Result<T, PatchError>
    where
        T: Serialize + DeserializeOwned,
    {
        let doc = serde_json::to_value(target)
            .map_err(|err| PatchError::Materialize(err.to_string()))?;
        let patched = self.apply(&doc)?;
        serde_json::from_value(patched).map_err(|err| PatchError::Materialize(err.to_string()))
    }
}

impl From<Vec<PatchOperation>> for JsonPatch {
    fn from(value: Vec<PatchOperation>) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for JsonPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "<{} operations>", self.0.len()),
        }
    }
}

fn add(doc: &mut JsonValue, path: &JsonPointer, value: JsonValue) -> Result<(), PatchError> {
    let Some((parent_path, token)) = path.split_last() else {
        *doc = value;
        return Ok(());
    };
    let parent = parent_path
        .resolve_mut(doc)
        .ok_or_else(|| PatchError::PathNotFound(parent_path.to_string()))?;
    match parent {
        JsonValue::Object(map) => {
            map.insert(token.to_string(), value);
            Ok(())
        }
        JsonValue::Array(items) => {
            if token == "-" {
                items.push(value);
                return Ok(());
            }
            // Inserting at `len` appends, so the bound is one past the end.
            let idx = parse_index(token, items.len() + 1)?;
            items.insert(idx, value);
            Ok(())
        }
        _ => Err(PatchError::NotAContainer(parent_path.to_string())),
    }
}

fn remove(doc: &mut JsonValue, path: &JsonPointer) -> Result<JsonValue, PatchError> {
    let (parent_path, token) = path.split_last().ok_or(PatchError::RemoveRoot)?;
    let parent = parent_path
        .resolve_mut(doc)
        .ok_or_else(|| PatchError::PathNotFound(parent_path.to_string()))?;
    match parent {
        JsonValue::Object(map) => map
            .remove(token)
            .ok_or_else(|| PatchError::PathNotFound(path.to_string())),
        JsonValue::Array(items) => {
            let idx = parse_index(token, items.len())?;
            Ok(items.remove(idx))
        }
        _ => Err(PatchError::NotAContainer(parent_path.to_string())),
    }
}
