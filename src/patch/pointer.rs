use super::PatchError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Parsed RFC 6901 JSON Pointer.
///
/// The empty pointer `""` addresses the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JsonPointer {
    tokens: Vec<String>,
}

impl JsonPointer {
    pub fn root() -> Self {
        Self { tokens: Vec::new() }
    }

    pub fn parse(raw: &str) -> Result<Self, PatchError> {
        if raw.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(PatchError::InvalidPointer(format!(
                "'{raw}' must start with '/'"
            )));
        };
        let tokens = rest
            .split('/')
            .map(|token| unescape(token).ok_or_else(|| invalid_escape(raw)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tokens })
    }

    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Splits into the parent pointer and the last reference token.
    pub fn split_last(&self) -> Option<(JsonPointer, &str)> {
        let (last, parent) = self.tokens.split_last()?;
        Some((
            JsonPointer {
                tokens: parent.to_vec(),
            },
            last.as_str(),
        ))
    }

    /// True when `self` addresses a strict descendant of `other`.
    pub fn is_descendant_of(&self, other: &JsonPointer) -> bool {
        self.tokens.len() > other.tokens.len() && self.tokens.starts_with(&other.tokens)
    }

    pub fn resolve<'a>(&self, doc: &'a JsonValue) -> Option<&'a JsonValue> {
        self.tokens
            .iter()
            .try_fold(doc, |current, token| match current {
                JsonValue::Object(map) => map.get(token),
                JsonValue::Array(items) => parse_index(token, items.len())
                    .ok()
                    .and_then(|idx| items.get(idx)),
                _ => None,
            })
    }

    pub fn resolve_mut<'a>(&self, doc: &'a mut JsonValue) -> Option<&'a mut JsonValue> {
        self.tokens
            .iter()
            .try_fold(doc, |current, token| match current {
                JsonValue::Object(map) => map.get_mut(token),
                JsonValue::Array(items) => {
                    let len = items.len();
                    parse_index(token, len)
                        .ok()
                        .and_then(move |idx| items.get_mut(idx))
                }
                _ => None,
            })
    }
}

/// Parses an array index token. Leading zeros and signs are rejected.
pub(crate) fn parse_index(token: &str, len: usize) -> Result<usize, PatchError> {
    let well_formed = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !well_formed {
        return Err(PatchError::InvalidIndex(token.to_string()));
    }
    let idx: usize = token
        .parse()
        .map_err(|_| PatchError::InvalidIndex(token.to_string()))?;
    if idx >= len {
        return Err(PatchError::InvalidIndex(format!(
            "{idx} is out of bounds for array of length {len}"
        )));
    }
    Ok(idx)
}

fn unescape(token: &str) -> Option<String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(ch) = chars.next() {
        if ch != '~' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return None,
        }
    }
    Some(out)
}

fn invalid_escape(raw: &str) -> PatchError {
    PatchError::InvalidPointer(format!("'{raw}' contains an invalid '~' escape"))
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "/{}", token.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl TryFrom<String> for JsonPointer {
    type Error = PatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<JsonPointer> for String {
    fn from(value: JsonPointer) -> Self {
        value.to_string()
    }
}
