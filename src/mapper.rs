//! DTO ↔ Domain conversion.

use crate::core::{CrudError, CrudTypes, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;

/// Converts between the wire-facing DTO and the persisted domain value.
///
/// Mapping failures surface as `BadRequest` before anything is persisted.
pub trait DomainMapper<T: CrudTypes>: Send + Sync {
    fn to_domain(&self, dto: &T::Dto, user: Option<&T::User>) -> Result<T::Domain>;

    fn to_dto(&self, domain: &T::Domain, user: Option<&T::User>) -> Result<T::Dto>;
}

/// Maps through `serde_json::Value` for DTO and Domain shapes that serialize
/// compatibly.
pub struct SerdeMapper<T> {
    _types: PhantomData<fn() -> T>,
}

impl<T> SerdeMapper<T> {
    pub fn new() -> Self {
        Self {
            _types: PhantomData,
        }
    }
}

impl<T> Default for SerdeMapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DomainMapper<T> for SerdeMapper<T>
where
    T: CrudTypes,
    T::Domain: Serialize + DeserializeOwned,
{
    fn to_domain(&self, dto: &T::Dto, _user: Option<&T::User>) -> Result<T::Domain> {
        convert(dto, T::ENTITY, "domain")
    }

    fn to_dto(&self, domain: &T::Domain, _user: Option<&T::User>) -> Result<T::Dto> {
        convert(domain, T::ENTITY, "dto")
    }
}

fn convert<S, D>(source: &S, entity: &str, target: &str) -> Result<D>
where
    S: Serialize,
    D: DeserializeOwned,
{
    let value = serde_json::to_value(source).map_err(|err| {
        CrudError::bad_request(format!("{entity}: cannot serialize for {target} mapping: {err}"))
    })?;
    serde_json::from_value(value).map_err(|err| {
        CrudError::bad_request(format!("{entity}: cannot map into {target}: {err}"))
    })
}
