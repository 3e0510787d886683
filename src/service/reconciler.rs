use crate::core::{CrudDto, CrudError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// An incoming DTO paired with the stored state it replaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled<D> {
    pub previous: D,
    pub incoming: D,
}

/// Pairs every incoming DTO with its previous counterpart by identifier.
///
/// The result follows the order of `incoming`. The whole batch fails when an
/// incoming DTO has no id (`BadRequest`), repeats an id (`BadRequest`) or has
/// no previous counterpart (`DomainNotFound`). Unmatched previous DTOs are
/// ignored.
pub fn reconcile<D: CrudDto>(
    entity: &str,
    previous: Vec<D>,
    incoming: Vec<D>,
) -> Result<Vec<Reconciled<D>>> {
    let mut seen = BTreeSet::new();
    for dto in &incoming {
        let id = dto.id().ok_or_else(|| {
            CrudError::bad_request(format!("{entity} without identifier in batch"))
        })?;
        if !seen.insert(id) {
            return Err(CrudError::bad_request(format!(
                "{entity} {id} appears more than once in batch"
            )));
        }
    }

    let mut by_id: BTreeMap<D::Id, D> = previous
        .into_iter()
        .filter_map(|dto| dto.id().cloned().map(|id| (id, dto)))
        .collect();

    incoming
        .into_iter()
        .map(|dto| {
            let id = dto.id().cloned().ok_or_else(|| {
                CrudError::bad_request(format!("{entity} without identifier in batch"))
            })?;
            let previous = by_id
                .remove(&id)
                .ok_or_else(|| CrudError::not_found(entity, &id))?;
            Ok(Reconciled {
                previous,
                incoming: dto,
            })
        })
        .collect()
}
