use super::{CrudService, Reconciled};
use crate::core::{Criteria, CrudError, CrudTypes, Identifiable, Result};
use crate::metrics::Operation;
use crate::patch::JsonPatch;

impl<T: CrudTypes> CrudService<T> {
    pub async fn edit(
        &self,
        id: T::Id,
        patch: &JsonPatch,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        self.edit_by_criteria(&Criteria::by_id(id), patch, user)
            .await
    }

    /// Patches the entity matching `criteria` and runs it through the update
    /// pipeline as a full replacement.
    pub async fn edit_by_criteria(
        &self,
        criteria: &Criteria<T::Id>,
        patch: &JsonPatch,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        self.execute(Operation::Edit, user, |tx| async move {
            let previous = self.resolve_one(tx, criteria, user).await?;
            let candidate = patched::<T>(&previous, patch)?;
            self.update_in(tx, previous, candidate, user).await
        })
        .await
    }

    pub async fn edit_many(
        &self,
        ids: Vec<T::Id>,
        patch: &JsonPatch,
        user: Option<&T::User>,
    ) -> Result<Vec<T::Dto>> {
        self.edit_many_by_criteria(&Criteria::by_ids(ids), patch, user)
            .await
    }

    /// Applies one patch to every matching entity; results follow resolve order.
    pub async fn edit_many_by_criteria(
        &self,
        criteria: &Criteria<T::Id>,
        patch: &JsonPatch,
        user: Option<&T::User>,
    ) -> Result<Vec<T::Dto>> {
        self.execute(Operation::EditMany, user, |tx| async move {
            let resolved = self.resolve_many(tx, criteria, user).await?;
            if resolved.is_empty() {
                return Err(CrudError::not_found(T::ENTITY, criteria));
            }
            let pairs = resolved
                .into_iter()
                .map(|previous| {
                    let incoming = patched::<T>(&previous, patch)?;
                    Ok(Reconciled { previous, incoming })
                })
                .collect::<Result<Vec<_>>>()?;
            self.update_reconciled(tx, pairs, user).await
        })
        .await
    }
}

/// Patched copy of `previous`. The identifier must survive the patch.
fn patched<T: CrudTypes>(previous: &T::Dto, patch: &JsonPatch) -> Result<T::Dto> {
    let candidate = patch.apply_to(previous)?;
    if candidate.id() != previous.id() {
        return Err(CrudError::bad_request(format!(
            "patch must not change the {} identifier",
            T::ENTITY
        )));
    }
    Ok(candidate)
}
