use super::CrudService;
use crate::core::{Criteria, CrudError, CrudTypes, EntityId, Identifiable, Result};
use crate::metrics::Operation;
use log::debug;
use serde::Serialize;
use std::fmt::Debug;

type ChildId<T, A> = <<A as ChildAccessor<T>>::Child as Identifiable>::Id;

/// One embedded child collection of a parent DTO, e.g. its characteristics
/// or contact media.
///
/// Children are matched with [`Criteria`] evaluated on their serialized form,
/// so the child identifier must serialize as a top-level `id` field.
pub trait ChildAccessor<T: CrudTypes>: Send + Sync {
    type Child: Identifiable + Clone + Debug + Serialize + Send + Sync + 'static;

    /// Label used in log lines and error messages.
    const CHILD: &'static str;

    fn children_mut<'a>(&self, parent: &'a mut T::Dto) -> &'a mut Vec<Self::Child>;

    /// Identifier for a saved child that arrived without one.
    fn next_id(&self) -> <Self::Child as Identifiable>::Id;
}

/// A change applied to one child collection.
#[derive(Debug, Clone)]
pub enum ChildMutation<C: Identifiable> {
    /// Appends children, allocating identifiers where missing.
    Save(Vec<C>),
    /// Replaces the first child matching `criteria`; the replacement keeps its id.
    Update { criteria: Criteria<C::Id>, child: C },
    /// Replaces every child by identifier.
    UpdateMany(Vec<C>),
    /// Removes the first matching child.
    Delete(Criteria<C::Id>),
    /// Removes every matching child.
    DeleteMany(Criteria<C::Id>),
}

impl<C: Identifiable> ChildMutation<C> {
    fn operation(&self) -> Operation {
        match self {
            Self::Save(_) => Operation::SaveChild,
            Self::Update { .. } | Self::UpdateMany(_) => Operation::UpdateChild,
            Self::Delete(_) | Self::DeleteMany(_) => Operation::DeleteChild,
        }
    }
}

impl<T: CrudTypes> CrudService<T> {
    /// Applies `mutation` to a child collection of the parent `parent_id` and
    /// persists the parent through the update pipeline.
    ///
    /// Update hooks and the audit trail see the parent before and after the
    /// change. The reloaded parent is returned.
    pub async fn update_children<A: ChildAccessor<T>>(
        &self,
        parent_id: T::Id,
        accessor: &A,
        mutation: ChildMutation<A::Child>,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        let operation = mutation.operation();
        self.execute(operation, user, |tx| async move {
            let previous = self.resolve_one_by_id(tx, &parent_id, user).await?;
            let mut candidate = previous.clone();
            let children = accessor.children_mut(&mut candidate);
            let touched = apply_mutation::<T, A>(accessor, children, mutation)?;
            debug!(
                "{operation}, entity: {} {parent_id}, {} touched: {touched}",
                T::ENTITY,
                A::CHILD
            );
            self.update_in(tx, previous, candidate, user).await
        })
        .await
    }

    pub async fn save_child<A: ChildAccessor<T>>(
        &self,
        parent_id: T::Id,
        accessor: &A,
        child: A::Child,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        self.update_children(parent_id, accessor, ChildMutation::Save(vec![child]), user)
            .await
    }

    pub async fn save_children<A: ChildAccessor<T>>(
        &self,
        parent_id: T::Id,
        accessor: &A,
        children: Vec<A::Child>,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        self.update_children(parent_id, accessor, ChildMutation::Save(children), user)
            .await
    }

    pub async fn update_child_by_id<A: ChildAccessor<T>>(
        &self,
        parent_id: T::Id,
        accessor: &A,
        child_id: ChildId<T, A>,
        child: A::Child,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        let criteria = Criteria::by_id(child_id);
        let mutation = ChildMutation::Update { criteria, child };
        self.update_children(parent_id, accessor, mutation, user)
            .await
    }

    pub async fn update_child<A: ChildAccessor<T>>(
        &self,
        parent_id: T::Id,
        accessor: &A,
        criteria: Criteria<ChildId<T, A>>,
        child: A::Child,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        let mutation = ChildMutation::Update { criteria, child };
        self.update_children(parent_id, accessor, mutation, user)
            .await
    }

    pub async fn update_child_many<A: ChildAccessor<T>>(
        &self,
        parent_id: T::Id,
        accessor: &A,
        children: Vec<A::Child>,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        self.update_children(parent_id, accessor, ChildMutation::UpdateMany(children), user)
            .await
    }

    pub async fn delete_child_by_id<A: ChildAccessor<T>>(
        &self,
        parent_id: T::Id,
        accessor: &A,
        child_id: ChildId<T, A>,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        let criteria = Criteria::by_id(child_id);
        self.update_children(parent_id, accessor, ChildMutation::Delete(criteria), user)
            .await
    }

    pub async fn delete_child<A: ChildAccessor<T>>(
        &self,
        parent_id: T::Id,
        accessor: &A,
        criteria: Criteria<ChildId<T, A>>,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        self.update_children(parent_id, accessor, ChildMutation::Delete(criteria), user)
            .await
    }

    pub async fn delete_child_many<A: ChildAccessor<T>>(
        &self,
        parent_id: T::Id,
        accessor: &A,
        criteria: Criteria<ChildId<T, A>>,
        user: Option<&T::User>,
    ) -> Result<T::Dto> {
        self.update_children(parent_id, accessor, ChildMutation::DeleteMany(criteria), user)
            .await
    }
}

/// Applies `mutation` in place and returns the number of children touched.
fn apply_mutation<T, A>(
    accessor: &A,
    children: &mut Vec<A::Child>,
    mutation: ChildMutation<A::Child>,
) -> Result<usize>
where
    T: CrudTypes,
    A: ChildAccessor<T>,
{
    match mutation {
        ChildMutation::Save(incoming) => {
            if incoming.is_empty() {
                return Err(CrudError::bad_request(format!("no {} to save", A::CHILD)));
            }
            let count = incoming.len();
            for mut child in incoming {
                let id = match child.id().cloned() {
                    Some(id) => id,
                    None => {
                        let id = accessor.next_id();
                        child.set_id(id.clone());
                        id
                    }
                };
                if children.iter().any(|existing| existing.id() == Some(&id)) {
                    return Err(CrudError::bad_request(format!(
                        "{} {id} already exists",
                        A::CHILD
                    )));
                }
                children.push(child);
            }
            Ok(count)
        }
        ChildMutation::Update {
            criteria,
            mut child,
        } => {
            let position = first_match(children, &criteria)?
                .ok_or_else(|| CrudError::not_found(A::CHILD, &criteria))?;
            if let Some(id) = children[position].id() {
                child.set_id(id.clone());
            }
            children[position] = child;
            Ok(1)
        }
        ChildMutation::UpdateMany(incoming) => {
            let count = incoming.len();
            for child in incoming {
                let id = child.id().cloned().ok_or_else(|| {
                    CrudError::bad_request(format!("{} without identifier in batch", A::CHILD))
                })?;
                let slot = children
                    .iter_mut()
                    .find(|existing| existing.id() == Some(&id))
                    .ok_or_else(|| CrudError::not_found(A::CHILD, &id))?;
                *slot = child;
            }
            Ok(count)
        }
        ChildMutation::Delete(criteria) => {
            let position = first_match(children, &criteria)?
                .ok_or_else(|| CrudError::not_found(A::CHILD, &criteria))?;
            children.remove(position);
            Ok(1)
        }
        ChildMutation::DeleteMany(criteria) => {
            criteria.validate()?;
            let matched = children
                .iter()
                .map(|child| matches(&criteria, child))
                .collect::<Result<Vec<_>>>()?;
            let before = children.len();
            let mut flags = matched.into_iter();
            children.retain(|_| !flags.next().unwrap_or(false));
            let removed = before - children.len();
            if removed == 0 {
                return Err(CrudError::not_found(A::CHILD, &criteria));
            }
            Ok(removed)
        }
    }
}

fn first_match<C, Id>(children: &[C], criteria: &Criteria<Id>) -> Result<Option<usize>>
where
    C: Serialize,
    Id: EntityId,
{
    criteria.validate()?;
    for (position, child) in children.iter().enumerate() {
        if matches(criteria, child)? {
            return Ok(Some(position));
        }
    }
    Ok(None)
}

fn matches<C: Serialize, Id: EntityId>(criteria: &Criteria<Id>, child: &C) -> Result<bool> {
    Ok(criteria.matches_json(&serde_json::to_value(child)?))
}
