pub mod criteria;
pub mod error;
pub mod types;

pub use criteria::Criteria;
pub use error::{CrudError, Result};
pub use types::{Actor, CrudDto, CrudTypes, EntityId, Identifiable, User};
