// ============================================================================
// crud_pipeline Library
// ============================================================================
//
// Reusable application-layer mutation pipeline: save, update, JSON Patch edit
// and delete (single and batch) with a hook lifecycle, audit trail, batch
// reconciliation and safe-save dedupe. Storage and transports plug in through
// the `Repository` and `DomainMapper` traits.
//
// ============================================================================

//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use crud_pipeline::{
//!     CrudDto, CrudService, CrudTypes, Identifiable, InMemoryRepository, SerdeMapper, User,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Task {
//!     id: Option<u64>,
//!     title: String,
//! }
//!
//! impl Identifiable for Task {
//!     type Id = u64;
//!
//!     fn id(&self) -> Option<&u64> {
//!         self.id.as_ref()
//!     }
//!
//!     fn set_id(&mut self, id: u64) {
//!         self.id = Some(id);
//!     }
//! }
//!
//! impl CrudDto for Task {}
//!
//! struct Tasks;
//!
//! impl CrudTypes for Tasks {
//!     const ENTITY: &'static str = "task";
//!     type Id = u64;
//!     type User = User;
//!     type Domain = Task;
//!     type Dto = Task;
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> crud_pipeline::Result<()> {
//! let service = CrudService::<Tasks>::new(
//!     Arc::new(InMemoryRepository::<Tasks>::new()),
//!     Arc::new(SerdeMapper::<Tasks>::new()),
//! );
//! let task = Task { id: None, title: "write docs".to_string() };
//! let saved = service.save(task, None).await?;
//! assert_eq!(saved.id, Some(1));
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod core;
pub mod gateway;
pub mod hooks;
pub mod mapper;
pub mod metrics;
pub mod patch;
pub mod service;

pub use audit::{AuditAction, AuditAugmenter, AuditEntry, Clock, SystemClock};
pub use config::{BatchWriteMode, PipelineConfig};
pub use crate::core::{
    Actor, Criteria, CrudDto, CrudError, CrudTypes, EntityId, Identifiable, Result, User,
};
pub use gateway::{GeneratedId, InMemoryRepository, Repository, TransactionId, WriteCounts};
pub use hooks::{HookRegistry, LifecycleHooks, MutationHooks, NoopHooks};
pub use mapper::{DomainMapper, SerdeMapper};
pub use metrics::{Operation, OperationMetrics, OperationStats};
pub use patch::{JsonPatch, JsonPointer, PatchError, PatchOperation};
pub use service::{ChildAccessor, ChildMutation, CrudService, Reconciled, reconcile};
