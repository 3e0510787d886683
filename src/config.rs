use serde::{Deserialize, Serialize};

/// How a batch of writes reaches the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchWriteMode {
    /// One bulk gateway call for the whole batch.
    #[default]
    Bulk,
    /// One gateway call per element.
    PerItem,
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fan-out width for per-element batch stages
    pub batch_concurrency: usize,

    /// Persistence strategy of `update_many`
    pub update_many_mode: BatchWriteMode,

    /// Persistence strategy of `delete_all`
    pub delete_all_mode: BatchWriteMode,

    /// Append audit entries to audit-capable DTOs
    pub audit_enabled: bool,

    /// Run the unique-field dedupe check before inserts
    pub safe_save_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self {
            batch_concurrency: 16,
            update_many_mode: BatchWriteMode::Bulk,
            delete_all_mode: BatchWriteMode::PerItem,
            audit_enabled: true,
            safe_save_enabled: true,
        }
    }

    /// Set the fan-out width (clamped to at least 1)
    pub fn batch_concurrency(mut self, width: usize) -> Self {
        self.batch_concurrency = width.max(1);
        self
    }

    pub fn update_many_mode(mut self, mode: BatchWriteMode) -> Self {
        self.update_many_mode = mode;
        self
    }

    pub fn delete_all_mode(mut self, mode: BatchWriteMode) -> Self {
        self.delete_all_mode = mode;
        self
    }

    pub fn audit_enabled(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }

    pub fn safe_save_enabled(mut self, enabled: bool) -> Self {
        self.safe_save_enabled = enabled;
        self
    }

    /// Effective fan-out width; deserialized configs may carry 0.
    pub fn concurrency(&self) -> usize {
        self.batch_concurrency.max(1)
    }
}
