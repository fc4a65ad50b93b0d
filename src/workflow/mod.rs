/// Workflow Management Layer
///
/// This module handles workflow templates and their nested phases and tasks:
/// - Type definitions (Workflow, Phase, Task, FormTemplate)
/// - Field-level payload validation
/// - Transactional SQLite persistence with sqlx
/// - The role-checked service used by the HTTP layer

// Core workflow type definitions
pub mod types;

// Payload validation with per-field messages
pub mod validation;

// SQLite persistence and nested reconciliation
pub mod storage;

// Role checks and orchestration over storage
pub mod service;

// Re-export commonly used types
pub use service::WorkflowService;
pub use storage::WorkflowStorage;
pub use types::{FormField, FormTemplate, Phase, Priority, Task, Workflow};
