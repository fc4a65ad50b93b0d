/// projectflow: workflow template management for project teams
///
/// This library provides role-gated CRUD over reusable workflow templates made
/// of ordered phases and tasks, with cookie-based token authentication.

// Core configuration and setup
pub mod config;

// Error taxonomy and HTTP mapping
pub mod error;

// SQLite pool and schema
pub mod database;

// Users, password hashing, tokens and roles
pub mod auth;

// Route authorization gate (runs before every handler)
pub mod gate;

// Projects referencing workflows (deletion guard)
pub mod project;

// Workflow management layer - types, validation, storage and service
pub mod workflow;

// HTTP API layer - auth and workflow endpoints plus landing pages
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use auth::{Identity, Role};
pub use error::{AppError, AppResult};
pub use server::start_server;
pub use workflow::{Phase, Task, Workflow};
