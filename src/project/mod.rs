/// Project references
///
/// Projects are managed by another part of the product; here they only guard
/// workflow deletion and feed the project counts shown in listings.

pub mod storage;
pub mod types;

pub use storage::ProjectStorage;
pub use types::Project;
