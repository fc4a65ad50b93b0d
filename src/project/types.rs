/// Project type definitions
///
/// Projects are instantiated from workflow templates elsewhere; this service
/// only needs to know which workflow a project was built from.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Source workflow; cleared when that workflow is bulk-deleted
    pub workflow_id: Option<String>,
    pub created_at: String,
}
