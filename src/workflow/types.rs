/// Core workflow type definitions
///
/// A workflow is a reusable template: ordered phases, each holding tasks.
/// Stored types are what the API returns; `*Input` types are what callers
/// send when creating or reconciling a workflow.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Task urgency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            "CRITICAL" => Ok(Priority::Critical),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Structured input form attached to a task
///
/// Describes the dynamic fields a user fills in when working the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormTemplate {
    pub fields: Vec<FormField>,
}

/// One input field of a form template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    /// Input kind, e.g. "text", "number", "select"
    #[serde(rename = "type")]
    pub field_type: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Choices for select-like fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub phase_id: String,
    pub name: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub man_hours: Option<f64>,
    pub form_template: Option<FormTemplate>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub id: String,
    pub workflow_id: String,
    pub name: String,
    pub order: i64,
    /// Tasks in creation order
    pub tasks: Vec<Task>,
    pub created_at: String,
    pub updated_at: String,
}

/// A complete workflow graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub version: i64,
    pub is_active: bool,
    pub metadata: Option<Value>,
    pub created_by_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Phases by ascending `order`
    pub phases: Vec<Phase>,
    /// Projects currently built from this workflow
    pub project_count: i64,
}

/// Workflow row as shown in listings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub version: i64,
    pub is_active: bool,
    pub created_by_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub phase_count: i64,
    pub project_count: i64,
}

/// Task as submitted by a caller
///
/// An `id` may be echoed back by clients but is ignored: tasks are always
/// recreated when their phase is written.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub man_hours: Option<f64>,
    #[serde(default)]
    pub form_template: Option<FormTemplate>,
}

/// Phase as submitted by a caller; `id` names an existing phase to rewrite
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseInput {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub order: i64,
    #[serde(default)]
    pub tasks: Vec<TaskInput>,
}

/// Body of a workflow creation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub phases: Vec<PhaseInput>,
}

/// Body of a workflow update request
///
/// When `phases` is present it is the complete desired phase list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkflowInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub phases: Option<Vec<PhaseInput>>,
}

/// Body of a bulk delete request
#[derive(Debug, Clone, Deserialize)]
pub struct BulkDeleteInput {
    pub ids: Vec<String>,
}

/// Listing parameters, 1-indexed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub pages: i64,
    pub page: i64,
    pub limit: i64,
}

/// One page of workflow summaries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowPage {
    pub workflows: Vec<WorkflowSummary>,
    pub pagination: Pagination,
}
