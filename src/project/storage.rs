/// Project rows referencing workflows
///
/// A workflow with at least one referencing project cannot be deleted
/// through the single-delete path.

use crate::{database::now_timestamp, error::AppResult, project::types::Project};
use sqlx::sqlite::SqlitePool;

#[derive(Debug, Clone)]
pub struct ProjectStorage {
    pool: SqlitePool,
}

impl ProjectStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a project built from `workflow_id`
    pub async fn create(&self, name: &str, workflow_id: &str) -> AppResult<Project> {
        let project = Project {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            workflow_id: Some(workflow_id.to_string()),
            created_at: now_timestamp(),
        };

        sqlx::query("INSERT INTO projects (id, name, workflow_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(&project.id)
            .bind(&project.name)
            .bind(&project.workflow_id)
            .bind(&project.created_at)
            .execute(&self.pool)
            .await?;

        tracing::info!("📦 Project {} created from workflow {}", project.id, workflow_id);
        Ok(project)
    }

    pub async fn get(&self, id: &str) -> AppResult<Option<Project>> {
        let project = sqlx::query_as::<_, (String, String, Option<String>, String)>(
            "SELECT id, name, workflow_id, created_at FROM projects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(|(id, name, workflow_id, created_at)| Project {
            id,
            name,
            workflow_id,
            created_at,
        });
        Ok(project)
    }

    /// Number of projects referencing a workflow
    pub async fn count_for_workflow(&self, workflow_id: &str) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE workflow_id = ?")
            .bind(workflow_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
