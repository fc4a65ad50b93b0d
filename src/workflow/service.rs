/// Workflow reconciliation service
///
/// Role checks and validation in front of `WorkflowStorage`. Creating and
/// updating need MANAGER (or above); deleting needs ADMIN. Reading is open to
/// any authenticated caller.

use crate::{
    auth::{Identity, Role},
    error::{AppError, AppResult},
    workflow::{
        storage::WorkflowStorage,
        types::{CreateWorkflowInput, ListQuery, UpdateWorkflowInput, Workflow, WorkflowPage},
        validation::{resolve_list_query, validate_create, validate_update},
    },
};

#[derive(Debug, Clone)]
pub struct WorkflowService {
    storage: WorkflowStorage,
}

impl WorkflowService {
    pub fn new(storage: WorkflowStorage) -> Self {
        Self { storage }
    }

    pub async fn list(&self, query: &ListQuery) -> AppResult<WorkflowPage> {
        let (page, limit, search) = resolve_list_query(query)?;
        self.storage.list(page, limit, &search).await
    }

    pub async fn get(&self, id: &str) -> AppResult<Workflow> {
        self.storage
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workflow {id}")))
    }

    pub async fn create(&self, actor: &Identity, input: CreateWorkflowInput) -> AppResult<Workflow> {
        actor.require(Role::Manager)?;
        validate_create(&input)?;

        let workflow = self.storage.create(&input, Some(&actor.id)).await?;
        tracing::info!(
            "🔥 Created workflow {} ({}) with {} phases by {}",
            workflow.id,
            workflow.name,
            workflow.phases.len(),
            actor.email
        );
        Ok(workflow)
    }

    pub async fn update(
        &self,
        actor: &Identity,
        id: &str,
        input: UpdateWorkflowInput,
    ) -> AppResult<Workflow> {
        actor.require(Role::Manager)?;
        validate_update(&input)?;

        let workflow = self.storage.update(id, &input).await?;
        tracing::info!("Updated workflow {} ({}) by {}", workflow.id, workflow.name, actor.email);
        Ok(workflow)
    }

    pub async fn delete(&self, actor: &Identity, id: &str) -> AppResult<()> {
        actor.require(Role::Admin)?;

        self.storage.delete_guarded(id).await?;
        tracing::info!("Deleted workflow {} by {}", id, actor.email);
        Ok(())
    }

    /// Remove all listed workflows; ids that match nothing are ignored
    pub async fn bulk_delete(&self, actor: &Identity, ids: &[String]) -> AppResult<u64> {
        actor.require(Role::Admin)?;

        let removed = self.storage.delete_many(ids).await?;
        tracing::info!("Bulk-deleted {} of {} workflows by {}", removed, ids.len(), actor.email);
        Ok(removed)
    }
}
