/// SQLite persistence layer for workflow graphs
///
/// Workflows, phases and tasks live in three tables linked by cascading
/// foreign keys. Every multi-statement write runs inside one transaction:
/// either the whole change commits or none of it does. Concurrent updates of
/// the same workflow are not coordinated beyond that; the last commit wins.

use crate::{
    database::{now_timestamp, search_key},
    error::{AppError, AppResult},
    workflow::types::{
        CreateWorkflowInput, FormTemplate, Pagination, Phase, PhaseInput, Task, TaskInput,
        UpdateWorkflowInput, Workflow, WorkflowPage, WorkflowSummary,
    },
};
use sqlx::{
    sqlite::{SqlitePool, SqliteRow},
    QueryBuilder, Row, Sqlite, SqliteConnection,
};
use std::collections::HashMap;

/// SQLite-based workflow storage manager
#[derive(Debug, Clone)]
pub struct WorkflowStorage {
    pool: SqlitePool,
}

impl WorkflowStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a workflow with all of its phases and tasks
    pub async fn create(
        &self,
        input: &CreateWorkflowInput,
        created_by_id: Option<&str>,
    ) -> AppResult<Workflow> {
        let mut tx = self.pool.begin().await?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();
        let metadata = input.metadata.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO workflows
                (id, name, name_search, description, version, is_active, metadata, created_by_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, 1, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(search_key(&input.name))
        .bind(&input.description)
        .bind(&metadata)
        .bind(created_by_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for phase in &input.phases {
            insert_phase(&mut tx, &id, phase).await?;
        }

        let workflow = fetch_graph(&mut tx, &id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("workflow {id} vanished after insert")))?;
        tx.commit().await?;

        Ok(workflow)
    }

    /// Load a full workflow graph
    pub async fn get(&self, id: &str) -> AppResult<Option<Workflow>> {
        let mut conn = self.pool.acquire().await?;
        fetch_graph(&mut conn, id).await
    }

    /// Reconcile a workflow with the submitted state
    ///
    /// Scalar fields change only when supplied. A supplied phase list is the
    /// complete desired state: unlisted phases are deleted, listed phases with
    /// an id are rewritten, phases without an id are created. A rewritten
    /// phase always gets its task list replaced wholesale, so task ids never
    /// survive an update.
    pub async fn update(&self, id: &str, input: &UpdateWorkflowInput) -> AppResult<Workflow> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Err(AppError::NotFound(format!("Workflow {id}")));
        }

        sqlx::query(
            r#"
            UPDATE workflows SET
                name = COALESCE(?, name),
                name_search = COALESCE(?, name_search),
                description = COALESCE(?, description),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.name.as_deref().map(search_key))
        .bind(&input.description)
        .bind(now_timestamp())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(phases) = &input.phases {
            let existing: Vec<String> =
                sqlx::query_scalar("SELECT id FROM phases WHERE workflow_id = ?")
                    .bind(id)
                    .fetch_all(&mut *tx)
                    .await?;

            let keep: Vec<&str> = phases.iter().filter_map(|p| p.id.as_deref()).collect();
            for stale in existing.iter().filter(|e| !keep.contains(&e.as_str())) {
                sqlx::query("DELETE FROM phases WHERE id = ?")
                    .bind(stale)
                    .execute(&mut *tx)
                    .await?;
            }

            for (index, phase) in phases.iter().enumerate() {
                match &phase.id {
                    Some(phase_id) if existing.contains(phase_id) => {
                        sqlx::query(
                            r#"UPDATE phases SET name = ?, "order" = ?, updated_at = ? WHERE id = ?"#,
                        )
                        .bind(phase.name.trim())
                        .bind(phase.order)
                        .bind(now_timestamp())
                        .bind(phase_id)
                        .execute(&mut *tx)
                        .await?;

                        replace_phase_tasks(&mut tx, phase_id, &phase.tasks).await?;
                    }
                    Some(phase_id) => {
                        // Dropping the transaction rolls back everything done so far
                        return Err(AppError::invalid(
                            format!("phases[{index}].id"),
                            format!("Phase {phase_id} does not belong to this workflow"),
                        ));
                    }
                    None => insert_phase(&mut tx, id, phase).await?,
                }
            }
        }

        let workflow = fetch_graph(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workflow {id}")))?;
        tx.commit().await?;

        Ok(workflow)
    }

    /// Delete one workflow unless a project still references it
    pub async fn delete_guarded(&self, id: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Err(AppError::NotFound(format!("Workflow {id}")));
        }

        let projects = count_projects(&mut tx, id).await?;
        if projects > 0 {
            return Err(AppError::Conflict(
                "Cannot delete workflow with associated projects".to_string(),
            ));
        }

        sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    /// Delete every listed workflow, without checking project references
    ///
    /// Projects pointing at a removed workflow keep existing with a null
    /// workflow reference. Returns the number of workflows removed.
    pub async fn delete_many(&self, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM workflows WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// One page of workflows whose name contains `search`, ignoring case
    ///
    /// Newest changes first. Pages past the end come back empty.
    pub async fn list(&self, page: i64, limit: i64, search: &str) -> AppResult<WorkflowPage> {
        let needle = search_key(search);
        let offset = (page - 1).saturating_mul(limit);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM workflows WHERE instr(name_search, ?) > 0",
        )
        .bind(&needle)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(
            r#"
            SELECT w.id, w.name, w.description, w.version, w.is_active, w.created_by_id,
                   w.created_at, w.updated_at,
                   (SELECT COUNT(*) FROM phases p WHERE p.workflow_id = w.id) AS phase_count,
                   (SELECT COUNT(*) FROM projects pr WHERE pr.workflow_id = w.id) AS project_count
            FROM workflows w
            WHERE instr(w.name_search, ?) > 0
            ORDER BY w.updated_at DESC, w.rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&needle)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let workflows = rows
            .iter()
            .map(|row| {
                Ok(WorkflowSummary {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                    version: row.try_get("version")?,
                    is_active: row.try_get("is_active")?,
                    created_by_id: row.try_get("created_by_id")?,
                    created_at: row.try_get("created_at")?,
                    updated_at: row.try_get("updated_at")?,
                    phase_count: row.try_get("phase_count")?,
                    project_count: row.try_get("project_count")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(WorkflowPage {
            workflows,
            pagination: Pagination {
                total,
                pages: (total + limit - 1) / limit,
                page,
                limit,
            },
        })
    }
}

async fn count_projects(conn: &mut SqliteConnection, workflow_id: &str) -> AppResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE workflow_id = ?")
        .bind(workflow_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

async fn insert_phase(
    conn: &mut SqliteConnection,
    workflow_id: &str,
    phase: &PhaseInput,
) -> AppResult<()> {
    let phase_id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();

    sqlx::query(
        r#"
        INSERT INTO phases (id, workflow_id, name, "order", created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&phase_id)
    .bind(workflow_id)
    .bind(phase.name.trim())
    .bind(phase.order)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    insert_tasks(conn, &phase_id, &phase.tasks).await
}

/// Drop every task of a phase and insert `tasks` as new rows
async fn replace_phase_tasks(
    conn: &mut SqliteConnection,
    phase_id: &str,
    tasks: &[TaskInput],
) -> AppResult<()> {
    sqlx::query("DELETE FROM tasks WHERE phase_id = ?")
        .bind(phase_id)
        .execute(&mut *conn)
        .await?;

    insert_tasks(conn, phase_id, tasks).await
}

async fn insert_tasks(
    conn: &mut SqliteConnection,
    phase_id: &str,
    tasks: &[TaskInput],
) -> AppResult<()> {
    for task in tasks {
        let now = now_timestamp();
        let form_template = task
            .form_template
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO tasks
                (id, phase_id, name, description, priority, man_hours, form_template, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(phase_id)
        .bind(task.name.trim())
        .bind(&task.description)
        .bind(task.priority.as_str())
        .bind(task.man_hours)
        .bind(&form_template)
        .bind(&now)
        .bind(&now)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Read a workflow with phases by `order` and tasks by creation time
async fn fetch_graph(conn: &mut SqliteConnection, id: &str) -> AppResult<Option<Workflow>> {
    let Some(row) = sqlx::query(
        r#"
        SELECT id, name, description, version, is_active, metadata, created_by_id,
               created_at, updated_at,
               (SELECT COUNT(*) FROM projects pr WHERE pr.workflow_id = workflows.id) AS project_count
        FROM workflows WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let task_rows = sqlx::query(
        r#"
        SELECT t.id, t.phase_id, t.name, t.description, t.priority, t.man_hours,
               t.form_template, t.created_at, t.updated_at
        FROM tasks t JOIN phases p ON p.id = t.phase_id
        WHERE p.workflow_id = ?
        ORDER BY t.created_at ASC, t.rowid ASC
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let mut tasks_by_phase: HashMap<String, Vec<Task>> = HashMap::new();
    for task_row in &task_rows {
        let task = task_from_row(task_row)?;
        tasks_by_phase.entry(task.phase_id.clone()).or_default().push(task);
    }

    let phase_rows = sqlx::query(
        r#"
        SELECT id, workflow_id, name, "order", created_at, updated_at
        FROM phases WHERE workflow_id = ?
        ORDER BY "order" ASC, created_at ASC, rowid ASC
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let mut phases = Vec::with_capacity(phase_rows.len());
    for phase_row in &phase_rows {
        let phase_id: String = phase_row.try_get("id")?;
        phases.push(Phase {
            tasks: tasks_by_phase.remove(&phase_id).unwrap_or_default(),
            id: phase_id,
            workflow_id: phase_row.try_get("workflow_id")?,
            name: phase_row.try_get("name")?,
            order: phase_row.try_get("order")?,
            created_at: phase_row.try_get("created_at")?,
            updated_at: phase_row.try_get("updated_at")?,
        });
    }

    let metadata: Option<String> = row.try_get("metadata")?;
    Ok(Some(Workflow {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        version: row.try_get("version")?,
        is_active: row.try_get("is_active")?,
        metadata: metadata.as_deref().map(serde_json::from_str).transpose()?,
        created_by_id: row.try_get("created_by_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        phases,
        project_count: row.try_get("project_count")?,
    }))
}

fn task_from_row(row: &SqliteRow) -> AppResult<Task> {
    let priority: String = row.try_get("priority")?;
    let form_template: Option<String> = row.try_get("form_template")?;
    Ok(Task {
        id: row.try_get("id")?,
        phase_id: row.try_get("phase_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        priority: priority.parse().map_err(AppError::Internal)?,
        man_hours: row.try_get("man_hours")?,
        form_template: form_template
            .as_deref()
            .map(serde_json::from_str::<FormTemplate>)
            .transpose()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
