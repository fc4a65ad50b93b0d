/// Field-level validation of workflow payloads
///
/// All problems are collected before failing so the client sees every bad
/// field at once. Field paths look like `phases[0].tasks[1].name`.

use crate::{
    error::{AppError, AppResult, FieldError},
    workflow::types::{
        CreateWorkflowInput, FormTemplate, ListQuery, PhaseInput, TaskInput, UpdateWorkflowInput,
    },
};

/// Largest page size a listing may request
pub const MAX_PAGE_LIMIT: i64 = 100;
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

#[derive(Debug, Default)]
struct Errors(Vec<FieldError>);

impl Errors {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    fn finish(self) -> AppResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }
}

pub fn validate_create(input: &CreateWorkflowInput) -> AppResult<()> {
    let mut errors = Errors::default();
    if input.name.trim().is_empty() {
        errors.push("name", "Name is required");
    }
    check_phases(&input.phases, &mut errors);
    errors.finish()
}

pub fn validate_update(input: &UpdateWorkflowInput) -> AppResult<()> {
    let mut errors = Errors::default();
    if let Some(name) = &input.name {
        if name.trim().is_empty() {
            errors.push("name", "Name is required");
        }
    }
    if let Some(phases) = &input.phases {
        check_phases(phases, &mut errors);
    }
    errors.finish()
}

/// Resolve listing parameters to `(page, limit, search)`
pub fn resolve_list_query(query: &ListQuery) -> AppResult<(i64, i64, String)> {
    let mut errors = Errors::default();

    let page = query.page.unwrap_or(1);
    if page < 1 {
        errors.push("page", "Page must be at least 1");
    }
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        errors.push("limit", format!("Limit must be between 1 and {MAX_PAGE_LIMIT}"));
    }

    errors.finish()?;
    Ok((page, limit, query.search.clone().unwrap_or_default()))
}

fn check_phases(phases: &[PhaseInput], errors: &mut Errors) {
    for (i, phase) in phases.iter().enumerate() {
        let path = format!("phases[{i}]");
        if phase.name.trim().is_empty() {
            errors.push(format!("{path}.name"), "Phase name is required");
        }
        if phase.order < 0 {
            errors.push(format!("{path}.order"), "Order must be a non-negative integer");
        }
        if let Some(id) = &phase.id {
            if id.is_empty() {
                errors.push(format!("{path}.id"), "Phase id must not be empty");
            }
        }
        for (j, task) in phase.tasks.iter().enumerate() {
            check_task(task, &format!("{path}.tasks[{j}]"), errors);
        }
    }
}

fn check_task(task: &TaskInput, path: &str, errors: &mut Errors) {
    if task.name.trim().is_empty() {
        errors.push(format!("{path}.name"), "Task name is required");
    }
    if let Some(hours) = task.man_hours {
        if !hours.is_finite() || hours < 0.0 {
            errors.push(format!("{path}.manHours"), "Man-hours must be a non-negative number");
        }
    }
    if let Some(template) = &task.form_template {
        check_form_template(template, &format!("{path}.formTemplate"), errors);
    }
}

fn check_form_template(template: &FormTemplate, path: &str, errors: &mut Errors) {
    for (k, field) in template.fields.iter().enumerate() {
        let field_path = format!("{path}.fields[{k}]");
        if field.field_type.trim().is_empty() {
            errors.push(format!("{field_path}.type"), "Field type is required");
        }
        if field.label.trim().is_empty() {
            errors.push(format!("{field_path}.label"), "Field label is required");
        }
        if let Some(options) = &field.options {
            if options.iter().any(|o| o.trim().is_empty()) {
                errors.push(format!("{field_path}.options"), "Options must not be empty");
            }
        }
    }
}
