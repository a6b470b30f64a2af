//! Task store. The store, not the caller, keeps the derived fields
//! consistent: `completed_at` is recomputed on every write so that it is
//! non-null exactly when the status is completed, and the status/completed_at
//! pair is always written in a single statement.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewTaskRequest, Task, TaskStatus, UpdateTaskRequest};
use crate::validation;

pub(crate) const TASK_COLUMNS: &str = "id, title, description, due_date, category, priority, status, \
     user_id, assigned_by, completed_at, created_at, updated_at";

pub async fn create_task(
    db: &SqlitePool,
    owner: Uuid,
    assigned_by: Option<Uuid>,
    req: NewTaskRequest,
) -> Result<Task, AppError> {
    let title = req.title.trim().to_string();
    validation::validate_task_fields(&title, req.description.as_deref())?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    let status = req.status.unwrap_or_default();
    let category = req.category.unwrap_or_default();
    let priority = req.priority.unwrap_or_default();
    let completed_at = matches!(status, TaskStatus::Completed).then_some(now);

    sqlx::query(
        "INSERT INTO tasks (id, title, description, due_date, category, priority, status, \
         user_id, assigned_by, completed_at, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&title)
    .bind(&req.description)
    .bind(req.due_date)
    .bind(category)
    .bind(priority)
    .bind(status)
    .bind(owner)
    .bind(assigned_by)
    .bind(completed_at)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    Ok(Task {
        id,
        title,
        description: req.description,
        due_date: req.due_date,
        category,
        priority,
        status,
        user_id: owner,
        assigned_by,
        completed_at,
        created_at: now,
        updated_at: now,
    })
}

pub async fn find_task_by_id(db: &SqlitePool, id: Uuid) -> Result<Option<Task>, AppError> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?");
    let task = sqlx::query_as::<_, Task>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(task)
}

/// Field-level upsert: only supplied fields change. `reassign` carries
/// `(new_owner, acting_admin)` when an admin moves the task to another user.
pub async fn update_task(
    db: &SqlitePool,
    id: Uuid,
    req: UpdateTaskRequest,
    reassign: Option<(Uuid, Uuid)>,
) -> Result<Option<Task>, AppError> {
    let mut current = match find_task_by_id(db, id).await? {
        Some(t) => t,
        None => return Ok(None),
    };

    if let Some(title) = req.title {
        current.title = title.trim().to_string();
    }
    if let Some(description) = req.description {
        current.description = Some(description);
    }
    if let Some(due_date) = req.due_date {
        current.due_date = due_date;
    }
    if let Some(category) = req.category {
        current.category = category;
    }
    if let Some(priority) = req.priority {
        current.priority = priority;
    }
    if let Some(status) = req.status {
        current.status = status;
    }
    if let Some((new_owner, admin)) = reassign {
        current.user_id = new_owner;
        current.assigned_by = Some(admin);
    }

    validation::validate_task_fields(&current.title, current.description.as_deref())?;

    let now = Utc::now();
    current.completed_at = if current.status == TaskStatus::Completed {
        // Stamp once on the transition in; keep the original afterwards.
        Some(current.completed_at.unwrap_or(now))
    } else {
        None
    };
    current.updated_at = now;

    sqlx::query(
        "UPDATE tasks SET title = ?, description = ?, due_date = ?, category = ?, \
         priority = ?, status = ?, user_id = ?, assigned_by = ?, completed_at = ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(&current.title)
    .bind(&current.description)
    .bind(current.due_date)
    .bind(current.category)
    .bind(current.priority)
    .bind(current.status)
    .bind(current.user_id)
    .bind(current.assigned_by)
    .bind(current.completed_at)
    .bind(current.updated_at)
    .bind(id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

pub async fn delete_task(db: &SqlitePool, id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
