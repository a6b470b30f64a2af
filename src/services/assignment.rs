//! Admin-initiated task assignment. `assigned_by` records the admin acting
//! on behalf of a different owner; it is never set for self-owned work.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::Principal;
use crate::db;
use crate::error::AppError;
use crate::models::{NewTaskRequest, Task};

pub async fn assign_task(
    db: &SqlitePool,
    principal: &Principal,
    target_user_id: Uuid,
    req: NewTaskRequest,
) -> Result<Task, AppError> {
    if !principal.is_admin() {
        return Err(AppError::Forbidden);
    }

    let target = db::users::find_user_by_id(db, target_user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let assigned_by = (target.id != principal.id).then_some(principal.id);
    db::tasks::create_task(db, target.id, assigned_by, req).await
}

/// Resolve a requested owner change on an existing task. Returns the
/// `(new_owner, acting_admin)` pair the store needs, or `None` when the
/// owner is unchanged or absent from the patch.
pub async fn resolve_reassignment(
    db: &SqlitePool,
    principal: &Principal,
    current: &Task,
    requested: Option<Uuid>,
) -> Result<Option<(Uuid, Uuid)>, AppError> {
    match requested {
        None => Ok(None),
        Some(new_owner) if new_owner == current.user_id => Ok(None),
        Some(new_owner) => {
            if !principal.is_admin() {
                return Err(AppError::Forbidden);
            }
            db::users::find_user_by_id(db, new_owner)
                .await?
                .ok_or(AppError::NotFound)?;
            Ok(Some((new_owner, principal.id)))
        }
    }
}
