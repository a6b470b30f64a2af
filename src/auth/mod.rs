pub mod password;
pub mod token;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::models::{Role, Task, User};
use crate::state::AppState;

pub use password::{Argon2Hasher, PasswordHasher};
pub use token::{Claims, JwtIssuer, TokenIssuer};

/// The acting identity of a request, resolved from a credential before any
/// core call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub is_active: bool,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

/// Authorization predicate: admins may perform any operation on any task;
/// everyone else only on tasks they own. Evaluated before every mutation and
/// single-task read. List queries are scoped by construction instead.
pub fn can_access(principal: &Principal, task: &Task, _operation: Operation) -> bool {
    principal.is_admin() || task.user_id == principal.id
}

/// Whether `principal` may create a task owned by `owner_id`.
pub fn can_create_for(principal: &Principal, owner_id: Uuid) -> bool {
    principal.is_admin() || owner_id == principal.id
}

/// Extractor resolving the bearer token to the authenticated user.
/// Deactivated accounts are rejected.
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.0.id,
            role: self.0.role,
            is_active: self.0.is_active,
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?;

        let claims = state.tokens.verify(token)?;

        let user = db::users::find_user_by_id(&state.db, claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !user.is_active {
            return Err(AppError::Unauthorized);
        }

        Ok(CurrentUser(user))
    }
}

/// Extractor that additionally requires the admin role.
pub struct AdminUser(pub User);

impl AdminUser {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.0.id,
            role: self.0.role,
            is_active: self.0.is_active,
        }
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskCategory, TaskPriority, TaskStatus};
    use chrono::Utc;

    fn principal(role: Role) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role,
            is_active: true,
        }
    }

    fn task_owned_by(owner: Uuid) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            description: None,
            due_date: now,
            category: TaskCategory::Personal,
            priority: TaskPriority::Medium,
            status: TaskStatus::Pending,
            user_id: owner,
            assigned_by: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn admin_can_do_anything() {
        let admin = principal(Role::Admin);
        let task = task_owned_by(Uuid::new_v4());
        for op in [Operation::Read, Operation::Update, Operation::Delete] {
            assert!(can_access(&admin, &task, op));
        }
        assert!(can_create_for(&admin, Uuid::new_v4()));
    }

    #[test]
    fn owner_controls_own_tasks_only() {
        let user = principal(Role::User);
        let own = task_owned_by(user.id);
        let other = task_owned_by(Uuid::new_v4());

        assert!(can_access(&user, &own, Operation::Read));
        assert!(can_access(&user, &own, Operation::Delete));
        assert!(!can_access(&user, &other, Operation::Read));
        assert!(!can_access(&user, &other, Operation::Update));
        assert!(can_create_for(&user, user.id));
        assert!(!can_create_for(&user, other.user_id));
    }
}
