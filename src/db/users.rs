//! Identity store: user accounts, roles, activation. Accounts are never
//! hard-deleted; deactivation flips `is_active` and the last-active-admin
//! invariant blocks changes that would leave zero admins.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::auth::PasswordHasher;
use crate::error::AppError;
use crate::models::{AdminUserUpdate, RegisterRequest, Role, UpdateProfileRequest, User};
use crate::validation;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, is_active, \
     last_login_at, avatar_url, created_at, updated_at";

pub async fn create_user(
    db: &SqlitePool,
    hasher: &dyn PasswordHasher,
    req: RegisterRequest,
    role: Role,
) -> Result<User, AppError> {
    validation::validate_registration(&req)?;

    if username_exists(db, &req.username, None).await? {
        return Err(AppError::Conflict("Username is already taken".to_string()));
    }
    if email_exists(db, &req.email, None).await? {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }

    let password_hash = hasher.hash(&req.password)?;
    let id = Uuid::new_v4();
    let now = Utc::now();

    info!("creating user {}", req.username);

    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role, is_active, \
         last_login_at, avatar_url, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, 1, NULL, NULL, ?, ?)",
    )
    .bind(id)
    .bind(&req.username)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(role)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    Ok(User {
        id,
        username: req.username,
        email: req.email,
        password_hash,
        role,
        is_active: true,
        last_login_at: None,
        avatar_url: None,
        created_at: now,
        updated_at: now,
    })
}

pub async fn find_user_by_id(db: &SqlitePool, id: Uuid) -> Result<Option<User>, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

pub async fn find_user_by_username_or_email(
    db: &SqlitePool,
    username_or_email: &str,
) -> Result<Option<User>, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ? OR email = ?");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(username_or_email)
        .bind(username_or_email)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

pub async fn list_users(db: &SqlitePool) -> Result<Vec<User>, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, rowid DESC");
    let users = sqlx::query_as::<_, User>(&sql).fetch_all(db).await?;
    Ok(users)
}

pub async fn count_users(db: &SqlitePool) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await?;
    Ok(count)
}

pub async fn username_exists(
    db: &SqlitePool,
    username: &str,
    exclude: Option<Uuid>,
) -> Result<bool, AppError> {
    let count: i64 = match exclude {
        Some(id) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ? AND id != ?")
                .bind(username)
                .bind(id)
                .fetch_one(db)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
                .bind(username)
                .fetch_one(db)
                .await?
        }
    };
    Ok(count > 0)
}

pub async fn email_exists(
    db: &SqlitePool,
    email: &str,
    exclude: Option<Uuid>,
) -> Result<bool, AppError> {
    let count: i64 = match exclude {
        Some(id) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(id)
                .fetch_one(db)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
                .bind(email)
                .fetch_one(db)
                .await?
        }
    };
    Ok(count > 0)
}

/// Active admins other than `exclude`. Zero means `exclude` is the last one.
pub async fn count_active_admins_excluding(
    db: &SqlitePool,
    exclude: Uuid,
) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE role = 'admin' AND is_active = 1 AND id != ?",
    )
    .bind(exclude)
    .fetch_one(db)
    .await?;
    Ok(count)
}

pub async fn record_login(db: &SqlitePool, mut user: User) -> Result<User, AppError> {
    let now = Utc::now();
    sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(user.id)
        .execute(db)
        .await?;
    user.last_login_at = Some(now);
    user.updated_at = now;
    Ok(user)
}

pub async fn update_profile(
    db: &SqlitePool,
    id: Uuid,
    req: UpdateProfileRequest,
) -> Result<User, AppError> {
    let mut current = find_user_by_id(db, id).await?.ok_or(AppError::NotFound)?;

    if let Some(email) = req.email {
        let mut violations = validation::Violations::new();
        violations.check("email", validation::validate_email(&email));
        violations.finish()?;

        if email_exists(db, &email, Some(id)).await? {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }
        current.email = email;
    }
    if let Some(avatar_url) = req.avatar_url {
        // Opaque storage reference; never interpreted here.
        current.avatar_url = Some(avatar_url);
    }
    current.updated_at = Utc::now();

    sqlx::query("UPDATE users SET email = ?, avatar_url = ?, updated_at = ? WHERE id = ?")
        .bind(&current.email)
        .bind(&current.avatar_url)
        .bind(current.updated_at)
        .bind(id)
        .execute(db)
        .await?;

    Ok(current)
}

/// Admin role/activation changes, guarded so the system never ends up
/// without an active admin.
pub async fn admin_update_user(
    db: &SqlitePool,
    id: Uuid,
    req: AdminUserUpdate,
) -> Result<User, AppError> {
    let mut current = find_user_by_id(db, id).await?.ok_or(AppError::NotFound)?;

    let new_role = req.role.unwrap_or(current.role);
    let new_active = req.is_active.unwrap_or(current.is_active);

    let loses_admin = current.role == Role::Admin
        && current.is_active
        && (new_role != Role::Admin || !new_active);

    if loses_admin && count_active_admins_excluding(db, id).await? == 0 {
        return Err(AppError::Conflict(
            "At least one active admin must remain".to_string(),
        ));
    }

    current.role = new_role;
    current.is_active = new_active;
    current.updated_at = Utc::now();

    sqlx::query("UPDATE users SET role = ?, is_active = ?, updated_at = ? WHERE id = ?")
        .bind(current.role)
        .bind(current.is_active)
        .bind(current.updated_at)
        .bind(id)
        .execute(db)
        .await?;

    Ok(current)
}
