#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use taskhub::auth::{Argon2Hasher, JwtIssuer, Principal};
use taskhub::db;
use taskhub::models::*;
use taskhub::state::AppState;

/// In-memory database. A single connection keeps every query on the same
/// memory instance.
pub async fn setup_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub fn test_state(pool: SqlitePool) -> AppState {
    AppState {
        db: pool,
        hasher: Arc::new(Argon2Hasher),
        tokens: Arc::new(JwtIssuer::new(b"test-secret", 3600)),
    }
}

pub async fn create_user(db: &SqlitePool, username: &str, role: Role) -> User {
    db::users::create_user(
        db,
        &Argon2Hasher,
        RegisterRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "Password1!".to_string(),
        },
        role,
    )
    .await
    .expect("Failed to create user")
}

pub fn principal_of(user: &User) -> Principal {
    Principal {
        id: user.id,
        role: user.role,
        is_active: user.is_active,
    }
}

pub fn new_task(title: &str, due_date: DateTime<Utc>) -> NewTaskRequest {
    NewTaskRequest {
        title: title.to_string(),
        description: None,
        due_date,
        category: None,
        priority: None,
        status: None,
        user_id: None,
    }
}

pub async fn create_task_for(
    db: &SqlitePool,
    owner: Uuid,
    title: &str,
    due_date: DateTime<Utc>,
    status: TaskStatus,
) -> Task {
    let req = NewTaskRequest {
        status: Some(status),
        ..new_task(title, due_date)
    };
    db::tasks::create_task(db, owner, None, req)
        .await
        .expect("Failed to create task")
}

/// Rewrite `created_at`, for tests that need history.
pub async fn backdate_created_at(db: &SqlitePool, task_id: Uuid, created_at: DateTime<Utc>) {
    sqlx::query("UPDATE tasks SET created_at = ? WHERE id = ?")
        .bind(created_at)
        .bind(task_id)
        .execute(db)
        .await
        .expect("Failed to backdate task");
}
