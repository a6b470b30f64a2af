use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{self, AdminUser, CurrentUser, Operation};
use crate::db;
use crate::error::AppError;
use crate::models::*;
use crate::services::{analytics, assignment, query};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me).patch(update_profile))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/search", get(search_tasks))
        .route(
            "/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/analytics/summary", get(summary))
        .route("/analytics/distribution", get(distribution))
        .route("/analytics/daily", get(daily_activity))
        .route("/admin/users", get(admin_list_users))
        .route("/admin/users/{id}", patch(admin_update_user))
        .route("/admin/tasks/assign", post(admin_assign_task))
        .route("/admin/analytics/top-users", get(admin_top_users))
        .route("/admin/analytics/weekly", get(admin_weekly_comparison))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    // The very first account bootstraps the system and becomes an admin.
    let role = if db::users::count_users(&state.db).await? == 0 {
        Role::Admin
    } else {
        Role::User
    };

    let user = db::users::create_user(&state.db, state.hasher.as_ref(), req, role).await?;
    let token = state.tokens.issue(&user)?;
    Ok(Json(AuthResponse { token, user }))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = db::users::find_user_by_username_or_email(&state.db, &req.username_or_email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !user.is_active || !state.hasher.verify(&req.password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let user = db::users::record_login(&state.db, user).await?;
    let token = state.tokens.issue(&user)?;
    Ok(Json(AuthResponse { token, user }))
}

async fn me(user: CurrentUser) -> Json<User> {
    Json(user.0)
}

async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let updated = db::users::update_profile(&state.db, user.0.id, req).await?;
    Ok(Json(updated))
}

async fn list_tasks(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<query::TaskListParams>,
) -> Result<Json<query::TaskPage>, AppError> {
    let page = query::list_tasks(&state.db, &user.principal(), params).await?;
    Ok(Json(page))
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

async fn search_tasks(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<query::TaskPage>, AppError> {
    let page = query::search_tasks(
        &state.db,
        &user.principal(),
        params.q,
        params.page,
        params.page_size,
    )
    .await?;
    Ok(Json(page))
}

async fn create_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<NewTaskRequest>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let principal = user.principal();
    let owner = req.user_id.unwrap_or(principal.id);

    if !auth::can_create_for(&principal, owner) {
        return Err(AppError::Forbidden);
    }

    let task = if owner == principal.id {
        db::tasks::create_task(&state.db, owner, None, req).await?
    } else {
        assignment::assign_task(&state.db, &principal, owner, req).await?
    };

    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, AppError> {
    let task = db::tasks::find_task_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !auth::can_access(&user.principal(), &task, Operation::Read) {
        return Err(AppError::Forbidden);
    }

    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, AppError> {
    let principal = user.principal();
    let task = db::tasks::find_task_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !auth::can_access(&principal, &task, Operation::Update) {
        return Err(AppError::Forbidden);
    }

    let reassign =
        assignment::resolve_reassignment(&state.db, &principal, &task, req.user_id).await?;

    let updated = db::tasks::update_task(&state.db, id, req, reassign)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated))
}

async fn delete_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let task = db::tasks::find_task_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !auth::can_access(&user.principal(), &task, Operation::Delete) {
        return Err(AppError::Forbidden);
    }

    if db::tasks::delete_task(&state.db, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

#[derive(Deserialize)]
struct ScopeParams {
    /// Honored only for admin principals.
    user_id: Option<Uuid>,
}

async fn summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ScopeParams>,
) -> Result<Json<analytics::Summary>, AppError> {
    let scope = analytics::Scope::for_principal(&user.principal(), params.user_id);
    let summary = analytics::summary(&state.db, scope).await?;
    Ok(Json(summary))
}

#[derive(Deserialize)]
struct DistributionParams {
    by: Option<String>,
    user_id: Option<Uuid>,
}

async fn distribution(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<DistributionParams>,
) -> Result<Json<Vec<analytics::DistributionEntry>>, AppError> {
    let by = params
        .by
        .ok_or_else(|| AppError::InvalidParameter("Missing dimension: by".to_string()))?;
    let scope = analytics::Scope::for_principal(&user.principal(), params.user_id);
    let entries = analytics::distribution(&state.db, scope, &by).await?;
    Ok(Json(entries))
}

#[derive(Deserialize)]
struct DailyParams {
    days: Option<u32>,
    user_id: Option<Uuid>,
}

async fn daily_activity(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<DailyParams>,
) -> Result<Json<Vec<analytics::DailyActivity>>, AppError> {
    let scope = analytics::Scope::for_principal(&user.principal(), params.user_id);
    let days = analytics::daily_activity(&state.db, scope, params.days.unwrap_or(7)).await?;
    Ok(Json(days))
}

async fn admin_list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<User>>, AppError> {
    let users = db::users::list_users(&state.db).await?;
    Ok(Json(users))
}

async fn admin_update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUserUpdate>,
) -> Result<Json<User>, AppError> {
    let user = db::users::admin_update_user(&state.db, id, req).await?;
    Ok(Json(user))
}

async fn admin_assign_task(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<NewTaskRequest>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let target = req
        .user_id
        .ok_or_else(|| AppError::InvalidParameter("Missing target: user_id".to_string()))?;
    let task = assignment::assign_task(&state.db, &admin.principal(), target, req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Deserialize)]
struct TopUsersParams {
    limit: Option<u32>,
}

async fn admin_top_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<TopUsersParams>,
) -> Result<Json<Vec<analytics::TopUser>>, AppError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let users = analytics::top_active_users(&state.db, limit).await?;
    Ok(Json(users))
}

async fn admin_weekly_comparison(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<analytics::WeeklyComparison>, AppError> {
    let comparison = analytics::weekly_comparison(&state.db).await?;
    Ok(Json(comparison))
}
