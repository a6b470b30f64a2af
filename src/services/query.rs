//! Filtered task listing. Translates caller-supplied filter/sort/pagination
//! parameters into scoped SQL. Non-admin principals are always pinned to
//! their own tasks regardless of the filters they send.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::auth::Principal;
use crate::db::tasks::TASK_COLUMNS;
use crate::error::AppError;
use crate::models::{Task, TaskCategory, TaskPriority, TaskStatus};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskListParams {
    /// Group shortcut: today | overdue | completed | all. Overrides `status`.
    pub group: Option<String>,
    pub status: Option<TaskStatus>,
    pub category: Option<TaskCategory>,
    pub priority: Option<TaskPriority>,
    pub search: Option<String>,
    /// Admin-only narrowing; ignored for regular users.
    pub user_id: Option<Uuid>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Debug, Serialize)]
pub struct TaskPage {
    pub items: Vec<Task>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskGroup {
    Today,
    Overdue,
    Completed,
    Open,
}

fn parse_group(value: &str) -> Result<TaskGroup, AppError> {
    match value {
        "today" => Ok(TaskGroup::Today),
        "overdue" => Ok(TaskGroup::Overdue),
        "completed" => Ok(TaskGroup::Completed),
        "all" => Ok(TaskGroup::Open),
        other => Err(AppError::InvalidParameter(format!(
            "Unknown group: {other}"
        ))),
    }
}

fn sort_column(value: &str) -> Result<&'static str, AppError> {
    match value {
        "created_at" => Ok("created_at"),
        "updated_at" => Ok("updated_at"),
        "due_date" => Ok("due_date"),
        "title" => Ok("title"),
        other => Err(AppError::InvalidParameter(format!(
            "Cannot sort by: {other}"
        ))),
    }
}

fn sort_direction(value: &str) -> Result<&'static str, AppError> {
    match value {
        "asc" => Ok("ASC"),
        "desc" => Ok("DESC"),
        other => Err(AppError::InvalidParameter(format!(
            "Unknown sort order: {other}"
        ))),
    }
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped.to_lowercase())
}

struct Filters {
    owner: Option<Uuid>,
    group: Option<TaskGroup>,
    status: Option<TaskStatus>,
    category: Option<TaskCategory>,
    priority: Option<TaskPriority>,
    search: Option<String>,
    now: DateTime<Utc>,
    day_start: DateTime<Utc>,
    day_end: DateTime<Utc>,
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, f: &Filters) {
    if let Some(owner) = f.owner {
        qb.push(" AND user_id = ").push_bind(owner);
    }

    match f.group {
        Some(TaskGroup::Today) => {
            qb.push(" AND due_date >= ").push_bind(f.day_start);
            qb.push(" AND due_date < ").push_bind(f.day_end);
            qb.push(" AND status != ").push_bind(TaskStatus::Completed);
        }
        Some(TaskGroup::Overdue) => {
            qb.push(" AND due_date < ").push_bind(f.now);
            qb.push(" AND status NOT IN (");
            qb.push_bind(TaskStatus::Completed);
            qb.push(", ");
            qb.push_bind(TaskStatus::Cancelled);
            qb.push(")");
        }
        Some(TaskGroup::Completed) => {
            qb.push(" AND status = ").push_bind(TaskStatus::Completed);
        }
        Some(TaskGroup::Open) => {
            qb.push(" AND status != ").push_bind(TaskStatus::Completed);
        }
        None => {
            if let Some(status) = f.status {
                qb.push(" AND status = ").push_bind(status);
            }
        }
    }

    if let Some(category) = f.category {
        qb.push(" AND category = ").push_bind(category);
    }
    if let Some(priority) = f.priority {
        qb.push(" AND priority = ").push_bind(priority);
    }

    if let Some(pattern) = &f.search {
        qb.push(" AND (LOWER(title) LIKE ").push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR LOWER(COALESCE(description, '')) LIKE ")
            .push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR LOWER(category) LIKE ")
            .push_bind(pattern.clone());
        qb.push(" ESCAPE '\\')");
    }
}

pub async fn list_tasks(
    db: &SqlitePool,
    principal: &Principal,
    params: TaskListParams,
) -> Result<TaskPage, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    // Non-admins can never widen scope via filters.
    let owner = if principal.is_admin() {
        params.user_id
    } else {
        Some(principal.id)
    };

    let group = params.group.as_deref().map(parse_group).transpose()?;
    let sort = sort_column(params.sort_by.as_deref().unwrap_or("created_at"))?;
    let direction = sort_direction(params.order.as_deref().unwrap_or("desc"))?;

    let now = Utc::now();
    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let filters = Filters {
        owner,
        group,
        status: params.status,
        category: params.category,
        priority: params.priority,
        search: params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern),
        now,
        day_start,
        day_end: day_start + Duration::days(1),
    };

    let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tasks WHERE 1=1");
    push_filters(&mut count_qb, &filters);
    let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

    let mut qb =
        QueryBuilder::<Sqlite>::new(format!("SELECT {TASK_COLUMNS} FROM tasks WHERE 1=1"));
    push_filters(&mut qb, &filters);
    // Stable sort: insertion order breaks ties.
    qb.push(format!(" ORDER BY {sort} {direction}, rowid ASC"));
    qb.push(" LIMIT ").push_bind(i64::from(page_size));
    qb.push(" OFFSET ")
        .push_bind(i64::from(page.saturating_sub(1)) * i64::from(page_size));

    let items = qb.build_query_as::<Task>().fetch_all(db).await?;

    let total_pages = (total as u64).div_ceil(u64::from(page_size)) as u32;

    Ok(TaskPage {
        items,
        pagination: Pagination {
            page,
            page_size,
            total,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        },
    })
}

/// Search-only entry point: the term is mandatory here.
pub async fn search_tasks(
    db: &SqlitePool,
    principal: &Principal,
    term: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
) -> Result<TaskPage, AppError> {
    let term = term
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidParameter("Search term is required".to_string()))?;

    list_tasks(
        db,
        principal,
        TaskListParams {
            search: Some(term),
            page,
            page_size,
            ..TaskListParams::default()
        },
    )
    .await
}
