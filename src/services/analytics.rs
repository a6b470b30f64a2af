//! Read-only reporting over the task and identity stores. Every report call
//! captures one `now` and reuses it across all of its clauses, so the counts
//! within a single response are internally consistent.

use std::collections::HashMap;

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::AppError;

pub const MAX_WINDOW_DAYS: u32 = 365;

/// Which tasks a report covers. Users always report over their own tasks;
/// admins may report over everything or narrow to one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    User(Uuid),
}

impl Scope {
    pub fn for_principal(principal: &Principal, requested: Option<Uuid>) -> Scope {
        if principal.is_admin() {
            requested.map(Scope::User).unwrap_or(Scope::All)
        } else {
            Scope::User(principal.id)
        }
    }

    fn push_where(self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let Scope::User(id) = self {
            qb.push(" AND user_id = ").push_bind(id);
        }
    }
}

#[derive(Debug, Serialize, FromRow)]
pub struct Summary {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub overdue: i64,
}

/// Single-pass grouped count. `overdue` is evaluated against the call-time
/// `now`, never a stored flag.
pub async fn summary(db: &SqlitePool, scope: Scope) -> Result<Summary, AppError> {
    let now = Utc::now();

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) AS total, \
         COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending, \
         COALESCE(SUM(CASE WHEN status = 'in_progress' THEN 1 ELSE 0 END), 0) AS in_progress, \
         COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed, \
         COALESCE(SUM(CASE WHEN status = 'cancelled' THEN 1 ELSE 0 END), 0) AS cancelled, \
         COALESCE(SUM(CASE WHEN status NOT IN ('completed', 'cancelled') AND due_date < ",
    );
    qb.push_bind(now);
    qb.push(" THEN 1 ELSE 0 END), 0) AS overdue FROM tasks WHERE 1=1");
    scope.push_where(&mut qb);

    let summary = qb.build_query_as::<Summary>().fetch_one(db).await?;
    Ok(summary)
}

#[derive(Debug, Serialize, FromRow)]
pub struct DistributionEntry {
    pub value: String,
    pub count: i64,
}

pub async fn distribution(
    db: &SqlitePool,
    scope: Scope,
    dimension: &str,
) -> Result<Vec<DistributionEntry>, AppError> {
    let column = match dimension {
        "status" => "status",
        "category" => "category",
        "priority" => "priority",
        other => {
            return Err(AppError::InvalidParameter(format!(
                "Unknown dimension: {other}"
            )));
        }
    };

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {column} AS value, COUNT(*) AS count FROM tasks WHERE 1=1"
    ));
    scope.push_where(&mut qb);
    qb.push(format!(" GROUP BY {column} ORDER BY count DESC, value ASC"));

    let entries = qb.build_query_as::<DistributionEntry>().fetch_all(db).await?;
    Ok(entries)
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub count: i64,
}

/// Tasks created per UTC calendar day over the trailing window, today
/// included. Days without any tasks are reported with a count of 0.
pub async fn daily_activity(
    db: &SqlitePool,
    scope: Scope,
    window_days: u32,
) -> Result<Vec<DailyActivity>, AppError> {
    if window_days == 0 || window_days > MAX_WINDOW_DAYS {
        return Err(AppError::InvalidParameter(format!(
            "Window must be between 1 and {MAX_WINDOW_DAYS} days"
        )));
    }

    let now = Utc::now();
    let today = now.date_naive();
    let start_date = today
        .checked_sub_days(Days::new(u64::from(window_days - 1)))
        .ok_or_else(|| AppError::InvalidParameter("Window is out of range".to_string()))?;
    let start = start_date.and_time(NaiveTime::MIN).and_utc();

    let mut qb = QueryBuilder::<Sqlite>::new("SELECT created_at FROM tasks WHERE created_at >= ");
    qb.push_bind(start);
    scope.push_where(&mut qb);

    let timestamps: Vec<DateTime<Utc>> = qb.build_query_scalar().fetch_all(db).await?;

    let mut buckets: HashMap<NaiveDate, i64> = HashMap::new();
    for ts in timestamps {
        *buckets.entry(ts.date_naive()).or_insert(0) += 1;
    }

    let mut days = Vec::with_capacity(window_days as usize);
    for offset in 0..window_days {
        let date = start_date
            .checked_add_days(Days::new(u64::from(offset)))
            .ok_or(AppError::InternalServerError)?;
        days.push(DailyActivity {
            date,
            count: buckets.get(&date).copied().unwrap_or(0),
        });
    }

    Ok(days)
}

#[derive(Debug, FromRow)]
struct TopUserRow {
    user_id: Uuid,
    username: String,
    task_count: i64,
    completed_count: i64,
}

#[derive(Debug, Serialize)]
pub struct TopUser {
    pub user_id: Uuid,
    pub username: String,
    pub task_count: i64,
    pub completed_count: i64,
    pub completion_rate_percent: f64,
}

/// Most active users by task count, active accounts only. Users with zero
/// tasks never appear, so the completion rate is always well defined.
pub async fn top_active_users(db: &SqlitePool, limit: u32) -> Result<Vec<TopUser>, AppError> {
    let rows = sqlx::query_as::<_, TopUserRow>(
        "SELECT u.id AS user_id, u.username AS username, COUNT(t.id) AS task_count, \
         COALESCE(SUM(CASE WHEN t.status = 'completed' THEN 1 ELSE 0 END), 0) AS completed_count \
         FROM users u JOIN tasks t ON t.user_id = u.id \
         WHERE u.is_active = 1 \
         GROUP BY u.id, u.username \
         ORDER BY task_count DESC, username ASC \
         LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let rate = row.completed_count as f64 / row.task_count as f64 * 100.0;
            TopUser {
                user_id: row.user_id,
                username: row.username,
                task_count: row.task_count,
                completed_count: row.completed_count,
                completion_rate_percent: (rate * 100.0).round() / 100.0,
            }
        })
        .collect())
}

#[derive(Debug, Serialize)]
pub struct WeeklyComparison {
    pub current_week: i64,
    pub previous_week: i64,
    pub growth_percent: i64,
}

/// Task creation in [now-7d, now) against [now-14d, now-7d).
pub async fn weekly_comparison(db: &SqlitePool) -> Result<WeeklyComparison, AppError> {
    let now = Utc::now();
    let week_ago = now - Duration::days(7);
    let two_weeks_ago = now - Duration::days(14);

    let (current_week, previous_week): (i64, i64) = sqlx::query_as(
        "SELECT \
         COALESCE(SUM(CASE WHEN created_at >= ? AND created_at < ? THEN 1 ELSE 0 END), 0), \
         COALESCE(SUM(CASE WHEN created_at >= ? AND created_at < ? THEN 1 ELSE 0 END), 0) \
         FROM tasks",
    )
    .bind(week_ago)
    .bind(now)
    .bind(two_weeks_ago)
    .bind(week_ago)
    .fetch_one(db)
    .await?;

    let growth_percent = if previous_week > 0 {
        (((current_week - previous_week) as f64 / previous_week as f64) * 100.0).round() as i64
    } else if current_week > 0 {
        100
    } else {
        0
    };

    Ok(WeeklyComparison {
        current_week,
        previous_week,
        growth_percent,
    })
}
