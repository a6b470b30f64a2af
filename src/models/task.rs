use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskCategory {
    Personal,
    Work,
    Shopping,
    Health,
    Finance,
    Other,
}

impl Default for TaskCategory {
    fn default() -> Self {
        TaskCategory::Personal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub category: TaskCategory,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub user_id: Uuid,
    /// Admin who created or reassigned this task on behalf of the owner.
    /// Never an ownership claim.
    pub assigned_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// A task is overdue when it is still open and its due date has passed.
    /// Completed and cancelled tasks are never overdue.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !matches!(self.status, TaskStatus::Completed | TaskStatus::Cancelled)
            && self.due_date < now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub category: Option<TaskCategory>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    /// Owner override; honored only when the caller is an admin.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub category: Option<TaskCategory>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    /// Reassignment target; only admins may change the owner.
    pub user_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task_with(status: TaskStatus, due: DateTime<Utc>) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            description: None,
            due_date: due,
            category: TaskCategory::Personal,
            priority: TaskPriority::Medium,
            status,
            user_id: Uuid::new_v4(),
            assigned_by: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn overdue_only_for_open_tasks_past_due() {
        let now = Utc::now();
        let past = now - Duration::days(1);
        let future = now + Duration::days(1);

        assert!(task_with(TaskStatus::Pending, past).is_overdue(now));
        assert!(task_with(TaskStatus::InProgress, past).is_overdue(now));
        assert!(!task_with(TaskStatus::Pending, future).is_overdue(now));
        assert!(!task_with(TaskStatus::Completed, past).is_overdue(now));
        assert!(!task_with(TaskStatus::Cancelled, past).is_overdue(now));
    }
}
