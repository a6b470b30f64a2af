pub mod analytics;
pub mod assignment;
pub mod query;

pub use analytics::{DailyActivity, DistributionEntry, Scope, Summary, TopUser, WeeklyComparison};
pub use query::{TaskListParams, TaskPage};
