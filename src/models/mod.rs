pub mod task;
pub mod user;

pub use task::{
    NewTaskRequest, Task, TaskCategory, TaskPriority, TaskStatus, UpdateTaskRequest,
};
pub use user::{
    AdminUserUpdate, AuthResponse, LoginRequest, RegisterRequest, Role, UpdateProfileRequest, User,
};
