use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::{PasswordHasher, TokenIssuer};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: Arc<dyn TokenIssuer>,
}
