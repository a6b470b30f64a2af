//! Input validation. Field checks collect every violation before failing,
//! so one request reports all invalid fields at once.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{AppError, FieldError};
use crate::models::RegisterRequest;

pub const TITLE_MAX_LEN: usize = 200;
pub const DESCRIPTION_MAX_LEN: usize = 1000;

/// Accumulates field violations across a whole payload.
#[derive(Debug, Default)]
pub struct Violations {
    errors: Vec<FieldError>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn check(&mut self, field: &str, result: Result<(), String>) {
        if let Err(message) = result {
            self.add(field, message);
        }
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if username.len() < 3 {
        return Err("Username must be at least 3 characters long".to_string());
    }

    if username.len() > 32 {
        return Err("Username must be at most 32 characters long".to_string());
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("Failed to compile username regex"));

    if !regex.is_match(username) {
        return Err("Username can only contain letters, numbers, and underscores".to_string());
    }

    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), String> {
    if title.is_empty() {
        return Err("Title is required".to_string());
    }

    if title.chars().count() > TITLE_MAX_LEN {
        return Err(format!("Title must be at most {TITLE_MAX_LEN} characters long"));
    }

    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        return Err(format!(
            "Description must be at most {DESCRIPTION_MAX_LEN} characters long"
        ));
    }

    Ok(())
}

/// Validate a registration payload, reporting every violating field.
pub fn validate_registration(req: &RegisterRequest) -> Result<(), AppError> {
    let mut violations = Violations::new();
    violations.check("username", validate_username(&req.username));
    violations.check("email", validate_email(&req.email));
    violations.check("password", validate_password(&req.password));
    violations.finish()
}

/// Validate task fields after trimming. Title is expected pre-trimmed.
pub fn validate_task_fields(title: &str, description: Option<&str>) -> Result<(), AppError> {
    let mut violations = Violations::new();
    violations.check("title", validate_title(title));
    if let Some(description) = description {
        violations.check("description", validate_description(description));
    }
    violations.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("a@example.com").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn task_violations_are_aggregated() {
        let description = "d".repeat(DESCRIPTION_MAX_LEN + 1);

        match validate_task_fields("", Some(&description)) {
            Err(AppError::Validation(fields)) => {
                assert_eq!(fields.len(), 2);
                assert!(fields.iter().any(|f| f.field == "title"));
                assert!(fields.iter().any(|f| f.field == "description"));
            }
            other => panic!("expected aggregated validation error, got {other:?}"),
        }
    }

    #[test]
    fn title_boundary() {
        assert!(validate_title(&"x".repeat(TITLE_MAX_LEN)).is_ok());
        assert!(validate_title(&"x".repeat(TITLE_MAX_LEN + 1)).is_err());
    }
}
