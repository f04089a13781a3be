//! Validation utilities shared by the producer API and the admin surface.

use crate::ArcanaError;
use validator::{Validate, ValidationErrors};

/// Extension trait for validation.
pub trait ValidateExt: Validate {
    /// Validates the struct and returns an `ArcanaError` on failure.
    fn validate_request(&self) -> Result<(), ArcanaError> {
        self.validate().map_err(validation_errors_to_arcana_error)
    }
}

impl<T: Validate> ValidateExt for T {}

/// Converts `validator::ValidationErrors` to `ArcanaError`.
#[must_use]
pub fn validation_errors_to_arcana_error(errors: ValidationErrors) -> ArcanaError {
    let message = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                let detail = error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), std::string::ToString::to_string);
                format!("{field}: {detail}")
            })
        })
        .collect::<Vec<_>>()
        .join("; ");

    ArcanaError::Validation(message)
}

/// Queue-domain validation rules.
pub mod rules {
    use validator::ValidationError;

    /// Validates that a string is not blank after trimming.
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("not_blank"));
        }
        Ok(())
    }

    /// Validates a queue name: lowercase alphanumeric plus `-`/`_`, 1-64 chars.
    pub fn valid_queue_name(name: &str) -> Result<(), ValidationError> {
        if name.is_empty() || name.len() > 64 {
            return Err(ValidationError::new("queue_name_length"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(ValidationError::new("queue_name_invalid_characters"));
        }
        Ok(())
    }

    /// Destructive admin operations require a reason of at least 10 characters.
    pub fn valid_audit_reason(reason: &str) -> Result<(), ValidationError> {
        if reason.trim().chars().count() < 10 {
            return Err(ValidationError::new("reason_required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::rules::*;

    #[test]
    fn not_blank_rejects_whitespace() {
        assert!(not_blank("hello").is_ok());
        assert!(not_blank("   ").is_err());
        assert!(not_blank("").is_err());
    }

    #[test]
    fn queue_name_rules() {
        assert!(valid_queue_name("high").is_ok());
        assert!(valid_queue_name("billing-retries").is_ok());
        assert!(valid_queue_name("").is_err());
        assert!(valid_queue_name("Has Spaces").is_err());
        assert!(valid_queue_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn audit_reason_requires_ten_chars() {
        assert!(valid_audit_reason("operator cleanup after incident #42").is_ok());
        assert!(valid_audit_reason("too short").is_err());
        assert!(valid_audit_reason("          ").is_err());
    }
}
