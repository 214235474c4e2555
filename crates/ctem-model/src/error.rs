//! Local validation errors
//!
//! Raised by [`Validate`](crate::Validate) before a mutation reaches the
//! network. Carries the offending field so forms can highlight it.

/// A field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Client-side field name (camelCase, as the form knows it)
    pub field: &'static str,
    /// Human-readable reason
    pub message: String,
}

impl ValidationError {
    /// Create validation error for field
    #[inline]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    /// Field must not be blank
    #[inline]
    #[must_use]
    pub fn required(field: &'static str) -> Self {
        Self::new(field, "is required")
    }

    /// Field exceeds its maximum length
    #[inline]
    #[must_use]
    pub fn too_long(field: &'static str, max: usize) -> Self {
        Self::new(field, format!("must be at most {max} characters"))
    }
}

/// Check a required, length-bounded text field
pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    max_len: usize,
) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::required(field));
    }
    if trimmed.chars().count() > max_len {
        return Err(ValidationError::too_long(field, max_len));
    }
    Ok(())
}

/// Same as [`require_text`] but only when a value is present
pub(crate) fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> Result<(), ValidationError> {
    match value {
        Some(v) => require_text(field, v, max_len),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = ValidationError::required("name");
        assert_eq!(err.to_string(), "name: is required");
    }

    #[test]
    fn require_text_rejects_whitespace() {
        assert!(require_text("name", "   ", 10).is_err());
        assert!(require_text("name", "ok", 10).is_ok());
    }

    #[test]
    fn require_text_counts_chars() {
        let err = require_text("name", "abcdef", 5).unwrap_err();
        assert_eq!(err, ValidationError::too_long("name", 5));
    }

    #[test]
    fn optional_text_skips_absent() {
        assert!(optional_text("description", None, 5).is_ok());
        assert!(optional_text("description", Some(""), 5).is_err());
    }
}
