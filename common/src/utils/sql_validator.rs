//! SQL identifier validator.
//!
//! Probe queries interpolate the table name directly into the statement, so
//! only plain identifiers are accepted.

use crate::errors::AppError;

/// Validates SQL fragments supplied by callers.
pub struct SqlValidator;

/// Longest accepted identifier, schema qualifier included.
const MAX_IDENTIFIER_LEN: usize = 128;

impl SqlValidator {
    /// Validates a table name, optionally qualified once (`schema.table`).
    ///
    /// # Errors
    /// Returns `AppError::Validation` for anything but `[A-Za-z_][A-Za-z0-9_]*`
    /// segments.
    pub fn validate_identifier(name: &str) -> Result<&str, AppError> {
        if name.is_empty() || name.len() > MAX_IDENTIFIER_LEN {
            return Err(AppError::Validation(format!(
                "table name must be 1-{} characters",
                MAX_IDENTIFIER_LEN
            )));
        }

        let segments: Vec<&str> = name.split('.').collect();
        if segments.len() > 2 || !segments.iter().all(|s| Self::is_plain_segment(s)) {
            return Err(AppError::Validation(format!(
                "invalid table name: {:?}",
                name
            )));
        }
        Ok(name)
    }

    fn is_plain_segment(segment: &str) -> bool {
        let mut chars = segment.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    }
}
