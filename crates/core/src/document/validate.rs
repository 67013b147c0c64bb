//! Document and form validation.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::id::{DocumentId, IdError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("document _id is required")]
    MissingId,
    #[error("document _type is required")]
    MissingType,
    #[error("invalid document id: {0}")]
    InvalidId(#[from] IdError),
    #[error("{}", FieldList(.0))]
    Fields(Vec<FieldError>),
}

/// A single rejected form field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

struct FieldList<'a>(&'a [FieldError]);

impl fmt::Display for FieldList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(&e.message)?;
        }
        Ok(())
    }
}

/// Accumulates field errors so a form reports every problem at once.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &'static str, message: impl Into<String>) {
        if !ok {
            self.0.push(FieldError {
                field,
                message: message.into(),
            });
        }
    }

    /// Require at least `min` characters after trimming.
    pub fn min_chars(&mut self, field: &'static str, label: &str, value: &str, min: usize) {
        let len = value.trim().chars().count();
        if min <= 1 {
            self.check(len > 0, field, format!("{label} is required"));
        } else {
            self.check(
                len >= min,
                field,
                format!("{label} must be at least {min} characters"),
            );
        }
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields(self.0))
        }
    }
}

/// Check the system fields every stored document needs.
pub fn validate_document_fields(doc: &Value) -> Result<DocumentId, ValidationError> {
    let id = match doc.get("_id").and_then(Value::as_str) {
        None => return Err(ValidationError::MissingId),
        Some(raw) => DocumentId::parse(raw)?,
    };
    match doc.get("_type").and_then(Value::as_str) {
        None | Some("") => Err(ValidationError::MissingType),
        Some(_) => Ok(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_fields_are_required() {
        assert_eq!(
            validate_document_fields(&json!({"_type": "lead"})),
            Err(ValidationError::MissingId)
        );
        assert_eq!(
            validate_document_fields(&json!({"_id": "x", "_type": ""})),
            Err(ValidationError::MissingType)
        );
        assert!(matches!(
            validate_document_fields(&json!({"_id": "a b", "_type": "lead"})),
            Err(ValidationError::InvalidId(IdError::InvalidChar(' ')))
        ));
        let id = validate_document_fields(&json!({"_id": "x", "_type": "lead"})).unwrap();
        assert_eq!(id.as_str(), "x");
    }

    #[test]
    fn field_errors_accumulate_in_order() {
        let mut errors = FieldErrors::new();
        errors.min_chars("title", "Title", "abc", 5);
        errors.min_chars("city", "City", "  ", 1);
        errors.check(true, "price", "unused");
        let err = errors.finish().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Title must be at least 5 characters; City is required"
        );
    }

    #[test]
    fn empty_accumulator_passes() {
        assert!(FieldErrors::new().finish().is_ok());
    }
}
