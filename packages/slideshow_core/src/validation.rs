use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use thiserror::Error;

/// Field-level validation errors with diagnostic codes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("SS1001: Please specify a name.")]
    EmptyName,

    #[error("SS1002: The name {name} is taken.")]
    NameTaken { name: String },

    #[error("SS1003: Not an integer: {value}")]
    NotAnInteger { value: String },

    #[error("SS1004: Must be a non-negative integer, got {value}")]
    Negative { value: i64 },

    #[error("SS1005: Value {value} is too large")]
    TooLarge { value: i64 },

    #[error("SS1101: Please provide a value.")]
    MissingValue,

    #[error("SS1102: Not a valid URI: {reason}")]
    InvalidUri { reason: String },

    #[error("SS1103: Unknown page kind: {kind}")]
    UnknownKind { kind: String },

    #[error("SS1104: Unsupported URL scheme '{scheme}', use http or https")]
    UnsupportedScheme { scheme: String },
}

/// A validation error attached to the form field it was raised for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field path, e.g. `name` or `pages[2].url`
    pub field: String,
    pub error: ValidationError,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.error)
    }
}

impl Serialize for FieldError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FieldError", 2)?;
        state.serialize_field("field", &self.field)?;
        state.serialize_field("message", &self.error.to_string())?;
        state.end()
    }
}

/// Validation context and results
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ValidationResult {
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A result holding exactly one error
    pub fn single(field: impl Into<String>, error: ValidationError) -> Self {
        let mut result = Self::new();
        result.add_error(field, error);
        result
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, error: ValidationError) {
        self.errors.push(FieldError {
            field: field.into(),
            error,
        });
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Merge another result, prefixing its field paths
    pub fn absorb(&mut self, prefix: &str, other: ValidationResult) {
        for FieldError { field, error } in other.errors {
            self.add_error(format!("{}.{}", prefix, field), error);
        }
        self.warnings.extend(other.warnings);
    }

    /// The error for a given field path, if any
    pub fn error_for(&self, field: &str) -> Option<&ValidationError> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| &e.error)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        f.write_str(&messages.join("; "))
    }
}

/// Check that a deck name is present
pub fn check_name(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(())
}

/// Check a duration in seconds: non-negative and representable
pub fn check_duration(value: i64) -> Result<u32, ValidationError> {
    if value < 0 {
        return Err(ValidationError::Negative { value });
    }
    u32::try_from(value).map_err(|_| ValidationError::TooLarge { value })
}

/// Check a raw form value as a non-negative integer duration
pub fn parse_duration(raw: &str) -> Result<u32, ValidationError> {
    let value = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::NotAnInteger {
            value: raw.to_string(),
        })?;
    check_duration(value)
}
