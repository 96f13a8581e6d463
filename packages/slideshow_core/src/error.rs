use crate::validation::ValidationResult;
use thiserror::Error;

/// Errors raised by the deck registry, the kind registry and the page model
#[derive(Error, Debug)]
pub enum DeckError {
    #[error("SS2001: A deck named '{name}' already exists")]
    DuplicateName { name: String },

    #[error("SS2002: Invalid input: {0}")]
    Invalid(ValidationResult),

    #[error("SS2003: No deck named '{name}'")]
    NotFound { name: String },

    #[error("SS3001: Page kind already registered: {id}")]
    DuplicateKind { id: String },

    #[error("SS3002: Unknown page kind: {id}")]
    UnknownKind { id: String },

    /// A page was asked for its duration against a deck it is not attached to
    #[error("SS3003: Page is not attached to deck '{deck}'")]
    DetachedPage { deck: String },
}

impl DeckError {
    /// The per-field errors, when this is a validation failure
    pub fn validation(&self) -> Option<&ValidationResult> {
        match self {
            DeckError::Invalid(result) => Some(result),
            _ => None,
        }
    }

    /// True for failures caused by a bug rather than by user input
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            DeckError::DetachedPage { .. } | DeckError::UnknownKind { .. } | DeckError::DuplicateKind { .. }
        )
    }
}

impl From<ValidationResult> for DeckError {
    fn from(result: ValidationResult) -> Self {
        DeckError::Invalid(result)
    }
}
