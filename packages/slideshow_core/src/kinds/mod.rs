//! Page kinds: the open set of page types a deck can hold.
//!
//! A [`PageKind`] describes its configurable fields, validates raw form input and builds the
//! [`PageContent`] for a page. Kinds are collected in a [`KindRegistry`] once at startup and the
//! registry is read-only afterwards.

mod html_page;
mod url_page;

pub use self::html_page::{decorate_if_needed, HtmlKind, HtmlPage, HTML_DECORATION_END, HTML_DECORATION_START, HTML_TAG_START};
pub use self::url_page::{UrlKind, UrlPage};

use crate::error::DeckError;
use crate::ir::PageForm;
use crate::page::{Fields, Page, PageContent};
use crate::validation::{check_duration, ValidationError, ValidationResult};
use serde::Serialize;
use std::sync::Arc;

/// A configurable field of a page kind, used to render its form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    /// Rendered as a text area rather than a single line
    pub multiline: bool,
}

/// Descriptor of a page type
pub trait PageKind: Send + Sync {
    /// Unique identifier, stored with every page of this kind
    fn id(&self) -> &'static str;

    /// Human readable name for choice lists
    fn label(&self) -> &'static str;

    fn fields(&self) -> &'static [FieldSpec];

    /// Validate one field value
    fn check_field(&self, field: &str, value: &str) -> Result<(), ValidationError>;

    /// Build the content from fields that passed [`PageKind::validate`]
    fn create(&self, fields: &Fields) -> Arc<dyn PageContent>;

    /// Validate every declared field; fields the kind does not know are reported as warnings
    fn validate(&self, fields: &Fields) -> ValidationResult {
        let mut result = ValidationResult::new();
        for spec in self.fields() {
            let value = fields.get(spec.name).map(String::as_str).unwrap_or("");
            if let Err(error) = self.check_field(spec.name, value) {
                result.add_error(spec.name, error);
            }
        }
        for name in fields.keys() {
            if !self.fields().iter().any(|spec| spec.name == name.as_str()) {
                result.add_warning(format!("Ignoring unknown field '{}' for {} page", name, self.id()));
            }
        }
        result
    }
}

/// Catalog of the installed page kinds, in registration order
#[derive(Clone, Default)]
pub struct KindRegistry {
    kinds: Vec<Arc<dyn PageKind>>,
}

/// Collects kinds before the registry is frozen
#[derive(Default)]
pub struct KindRegistryBuilder {
    kinds: Vec<Arc<dyn PageKind>>,
}

impl KindRegistryBuilder {
    pub fn register(mut self, kind: impl PageKind + 'static) -> Result<Self, DeckError> {
        if self.kinds.iter().any(|k| k.id() == kind.id()) {
            return Err(DeckError::DuplicateKind {
                id: kind.id().to_string(),
            });
        }
        tracing::debug!(kind = kind.id(), "registered page kind");
        self.kinds.push(Arc::new(kind));
        Ok(self)
    }

    pub fn build(self) -> KindRegistry {
        KindRegistry { kinds: self.kinds }
    }
}

impl KindRegistry {
    pub fn builder() -> KindRegistryBuilder {
        KindRegistryBuilder::default()
    }

    /// Registry holding the built-in URL and HTML kinds
    pub fn builtin() -> Self {
        Self {
            kinds: vec![Arc::new(UrlKind), Arc::new(HtmlKind)],
        }
    }

    /// Kinds in registration order
    pub fn list(&self) -> impl Iterator<Item = &dyn PageKind> {
        self.kinds.iter().map(|k| k.as_ref())
    }

    pub fn get(&self, id: &str) -> Option<&dyn PageKind> {
        self.list().find(|k| k.id() == id)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    fn require(&self, id: &str) -> Result<&dyn PageKind, DeckError> {
        self.get(id).ok_or_else(|| DeckError::UnknownKind { id: id.to_string() })
    }

    /// Validate raw fields for a kind
    pub fn validate(&self, id: &str, fields: &Fields) -> Result<ValidationResult, DeckError> {
        Ok(self.require(id)?.validate(fields))
    }

    /// Validate a single field for a kind, for live form feedback
    pub fn check_field(&self, id: &str, field: &str, value: &str) -> Result<ValidationResult, DeckError> {
        let kind = self.require(id)?;
        let mut result = ValidationResult::new();
        if let Err(error) = kind.check_field(field, value) {
            result.add_error(field, error);
        }
        Ok(result)
    }

    /// Validate and build a detached page
    pub fn build(&self, id: &str, fields: &Fields, override_duration: Option<u32>) -> Result<Page, DeckError> {
        let kind = self.require(id)?;
        let result = kind.validate(fields);
        if !result.is_valid() {
            return Err(DeckError::Invalid(result));
        }
        Ok(Page::new(kind.create(fields), override_duration))
    }

    /// Build a whole page sequence from submitted forms.
    ///
    /// Every problem is collected under `pages[i].<field>`; unknown kinds are reported as
    /// field errors here because they come from user input.
    pub fn build_pages(&self, forms: &[PageForm]) -> Result<Vec<Page>, DeckError> {
        let mut result = ValidationResult::new();
        let mut pages = Vec::with_capacity(forms.len());

        for (index, form) in forms.iter().enumerate() {
            let prefix = format!("pages[{}]", index);
            let override_duration = match form.override_duration.map(check_duration).transpose() {
                Ok(seconds) => seconds,
                Err(error) => {
                    result.add_error(format!("{}.overrideDuration", prefix), error);
                    None
                }
            };
            let Some(kind) = self.get(&form.kind) else {
                result.add_error(
                    format!("{}.kind", prefix),
                    ValidationError::UnknownKind {
                        kind: form.kind.clone(),
                    },
                );
                continue;
            };
            let page_result = kind.validate(&form.fields);
            if page_result.is_valid() {
                pages.push(Page::new(kind.create(&form.fields), override_duration));
            }
            result.absorb(&prefix, page_result);
        }

        if !result.is_valid() {
            return Err(DeckError::Invalid(result));
        }
        for warning in &result.warnings {
            tracing::warn!("{}", warning);
        }
        Ok(pages)
    }
}
