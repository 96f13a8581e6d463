use super::{FieldSpec, PageKind};
use crate::page::{DisplayTarget, Fields, PageContent, UrlResolver};
use crate::validation::ValidationError;
use std::sync::Arc;

/// Opening of the envelope put around bare fragments
pub const HTML_DECORATION_START: &str = "<html><head><title></title></head><body>";
/// Closing of the envelope put around bare fragments
pub const HTML_DECORATION_END: &str = "</body></html>";
/// Content starting with this (any case) is already a document
pub const HTML_TAG_START: &str = "<html";

const HTML_FIELD: &str = "html";

/// Trim `html` and wrap it in a minimal document unless it already starts with `<html`.
///
/// Applying this to its own output returns it unchanged.
pub fn decorate_if_needed(html: &str) -> String {
    let html = html.trim();
    let marker = HTML_TAG_START.as_bytes();
    let is_document =
        html.len() > marker.len() && html.as_bytes()[..marker.len()].eq_ignore_ascii_case(marker);
    if is_document {
        html.to_string()
    } else {
        format!("{}{}{}", HTML_DECORATION_START, html, HTML_DECORATION_END)
    }
}

/// A page with user supplied markup, rendered in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlPage {
    html: String,
}

impl HtmlPage {
    /// Store `html`, decorated into a standalone document when needed
    pub fn new(html: &str) -> Self {
        Self {
            html: decorate_if_needed(html),
        }
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

impl PageContent for HtmlPage {
    fn kind(&self) -> &str {
        HtmlKind.id()
    }

    fn resolve(&self, _resolver: &dyn UrlResolver) -> DisplayTarget {
        DisplayTarget::Inline {
            html: self.html.clone(),
        }
    }

    fn fields(&self) -> Fields {
        Fields::from([(HTML_FIELD.to_string(), self.html.clone())])
    }
}

/// Descriptor for [`HtmlPage`]
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlKind;

impl PageKind for HtmlKind {
    fn id(&self) -> &'static str {
        "html"
    }

    fn label(&self) -> &'static str {
        "HTML Page"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &[FieldSpec {
            name: HTML_FIELD,
            label: "HTML",
            multiline: true,
        }]
    }

    fn check_field(&self, field: &str, value: &str) -> Result<(), ValidationError> {
        match field {
            HTML_FIELD if value.trim().is_empty() => Err(ValidationError::MissingValue),
            _ => Ok(()),
        }
    }

    fn create(&self, fields: &Fields) -> Arc<dyn PageContent> {
        let html = fields.get(HTML_FIELD).map(String::as_str).unwrap_or_default();
        Arc::new(HtmlPage::new(html))
    }
}
