use super::{FieldSpec, PageKind};
use crate::page::{DisplayTarget, Fields, PageContent, UrlResolver};
use crate::validation::ValidationError;
use std::sync::Arc;
use url::Url;

const URL_FIELD: &str = "url";

/// Base used only to check that a relative reference is well formed
const SYNTAX_BASE: &str = "http://localhost/";

/// Schemes a display frame may be pointed at; relative URLs inherit the root's scheme
const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

/// A page that shows an arbitrary URL
///
/// Relative URLs are qualified against the application root when resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPage {
    url: String,
}

impl UrlPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl PageContent for UrlPage {
    fn kind(&self) -> &str {
        UrlKind.id()
    }

    fn resolve(&self, resolver: &dyn UrlResolver) -> DisplayTarget {
        DisplayTarget::Navigate {
            url: resolver.resolve(&self.url),
        }
    }

    fn fields(&self) -> Fields {
        Fields::from([(URL_FIELD.to_string(), self.url.clone())])
    }
}

/// Descriptor for [`UrlPage`]
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlKind;

impl UrlKind {
    /// Syntax check only; the URL does not have to be reachable
    pub fn check_url(value: &str) -> Result<(), ValidationError> {
        if value.is_empty() {
            return Err(ValidationError::MissingValue);
        }
        if let Some(c) = value.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError::InvalidUri {
                reason: format!("Illegal character {:?}", c),
            });
        }
        match Url::parse(value) {
            Ok(url) if ALLOWED_SCHEMES.contains(&url.scheme()) => Ok(()),
            Ok(url) => Err(ValidationError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            }),
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(SYNTAX_BASE)
                .and_then(|base| base.join(value))
                .map(|_| ())
                .map_err(|e| ValidationError::InvalidUri { reason: e.to_string() }),
            Err(e) => Err(ValidationError::InvalidUri { reason: e.to_string() }),
        }
    }
}

impl PageKind for UrlKind {
    fn id(&self) -> &'static str {
        "url"
    }

    fn label(&self) -> &'static str {
        "URL Page"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &[FieldSpec {
            name: URL_FIELD,
            label: "URL",
            multiline: false,
        }]
    }

    fn check_field(&self, field: &str, value: &str) -> Result<(), ValidationError> {
        match field {
            URL_FIELD => Self::check_url(value),
            _ => Ok(()),
        }
    }

    fn create(&self, fields: &Fields) -> Arc<dyn PageContent> {
        let url = fields.get(URL_FIELD).cloned().unwrap_or_default();
        Arc::new(UrlPage::new(url))
    }
}
