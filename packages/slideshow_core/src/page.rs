use crate::deck::{DeckId, SlideShow};
use crate::error::DeckError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Raw configuration fields of a page, keyed by field name
pub type Fields = BTreeMap<String, String>;

/// Where the browser should go to display a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DisplayTarget {
    /// Navigate the display frame to this URL
    Navigate { url: String },
    /// Render this markup in place; there is no separate URL to navigate to
    Inline { html: String },
}

impl DisplayTarget {
    pub fn url(&self) -> Option<&str> {
        match self {
            DisplayTarget::Navigate { url } => Some(url),
            DisplayTarget::Inline { .. } => None,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, DisplayTarget::Inline { .. })
    }
}

/// Qualifies relative page URLs against the application base URL
pub trait UrlResolver: Send + Sync {
    fn resolve(&self, url: &str) -> String;
}

/// Resolver backed by a fixed application root URL
#[derive(Debug, Clone, Default)]
pub struct RootUrl {
    root: Option<Url>,
}

impl RootUrl {
    /// Build from a root such as `http://kiosk.local/app`; a trailing slash is added when missing
    pub fn new(root: &str) -> Result<Self, url::ParseError> {
        let mut normalized = root.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        Ok(Self {
            root: Some(Url::parse(&normalized)?),
        })
    }

    /// A resolver that leaves relative URLs untouched
    pub fn none() -> Self {
        Self { root: None }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.root.as_ref().map(Url::as_str)
    }
}

impl UrlResolver for RootUrl {
    fn resolve(&self, url: &str) -> String {
        match Url::parse(url) {
            // absolute URLs are handed back exactly as configured
            Ok(_) => url.to_string(),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.root {
                Some(root) => root
                    .join(url.trim_start_matches('/'))
                    .map(String::from)
                    .unwrap_or_else(|_| url.to_string()),
                None => url.to_string(),
            },
            Err(_) => url.to_string(),
        }
    }
}

/// Kind-specific payload of a page
///
/// Implementations are produced by a [`crate::kinds::PageKind`] factory. The rotation engine
/// only ever talks to pages through this trait.
pub trait PageContent: fmt::Debug + Send + Sync {
    /// Identifier of the kind that built this content
    fn kind(&self) -> &str;

    /// The display target for this content
    fn resolve(&self, resolver: &dyn UrlResolver) -> DisplayTarget;

    /// The configuration fields needed to rebuild this content through its kind
    fn fields(&self) -> Fields;
}

/// One slide of a deck
#[derive(Debug, Clone)]
pub struct Page {
    content: Arc<dyn PageContent>,
    override_duration: Option<u32>,
    parent: Option<DeckId>,
}

impl Page {
    pub fn new(content: Arc<dyn PageContent>, override_duration: Option<u32>) -> Self {
        Self {
            content,
            override_duration,
            parent: None,
        }
    }

    pub fn from_content(content: impl PageContent + 'static) -> Self {
        Self::new(Arc::new(content), None)
    }

    pub fn with_override(mut self, seconds: u32) -> Self {
        self.override_duration = Some(seconds);
        self
    }

    pub fn kind(&self) -> &str {
        self.content.kind()
    }

    pub fn content(&self) -> &dyn PageContent {
        self.content.as_ref()
    }

    pub fn fields(&self) -> Fields {
        self.content.fields()
    }

    pub fn override_duration(&self) -> Option<u32> {
        self.override_duration
    }

    /// The deck this page currently belongs to
    pub fn parent(&self) -> Option<DeckId> {
        self.parent
    }

    pub fn is_attached(&self) -> bool {
        self.parent.is_some()
    }

    pub(crate) fn attach(&mut self, deck: DeckId) {
        self.parent = Some(deck);
    }

    pub(crate) fn detach(&mut self) {
        self.parent = None;
    }

    pub fn resolve(&self, resolver: &dyn UrlResolver) -> DisplayTarget {
        self.content.resolve(resolver)
    }

    /// Seconds to show this page: its own positive override, or the parent deck's default.
    ///
    /// `deck` must be the deck this page is attached to.
    pub fn effective_duration(&self, deck: &SlideShow) -> Result<u32, DeckError> {
        if self.parent != Some(deck.id()) {
            return Err(DeckError::DetachedPage {
                deck: deck.name().to_string(),
            });
        }
        Ok(match self.override_duration {
            Some(seconds) if seconds > 0 => seconds,
            _ => deck.default_duration(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{HtmlPage, UrlPage};

    #[test]
    fn absolute_urls_are_returned_verbatim() {
        let root = RootUrl::new("http://kiosk.local/app").unwrap();
        assert_eq!(root.resolve("http://a"), "http://a");
        assert_eq!(root.resolve("https://example.com/x?y=1"), "https://example.com/x?y=1");
    }

    #[test]
    fn relative_urls_are_qualified_against_root() {
        let root = RootUrl::new("http://kiosk.local/app").unwrap();
        assert_eq!(root.as_str(), Some("http://kiosk.local/app/"));
        assert_eq!(root.resolve("status/board"), "http://kiosk.local/app/status/board");
        assert_eq!(root.resolve("/status"), "http://kiosk.local/app/status");
    }

    #[test]
    fn relative_urls_without_root_are_untouched() {
        assert_eq!(RootUrl::none().resolve("status"), "status");
    }

    #[test]
    fn override_wins_over_deck_default() {
        let deck = SlideShow::with_pages(
            "lobby",
            20,
            vec![
                Page::from_content(UrlPage::new("http://a")).with_override(5),
                Page::from_content(UrlPage::new("http://b")),
            ],
        );
        assert_eq!(deck.pages()[0].effective_duration(&deck).unwrap(), 5);
        assert_eq!(deck.pages()[1].effective_duration(&deck).unwrap(), 20);
    }

    #[test]
    fn zero_override_falls_back_to_default() {
        let deck = SlideShow::with_pages(
            "lobby",
            12,
            vec![Page::from_content(HtmlPage::new("hi")).with_override(0)],
        );
        assert_eq!(deck.pages()[0].effective_duration(&deck).unwrap(), 12);
    }

    #[test]
    fn unattached_page_has_no_duration() {
        let deck = SlideShow::new("lobby", 20);
        let page = Page::from_content(UrlPage::new("http://a"));
        assert!(matches!(
            page.effective_duration(&deck),
            Err(DeckError::DetachedPage { .. })
        ));
    }

    #[test]
    fn page_of_another_deck_has_no_duration() {
        let other = SlideShow::with_pages("other", 20, vec![Page::from_content(UrlPage::new("http://a"))]);
        let deck = SlideShow::new("lobby", 20);
        let err = other.pages()[0].effective_duration(&deck).unwrap_err();
        assert!(err.is_invariant_violation());
    }
}
