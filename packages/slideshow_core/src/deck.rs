use crate::error::DeckError;
use crate::ir::{PageForm, StoredDeck, StoredPage};
use crate::kinds::KindRegistry;
use crate::page::Page;
use std::fmt;
use uuid::Uuid;

/// Seconds a page is shown when neither the deck nor the page says otherwise
pub const DEFAULT_PAGE_DURATION: u32 = 20;

/// Runtime identity of a deck; pages refer to their parent through it
///
/// Ids are assigned when a deck is constructed and are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeckId(Uuid);

impl DeckId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeckId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// True when two deck names are the same ignoring case
pub fn same_name(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// SlideShow is a named, ordered deck of pages
#[derive(Debug, Clone)]
pub struct SlideShow {
    id: DeckId,
    name: String,
    default_duration: u32,
    pages: Vec<Page>,
}

impl SlideShow {
    /// An empty deck
    pub fn new(name: impl Into<String>, default_duration: u32) -> Self {
        Self {
            id: DeckId::new(),
            name: name.into(),
            default_duration,
            pages: Vec::new(),
        }
    }

    /// A deck pre-populated with `pages`, which become attached to it
    pub fn with_pages(name: impl Into<String>, default_duration: u32, pages: Vec<Page>) -> Self {
        let mut deck = Self::new(name, default_duration);
        deck.set_pages(pages);
        deck
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches_name(&self, name: &str) -> bool {
        same_name(&self.name, name)
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn default_duration(&self) -> u32 {
        self.default_duration
    }

    pub fn set_default_duration(&mut self, seconds: u32) {
        self.default_duration = seconds;
    }

    /// Pages in rotation order
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Replace the whole page sequence, attaching every new page to this deck.
    ///
    /// Returns the previous pages, detached.
    pub fn set_pages(&mut self, mut pages: Vec<Page>) -> Vec<Page> {
        for page in &mut pages {
            page.attach(self.id);
        }
        let mut old = std::mem::replace(&mut self.pages, pages);
        for page in &mut old {
            page.detach();
        }
        old
    }

    /// Append one page at the end of the rotation
    pub fn add_page(&mut self, mut page: Page) {
        page.attach(self.id);
        self.pages.push(page);
    }

    /// Remove and detach every page
    pub fn take_pages(&mut self) -> Vec<Page> {
        self.set_pages(Vec::new())
    }

    /// The persisted form of this deck
    pub fn to_stored(&self) -> StoredDeck {
        StoredDeck {
            name: self.name.clone(),
            default_duration: self.default_duration,
            pages: self
                .pages
                .iter()
                .map(|page| StoredPage {
                    kind: page.kind().to_string(),
                    override_duration: page.override_duration(),
                    fields: page.fields(),
                })
                .collect(),
        }
    }

    /// Rebuild a deck from its persisted form, running every page through its kind
    pub fn from_stored(stored: &StoredDeck, kinds: &KindRegistry) -> Result<Self, DeckError> {
        let forms: Vec<PageForm> = stored.pages.iter().map(PageForm::from).collect();
        let pages = kinds.build_pages(&forms)?;
        Ok(Self::with_pages(stored.name.trim(), stored.default_duration, pages))
    }
}
