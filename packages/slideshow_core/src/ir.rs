use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::deck::DEFAULT_PAGE_DURATION;

/// DeckFile is the persisted collection of all decks, in display order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeckFile {
    /// Decks in the order they are listed
    #[serde(default)]
    pub decks: Vec<StoredDeck>,
}

/// StoredDeck is the persisted form of a single slide show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredDeck {
    /// Unique (case-insensitive) name of the deck
    pub name: String,
    /// Seconds each page is shown unless the page overrides it
    #[serde(default = "default_page_duration")]
    pub default_duration: u32,
    /// Pages in rotation order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<StoredPage>,
}

/// StoredPage is the persisted form of one page; the owning deck is implied by nesting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredPage {
    /// Page kind identifier, e.g. `url` or `html`
    pub kind: String,
    /// Display time for this page, replacing the deck default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_duration: Option<u32>,
    /// Kind-specific configuration fields
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// PageForm is one submitted page of a deck configuration form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageForm {
    /// Page kind identifier chosen from the kind list
    pub kind: String,
    /// Optional display time override; must not be negative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_duration: Option<i64>,
    /// Raw field values as typed into the form
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl PageForm {
    pub fn new(kind: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self {
            kind: kind.into(),
            override_duration: None,
            fields,
        }
    }
}

impl From<&StoredPage> for PageForm {
    fn from(page: &StoredPage) -> Self {
        Self {
            kind: page.kind.clone(),
            override_duration: page.override_duration.map(i64::from),
            fields: page.fields.clone(),
        }
    }
}

fn default_page_duration() -> u32 {
    DEFAULT_PAGE_DURATION
}
