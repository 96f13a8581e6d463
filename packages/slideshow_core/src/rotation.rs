//! Rotation engine: which page comes next, and what the client should do with it.
//!
//! Nothing here holds state. The client sends back the index it was last given and the engine
//! answers with the following page, wrapping to the start at the end of the deck. Indices the
//! client should not have (negative, past the end) wrap to the first page instead of failing,
//! and an empty deck answers "no pages".

use crate::deck::SlideShow;
use crate::error::DeckError;
use crate::page::{DisplayTarget, UrlResolver};
use serde::Serialize;

/// What the client needs to show a page and schedule its next poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPayload {
    pub target: DisplayTarget,
    /// Absolute index of the page in its deck; sent back on the next poll
    pub index: usize,
    /// Effective display time in seconds
    pub duration: u32,
    /// Same as `duration`, in milliseconds
    pub duration_ms: u64,
}

impl RenderPayload {
    pub fn new(target: DisplayTarget, index: usize, duration: u32) -> Self {
        Self {
            target,
            index,
            duration,
            duration_ms: u64::from(duration) * 1000,
        }
    }
}

/// Index of the page after `current`, or `None` when there are no pages at all
pub fn next_index<T>(pages: &[T], current: i64) -> Option<usize> {
    let len = pages.len();
    if len == 0 {
        return None;
    }
    match usize::try_from(current) {
        Ok(index) if index < len - 1 => Some(index + 1),
        _ => Some(0),
    }
}

/// Payload for the page at `index`; `None` if the deck has no such page
pub fn payload_at(
    deck: &SlideShow,
    index: usize,
    resolver: &dyn UrlResolver,
) -> Result<Option<RenderPayload>, DeckError> {
    let Some(page) = deck.page(index) else {
        return Ok(None);
    };
    let duration = page.effective_duration(deck)?;
    Ok(Some(RenderPayload::new(page.resolve(resolver), index, duration)))
}

/// The first page of the deck, if it has any
pub fn first_page(deck: &SlideShow, resolver: &dyn UrlResolver) -> Result<Option<RenderPayload>, DeckError> {
    payload_at(deck, 0, resolver)
}

/// The page to show after the one at `current`
pub fn next_page(
    deck: &SlideShow,
    current: i64,
    resolver: &dyn UrlResolver,
) -> Result<Option<RenderPayload>, DeckError> {
    let Some(index) = next_index(deck.pages(), current) else {
        tracing::debug!(deck = deck.name(), current, "deck has no pages");
        return Ok(None);
    };
    tracing::debug!(deck = deck.name(), current, next = index, "advancing rotation");
    payload_at(deck, index, resolver)
}

impl SlideShow {
    pub fn next_index(&self, current: i64) -> Option<usize> {
        next_index(self.pages(), current)
    }

    pub fn first_page(&self, resolver: &dyn UrlResolver) -> Result<Option<RenderPayload>, DeckError> {
        first_page(self, resolver)
    }

    pub fn next_page(&self, current: i64, resolver: &dyn UrlResolver) -> Result<Option<RenderPayload>, DeckError> {
        next_page(self, current, resolver)
    }
}
