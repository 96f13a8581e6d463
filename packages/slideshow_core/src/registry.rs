//! The shared collection of decks.
//!
//! Decks are stored as `Arc<SlideShow>` snapshots. Readers clone the `Arc` under a short read
//! lock and work on that snapshot; writers build a modified copy and swap it in under the write
//! lock, so a poll sees either the old page sequence or the new one, never a mix.

use crate::deck::{same_name, SlideShow};
use crate::error::DeckError;
use crate::ir::DeckFile;
use crate::kinds::KindRegistry;
use crate::page::Page;
use crate::validation::{check_duration, check_name, ValidationError, ValidationResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// Ordered, name-keyed collection of decks
#[derive(Debug, Default)]
pub struct DeckRegistry {
    decks: RwLock<Vec<Arc<SlideShow>>>,
}

impl DeckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry with existing decks, rejecting name clashes
    pub fn from_decks(decks: impl IntoIterator<Item = SlideShow>) -> Result<Self, DeckError> {
        let registry = Self::new();
        for deck in decks {
            registry.insert(deck)?;
        }
        Ok(registry)
    }

    /// Rebuild the registry from a persisted snapshot
    pub fn load(file: &DeckFile, kinds: &KindRegistry) -> Result<Self, DeckError> {
        let decks = file
            .decks
            .iter()
            .map(|stored| SlideShow::from_stored(stored, kinds))
            .collect::<Result<Vec<_>, _>>()?;
        let registry = Self::from_decks(decks)?;
        tracing::info!(decks = registry.len(), "loaded decks");
        Ok(registry)
    }

    /// The persisted form of every deck, in order
    pub fn snapshot(&self) -> DeckFile {
        DeckFile {
            decks: self.decks.read().iter().map(|deck| deck.to_stored()).collect(),
        }
    }

    /// Every deck, in creation order
    pub fn list(&self) -> Vec<Arc<SlideShow>> {
        self.decks.read().clone()
    }

    pub fn len(&self) -> usize {
        self.decks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.decks.read().is_empty()
    }

    /// Case-insensitive lookup
    pub fn find(&self, name: &str) -> Option<Arc<SlideShow>> {
        self.decks.read().iter().find(|deck| deck.matches_name(name)).cloned()
    }

    /// Form check for a new deck name: present and not taken, compared the way `create` stores it
    pub fn check_name(&self, name: &str) -> Result<(), ValidationError> {
        let name = name.trim();
        check_name(name)?;
        if self.find(name).is_some() {
            return Err(ValidationError::NameTaken {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Create an empty deck
    pub fn create(&self, name: &str, default_duration: i64) -> Result<Arc<SlideShow>, DeckError> {
        let mut result = ValidationResult::new();
        if let Err(error) = check_name(name) {
            result.add_error("name", error);
        }
        let duration = match check_duration(default_duration) {
            Ok(seconds) => seconds,
            Err(error) => {
                result.add_error("defaultDuration", error);
                0
            }
        };
        if !result.is_valid() {
            return Err(DeckError::Invalid(result));
        }
        self.insert(SlideShow::new(name.trim(), duration))
    }

    /// Add a deck, possibly pre-populated
    pub fn insert(&self, deck: SlideShow) -> Result<Arc<SlideShow>, DeckError> {
        check_name(deck.name()).map_err(|error| ValidationResult::single("name", error))?;
        let mut decks = self.decks.write();
        if decks.iter().any(|d| d.matches_name(deck.name())) {
            return Err(DeckError::DuplicateName {
                name: deck.name().to_string(),
            });
        }
        let deck = Arc::new(deck);
        decks.push(Arc::clone(&deck));
        tracing::info!(deck = deck.name(), pages = deck.len(), "added deck");
        Ok(deck)
    }

    /// Remove a deck; `None` when there was no such deck
    pub fn delete(&self, name: &str) -> Option<Arc<SlideShow>> {
        let mut decks = self.decks.write();
        let position = decks.iter().position(|deck| deck.matches_name(name))?;
        let removed = decks.remove(position);
        tracing::info!(deck = removed.name(), "deleted deck");
        Some(removed)
    }

    /// Give a deck a new name; changing only the case of its own name is allowed
    pub fn rename(&self, name: &str, new_name: &str) -> Result<Arc<SlideShow>, DeckError> {
        check_name(new_name).map_err(|error| ValidationResult::single("name", error))?;
        let new_name = new_name.trim();
        let mut decks = self.decks.write();
        let position = Self::position(&decks, name)?;
        if decks
            .iter()
            .enumerate()
            .any(|(i, d)| i != position && d.matches_name(new_name))
        {
            return Err(DeckError::DuplicateName {
                name: new_name.to_string(),
            });
        }
        let mut deck = SlideShow::clone(&decks[position]);
        tracing::info!(deck = deck.name(), new_name, "renamed deck");
        deck.set_name(new_name);
        Ok(Self::swap(&mut decks, position, deck))
    }

    /// Atomically replace a deck's pages; every new page is attached to the deck
    pub fn replace_pages(&self, name: &str, pages: Vec<Page>) -> Result<Arc<SlideShow>, DeckError> {
        self.update(name, |deck| {
            deck.set_pages(pages);
        })
    }

    /// Append a page to the end of a deck's rotation
    pub fn append_page(&self, name: &str, page: Page) -> Result<Arc<SlideShow>, DeckError> {
        self.update(name, |deck| deck.add_page(page))
    }

    pub fn set_default_duration(&self, name: &str, seconds: i64) -> Result<Arc<SlideShow>, DeckError> {
        let seconds = check_duration(seconds).map_err(|error| ValidationResult::single("defaultDuration", error))?;
        self.update(name, |deck| deck.set_default_duration(seconds))
    }

    /// Apply a submitted configuration: the default duration (when given) and the full page
    /// sequence change together in one step
    pub fn configure(
        &self,
        name: &str,
        default_duration: Option<i64>,
        pages: Vec<Page>,
    ) -> Result<Arc<SlideShow>, DeckError> {
        let seconds = default_duration
            .map(check_duration)
            .transpose()
            .map_err(|error| ValidationResult::single("defaultDuration", error))?;
        self.update(name, |deck| {
            if let Some(seconds) = seconds {
                deck.set_default_duration(seconds);
            }
            deck.set_pages(pages);
        })
    }

    fn update(
        &self,
        name: &str,
        f: impl FnOnce(&mut SlideShow),
    ) -> Result<Arc<SlideShow>, DeckError> {
        let mut decks = self.decks.write();
        let position = Self::position(&decks, name)?;
        let mut deck = SlideShow::clone(&decks[position]);
        f(&mut deck);
        tracing::info!(deck = deck.name(), pages = deck.len(), "updated deck");
        Ok(Self::swap(&mut decks, position, deck))
    }

    fn position(decks: &[Arc<SlideShow>], name: &str) -> Result<usize, DeckError> {
        decks
            .iter()
            .position(|deck| same_name(deck.name(), name))
            .ok_or_else(|| DeckError::NotFound {
                name: name.to_string(),
            })
    }

    fn swap(decks: &mut [Arc<SlideShow>], position: usize, deck: SlideShow) -> Arc<SlideShow> {
        let deck = Arc::new(deck);
        decks[position] = Arc::clone(&deck);
        deck
    }
}
