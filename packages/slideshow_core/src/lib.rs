//! Core of Slideshow: decks of pages that rotate on a kiosk display.
//!
//! A [`SlideShow`] owns an ordered list of [`Page`]s. Each page's content comes from a
//! [`PageKind`] registered in the [`KindRegistry`]. The [`rotation`] functions decide what to
//! show next, and the [`DeckRegistry`] holds every deck behind a read-mostly lock.

pub mod deck;
pub mod error;
pub mod ir;
pub mod kinds;
pub mod page;
pub mod permission;
pub mod registry;
pub mod rotation;
pub mod schema;
pub mod store;
pub mod validation;

pub use deck::{DeckId, SlideShow, DEFAULT_PAGE_DURATION};
pub use error::DeckError;
pub use ir::{DeckFile, PageForm, StoredDeck, StoredPage};
pub use kinds::{FieldSpec, HtmlKind, HtmlPage, KindRegistry, PageKind, UrlKind, UrlPage};
pub use page::{DisplayTarget, Fields, Page, PageContent, RootUrl, UrlResolver};
pub use permission::{Authorizer, GrantTable, Operation, Permission, TokenGrant};
pub use registry::DeckRegistry;
pub use rotation::{next_index, RenderPayload};
pub use store::{DeckStore, MemoryStore, StoreError, TomlFileStore};
pub use validation::{FieldError, ValidationError, ValidationResult};
