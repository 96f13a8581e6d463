use crate::ir::DeckFile;
use parking_lot::Mutex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SS4001: Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("SS4002: Failed to parse {}: {source}", .path.display())]
    Parse { path: PathBuf, source: toml::de::Error },

    #[error("SS4003: Failed to serialize decks: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("SS4004: Failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Where decks live between runs
pub trait DeckStore: Send + Sync {
    /// Every stored deck; an uninitialised store yields an empty file
    fn load(&self) -> Result<DeckFile, StoreError>;

    /// Replace the stored decks
    fn save(&self, file: &DeckFile) -> Result<(), StoreError>;
}

/// Decks kept in a single TOML file
#[derive(Debug, Clone)]
pub struct TomlFileStore {
    path: PathBuf,
}

impl TomlFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, source: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl DeckStore for TomlFileStore {
    fn load(&self) -> Result<DeckFile, StoreError> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no deck file yet");
            return Ok(DeckFile::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, file: &DeckFile) -> Result<(), StoreError> {
        let content = toml::to_string_pretty(file)?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.write_err(e))?;

        // write next to the target and rename so readers never see a partial file
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.write_err(e))?;
        tmp.write_all(content.as_bytes()).map_err(|e| self.write_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.write_err(e.error))?;

        tracing::debug!(path = %self.path.display(), decks = file.decks.len(), "saved decks");
        Ok(())
    }
}

/// In-memory store, for tests and throwaway servers
#[derive(Debug, Default)]
pub struct MemoryStore {
    file: Mutex<DeckFile>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new(file: DeckFile) -> Self {
        Self {
            file: Mutex::new(file),
            saves: AtomicUsize::new(0),
        }
    }

    /// How many times `save` has been called
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn contents(&self) -> DeckFile {
        self.file.lock().clone()
    }
}

impl DeckStore for MemoryStore {
    fn load(&self) -> Result<DeckFile, StoreError> {
        Ok(self.file.lock().clone())
    }

    fn save(&self, file: &DeckFile) -> Result<(), StoreError> {
        *self.file.lock() = file.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
