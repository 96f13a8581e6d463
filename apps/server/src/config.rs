use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use slideshow_core::GrantTable;
use std::path::{Path, PathBuf};

/// Server settings, read from `slideshow.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Application root that relative page URLs are qualified against
    pub root_url: Option<String>,
    /// Deck file
    pub store: PathBuf,
    /// Sanitize inline HTML pages before serving them
    pub strict_html: bool,
    /// Who may do what; anything goes when no grants are configured
    pub auth: GrantTable,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5173,
            root_url: None,
            store: PathBuf::from("decks.toml"),
            strict_html: false,
            auth: GrantTable::open(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("parsing server configuration")
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Read `path` when given, otherwise use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_toml_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
