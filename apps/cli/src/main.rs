use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use slideshow_core::{
    schema, DeckRegistry, DeckStore, DisplayTarget, Fields, KindRegistry, PageForm, RootUrl,
    TomlFileStore,
};
use slideshow_server::ServerConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "slideshow")]
#[command(about = "Rotating slide-show decks for kiosk displays")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Server configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Deck file; overrides the configured store
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve decks over HTTP
    Serve {
        /// Port to run server on
        #[arg(long)]
        port: Option<u16>,
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Base URL for relative page URLs
        #[arg(long)]
        root_url: Option<String>,
        /// Sanitize inline HTML pages
        #[arg(long)]
        strict: bool,
    },
    /// List decks
    List,
    /// Show a deck and its pages
    Show { name: String },
    /// Create an empty deck
    Create {
        name: String,
        /// Default seconds per page
        #[arg(long, default_value_t = 20)]
        duration: i64,
    },
    /// Delete a deck
    Delete { name: String },
    /// Rename a deck
    Rename { old: String, new: String },
    /// Append a page to a deck
    AddPage {
        deck: String,
        /// Page kind id (see `slideshow kinds`)
        kind: String,
        /// Seconds to show this page instead of the deck default
        #[arg(long = "override")]
        override_duration: Option<i64>,
        /// Page field as key=value; repeatable
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Print the page the rotation shows after INDEX
    Next {
        name: String,
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        index: i64,
        /// Base URL for relative page URLs
        #[arg(long)]
        root_url: Option<String>,
    },
    /// List the available page kinds
    Kinds,
    /// Check that the deck file loads cleanly
    Validate,
    /// Print JSON schemas for the deck file and server grants
    Schema,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got {:?}", raw))
}

fn init_tracing(verbose: u8, serving: bool) {
    let default = match (verbose, serving) {
        (0, false) => "warn",
        (0, true) | (1, _) => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

/// The deck file plus the registries loaded from it
struct Workspace {
    store: TomlFileStore,
    kinds: KindRegistry,
    decks: DeckRegistry,
}

impl Workspace {
    fn open(config: &ServerConfig) -> Result<Self> {
        let store = TomlFileStore::new(&config.store);
        let kinds = KindRegistry::builtin();
        let file = store.load()?;
        let decks = DeckRegistry::load(&file, &kinds)
            .with_context(|| format!("loading decks from {}", store.path().display()))?;
        tracing::debug!(store = %store.path().display(), decks = decks.len(), "opened deck file");
        Ok(Self { store, kinds, decks })
    }

    fn save(&self) -> Result<()> {
        self.store.save(&self.decks.snapshot())?;
        Ok(())
    }
}

fn resolver(root_url: Option<&str>) -> Result<RootUrl> {
    match root_url {
        Some(root) => RootUrl::new(root).with_context(|| format!("invalid root URL {:?}", root)),
        None => Ok(RootUrl::none()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, matches!(cli.command, Commands::Serve { .. }));

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    if let Some(store) = cli.store {
        config.store = store;
    }

    match cli.command {
        Commands::Serve { port, host, root_url, strict } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            if root_url.is_some() {
                config.root_url = root_url;
            }
            config.strict_html |= strict;
            println!("Serving {} on http://{}", config.store.display(), config.bind_addr());
            slideshow_server::start_server(config).await?;
        }
        Commands::List => {
            let ws = Workspace::open(&config)?;
            for deck in ws.decks.list() {
                println!("{}\t{} pages\t{}s", deck.name(), deck.len(), deck.default_duration());
            }
        }
        Commands::Show { name } => {
            let ws = Workspace::open(&config)?;
            let deck = ws
                .decks
                .find(&name)
                .with_context(|| format!("no deck named {:?}", name))?;
            println!("{} (default {}s)", deck.name(), deck.default_duration());
            for (index, page) in deck.pages().iter().enumerate() {
                let duration = page.effective_duration(&deck)?;
                let fields = page
                    .fields()
                    .iter()
                    .map(|(k, v)| format!("{}={:?}", k, v))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("  [{}] {} {}s {}", index, page.kind(), duration, fields);
            }
        }
        Commands::Create { name, duration } => {
            let ws = Workspace::open(&config)?;
            let deck = ws.decks.create(&name, duration)?;
            ws.save()?;
            println!("✓ Created deck {}", deck.name());
        }
        Commands::Delete { name } => {
            let ws = Workspace::open(&config)?;
            ws.decks
                .delete(&name)
                .with_context(|| format!("no deck named {:?}", name))?;
            ws.save()?;
            println!("✓ Deleted deck {}", name);
        }
        Commands::Rename { old, new } => {
            let ws = Workspace::open(&config)?;
            let deck = ws.decks.rename(&old, &new)?;
            ws.save()?;
            println!("✓ Renamed {} to {}", old, deck.name());
        }
        Commands::AddPage { deck, kind, override_duration, fields } => {
            let ws = Workspace::open(&config)?;
            let mut form = PageForm::new(kind, fields.into_iter().collect::<Fields>());
            form.override_duration = override_duration;
            let page = ws
                .kinds
                .build_pages(std::slice::from_ref(&form))?
                .into_iter()
                .next()
                .context("no page built")?;
            let updated = ws.decks.append_page(&deck, page)?;
            ws.save()?;
            println!("✓ Added {} page {} to {}", form.kind, updated.len() - 1, updated.name());
        }
        Commands::Next { name, index, root_url } => {
            let root_url = root_url.or_else(|| config.root_url.clone());
            let resolver = resolver(root_url.as_deref())?;
            let ws = Workspace::open(&config)?;
            let deck = ws
                .decks
                .find(&name)
                .with_context(|| format!("no deck named {:?}", name))?;
            match deck.next_page(index, &resolver)? {
                None => println!("{} has no pages", deck.name()),
                Some(payload) => {
                    let target = match &payload.target {
                        DisplayTarget::Navigate { url } => url.clone(),
                        DisplayTarget::Inline { html } => format!("inline ({} bytes)", html.len()),
                    };
                    println!("[{}] {} for {}s", payload.index, target, payload.duration);
                }
            }
        }
        Commands::Kinds => {
            for kind in KindRegistry::builtin().list() {
                let fields = kind.fields().iter().map(|f| f.name).collect::<Vec<_>>().join(", ");
                println!("{}\t{}\t[{}]", kind.id(), kind.label(), fields);
            }
        }
        Commands::Validate => {
            let ws = Workspace::open(&config)?;
            let pages: usize = ws.decks.list().iter().map(|deck| deck.len()).sum();
            println!(
                "✓ {} is valid: {} decks, {} pages",
                ws.store.path().display(),
                ws.decks.len(),
                pages
            );
        }
        Commands::Schema => {
            let schemas = schema::generate_schemas()?;
            println!("{}", serde_json::to_string_pretty(&schemas)?);
        }
    }

    Ok(())
}
