use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use slideshow_core::{
    validation::parse_duration, Authorizer, DeckRegistry, DeckStore, DisplayTarget, Fields,
    KindRegistry, Operation, PageForm, RenderPayload, RootUrl, SlideShow, TomlFileStore,
    ValidationResult, DEFAULT_PAGE_DURATION,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod viewer;

pub use config::ServerConfig;
pub use error::ApiError;

/// Shared server state. Kinds are registered before decks are loaded, since loading rebuilds
/// every page through its kind.
#[derive(Clone)]
pub struct AppState {
    pub decks: Arc<DeckRegistry>,
    pub kinds: Arc<KindRegistry>,
    pub store: Arc<dyn DeckStore>,
    pub authorizer: Arc<dyn Authorizer>,
    pub resolver: Arc<RootUrl>,
    pub strict_html: bool,
    /// Held from snapshot to finished write, so saves land in mutation order
    save_lock: Arc<Mutex<()>>,
}

impl AppState {
    /// Load every stored deck and assemble the state
    pub fn load(
        kinds: KindRegistry,
        store: Arc<dyn DeckStore>,
        authorizer: Arc<dyn Authorizer>,
        resolver: RootUrl,
        strict_html: bool,
    ) -> anyhow::Result<Self> {
        let file = store.load()?;
        let decks = DeckRegistry::load(&file, &kinds)?;
        tracing::info!(decks = decks.len(), kinds = kinds.len(), "server state ready");
        Ok(Self {
            decks: Arc::new(decks),
            kinds: Arc::new(kinds),
            store,
            authorizer,
            resolver: Arc::new(resolver),
            strict_html,
            save_lock: Arc::new(Mutex::new(())),
        })
    }

    /// State for `config`, with the built-in page kinds and a TOML file store
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let resolver = match &config.root_url {
            Some(root) => RootUrl::new(root)
                .map_err(|e| anyhow::anyhow!("invalid root URL {:?}: {}", root, e))?,
            None => RootUrl::none(),
        };
        if config.auth.anonymous.contains(&slideshow_core::Permission::Administer) {
            tracing::warn!("anonymous callers may administer decks");
        }
        Self::load(
            KindRegistry::builtin(),
            Arc::new(TomlFileStore::new(&config.store)),
            Arc::new(config.auth.clone()),
            resolver,
            config.strict_html,
        )
    }

    /// Write the current decks to the store
    pub async fn persist(&self) -> anyhow::Result<()> {
        let _guard = self.save_lock.lock().await;
        let file = self.decks.snapshot();
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.save(&file)).await??;
        Ok(())
    }

    fn authorize(&self, headers: &HeaderMap, operation: Operation) -> Result<(), ApiError> {
        if self.authorizer.allows(bearer_token(headers), operation) {
            Ok(())
        } else {
            tracing::debug!(?operation, "denied");
            Err(ApiError::Forbidden(operation))
        }
    }

    /// Strict mode cleans inline markup before it leaves the server
    fn present(&self, payload: Option<RenderPayload>) -> Option<RenderPayload> {
        payload.map(|mut payload| {
            if self.strict_html {
                if let DisplayTarget::Inline { html } = &mut payload.target {
                    *html = viewer::inline_document(html, true);
                }
            }
            payload
        })
    }

    fn deck(&self, name: &str) -> Result<Arc<SlideShow>, ApiError> {
        self.decks
            .find(name)
            .ok_or_else(|| ApiError::NotFound(format!("deck {:?}", name)))
    }
}

/// Token from an `Authorization: Bearer …` header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Create the router for the deck server
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/kinds", get(list_kinds))
        .route("/kinds/:kind/check", post(check_kind_field))
        .route("/check/deck", get(check_deck_form))
        .route("/decks", get(list_decks).post(create_deck))
        .route("/decks/:name", get(get_deck).delete(delete_deck))
        .route("/decks/:name/show", get(show_deck))
        .route("/decks/:name/configure", post(configure_deck))
        .route("/decks/:name/rename", post(rename_deck))
        .route("/decks/:name/first", get(first_page))
        .route("/decks/:name/next", get(next_page))
        .route("/decks/:name/pages/:index/content", get(page_content))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KindView {
    id: &'static str,
    label: &'static str,
    fields: Vec<FieldView>,
}

#[derive(Serialize)]
struct FieldView {
    name: &'static str,
    label: &'static str,
    multiline: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeckSummary {
    name: String,
    default_duration: u32,
    pages: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeckView {
    name: String,
    default_duration: u32,
    pages: Vec<PageView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageView {
    index: usize,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    override_duration: Option<u32>,
    effective_duration: u32,
    fields: Fields,
}

impl DeckView {
    fn of(deck: &SlideShow) -> Result<Self, ApiError> {
        let pages = deck
            .pages()
            .iter()
            .enumerate()
            .map(|(index, page)| {
                Ok(PageView {
                    index,
                    kind: page.kind().to_string(),
                    override_duration: page.override_duration(),
                    effective_duration: page.effective_duration(deck)?,
                    fields: page.fields(),
                })
            })
            .collect::<Result<_, ApiError>>()?;
        Ok(Self {
            name: deck.name().to_string(),
            default_duration: deck.default_duration(),
            pages,
        })
    }
}

#[derive(Deserialize)]
struct FieldCheck {
    field: String,
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeckFormCheck {
    name: Option<String>,
    default_duration: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDeckRequest {
    name: String,
    default_duration: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigureRequest {
    default_duration: Option<i64>,
    #[serde(default)]
    pages: Vec<PageForm>,
}

#[derive(Deserialize)]
struct RenameRequest {
    name: String,
}

#[derive(Deserialize)]
struct NextQuery {
    #[serde(default = "before_first")]
    index: i64,
}

fn before_first() -> i64 {
    -1
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// Page kinds, in registration order, for building a choice list
async fn list_kinds(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<KindView>>, ApiError> {
    state.authorize(&headers, Operation::ListKinds)?;
    let kinds = state
        .kinds
        .list()
        .map(|kind| KindView {
            id: kind.id(),
            label: kind.label(),
            fields: kind
                .fields()
                .iter()
                .map(|f| FieldView {
                    name: f.name,
                    label: f.label,
                    multiline: f.multiline,
                })
                .collect(),
        })
        .collect();
    Ok(Json(kinds))
}

/// Feedback for a single field while a page form is being filled in
async fn check_kind_field(
    State(state): State<AppState>,
    AxumPath(kind): AxumPath<String>,
    Json(check): Json<FieldCheck>,
) -> Result<Json<ValidationResult>, ApiError> {
    if state.kinds.get(&kind).is_none() {
        return Err(ApiError::NotFound(format!("page kind {:?}", kind)));
    }
    let result = state.kinds.check_field(&kind, &check.field, &check.value)?;
    Ok(Json(result))
}

/// Feedback for the deck form: name availability and default duration
async fn check_deck_form(
    State(state): State<AppState>,
    Query(form): Query<DeckFormCheck>,
) -> Json<ValidationResult> {
    let mut result = ValidationResult::new();
    if let Some(name) = &form.name {
        if let Err(error) = state.decks.check_name(name) {
            result.add_error("name", error);
        }
    }
    if let Some(duration) = &form.default_duration {
        if let Err(error) = parse_duration(duration) {
            result.add_error("defaultDuration", error);
        }
    }
    Json(result)
}

async fn list_decks(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<DeckSummary>>, ApiError> {
    state.authorize(&headers, Operation::ListDecks)?;
    let decks = state
        .decks
        .list()
        .iter()
        .map(|deck| DeckSummary {
            name: deck.name().to_string(),
            default_duration: deck.default_duration(),
            pages: deck.len(),
        })
        .collect();
    Ok(Json(decks))
}

async fn create_deck(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateDeckRequest>,
) -> Result<(StatusCode, Json<DeckView>), ApiError> {
    state.authorize(&headers, Operation::CreateDeck)?;
    let duration = request
        .default_duration
        .unwrap_or(i64::from(DEFAULT_PAGE_DURATION));
    let deck = state.decks.create(&request.name, duration)?;
    state.persist().await?;
    Ok((StatusCode::CREATED, Json(DeckView::of(&deck)?)))
}

async fn get_deck(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(name): AxumPath<String>,
) -> Result<Json<DeckView>, ApiError> {
    state.authorize(&headers, Operation::ViewDeck)?;
    let deck = state.deck(&name)?;
    Ok(Json(DeckView::of(&deck)?))
}

/// Kiosk viewer for a deck
async fn show_deck(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(name): AxumPath<String>,
) -> Result<Html<String>, ApiError> {
    state.authorize(&headers, Operation::ViewDeck)?;
    let deck = state.deck(&name)?;
    Ok(Html(viewer::viewer_html(deck.name())))
}

/// Replace the whole page sequence, and optionally the default duration, in one step
async fn configure_deck(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(name): AxumPath<String>,
    Json(request): Json<ConfigureRequest>,
) -> Result<Json<DeckView>, ApiError> {
    state.authorize(&headers, Operation::ConfigureDeck)?;
    state.deck(&name)?;
    let pages = state.kinds.build_pages(&request.pages)?;
    let deck = state.decks.configure(&name, request.default_duration, pages)?;
    state.persist().await?;
    Ok(Json(DeckView::of(&deck)?))
}

async fn rename_deck(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(name): AxumPath<String>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<DeckView>, ApiError> {
    state.authorize(&headers, Operation::RenameDeck)?;
    let deck = state.decks.rename(&name, &request.name)?;
    state.persist().await?;
    Ok(Json(DeckView::of(&deck)?))
}

async fn delete_deck(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(name): AxumPath<String>,
) -> Result<StatusCode, ApiError> {
    state.authorize(&headers, Operation::DeleteDeck)?;
    if state.decks.delete(&name).is_none() {
        return Err(ApiError::NotFound(format!("deck {:?}", name)));
    }
    state.persist().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// First page of the rotation; `null` when the deck is empty
async fn first_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(name): AxumPath<String>,
) -> Result<Json<Option<RenderPayload>>, ApiError> {
    state.authorize(&headers, Operation::PollRotation)?;
    let deck = state.deck(&name)?;
    Ok(Json(state.present(deck.first_page(state.resolver.as_ref())?)))
}

/// Page after `index`; `null` when the deck is empty
async fn next_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(name): AxumPath<String>,
    Query(query): Query<NextQuery>,
) -> Result<Json<Option<RenderPayload>>, ApiError> {
    state.authorize(&headers, Operation::PollRotation)?;
    let deck = state.deck(&name)?;
    let payload = deck.next_page(query.index, state.resolver.as_ref())?;
    Ok(Json(state.present(payload)))
}

/// Render target for the page at `index`: inline markup is served, URLs are redirected to
async fn page_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath((name, index)): AxumPath<(String, usize)>,
) -> Result<Response, ApiError> {
    state.authorize(&headers, Operation::PollRotation)?;
    let deck = state.deck(&name)?;
    let page = deck
        .page(index)
        .ok_or_else(|| ApiError::NotFound(format!("page {} of deck {:?}", index, name)))?;
    let response = match page.resolve(state.resolver.as_ref()) {
        DisplayTarget::Inline { html } => {
            Html(viewer::inline_document(&html, state.strict_html)).into_response()
        }
        DisplayTarget::Navigate { url } => Redirect::temporary(&url).into_response(),
    };
    Ok(response)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

/// Serve decks as configured until Ctrl-C, then flush a final save
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(
        addr = %config.bind_addr(),
        store = %config.store.display(),
        "slideshow server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.persist().await?;
    Ok(())
}
