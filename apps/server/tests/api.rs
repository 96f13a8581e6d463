use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use slideshow_core::{
    DeckFile, DeckStore, GrantTable, KindRegistry, MemoryStore, Permission, RootUrl, StoreError,
    TokenGrant,
};
use slideshow_server::{create_router, AppState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn state_with(store: Arc<dyn DeckStore>, grants: GrantTable, strict_html: bool) -> AppState {
    AppState::load(
        KindRegistry::builtin(),
        store,
        Arc::new(grants),
        RootUrl::new("http://ci.local/jenkins").unwrap(),
        strict_html,
    )
    .unwrap()
}

fn app(grants: GrantTable) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(DeckFile::default()));
    (create_router(state_with(store.clone(), grants, false)), store)
}

/// Stalls the first save so the next one can finish before it
#[derive(Default)]
struct SlowFirstSave {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl DeckStore for SlowFirstSave {
    fn load(&self) -> Result<DeckFile, StoreError> {
        self.inner.load()
    }

    fn save(&self, file: &DeckFile) -> Result<(), StoreError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(300));
        }
        self.inner.save(file)
    }
}

/// A store on a read-only disk
struct ReadOnlyStore;

impl DeckStore for ReadOnlyStore {
    fn load(&self) -> Result<DeckFile, StoreError> {
        Ok(DeckFile::default())
    }

    fn save(&self, _file: &DeckFile) -> Result<(), StoreError> {
        Err(StoreError::Write {
            path: "/ro/decks.toml".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only file system"),
        })
    }
}

fn open_app() -> (Router, Arc<MemoryStore>) {
    app(GrantTable::open())
}

fn request(method: &str, uri: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send_raw(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8_lossy(&bytes).into_owned())
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send_raw(app, req).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&body).unwrap()
    };
    (status, value)
}

async fn lobby(app: &Router) {
    let (status, _) = send(
        app,
        request("POST", "/decks", Some(json!({ "name": "Lobby", "defaultDuration": 10 })), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(
        app,
        request(
            "POST",
            "/decks/Lobby/configure",
            Some(json!({
                "pages": [
                    { "kind": "url", "fields": { "url": "http://a" } },
                    { "kind": "html", "fields": { "html": "hi" } },
                    { "kind": "url", "overrideDuration": 3, "fields": { "url": "job/nightly" } }
                ]
            })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn health_check_answers() {
    let (app, _) = open_app();
    let (status, body) = send(&app, request("GET", "/healthz", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn kinds_are_listed_in_registration_order() {
    let (app, _) = open_app();
    let (_, body) = send(&app, request("GET", "/kinds", None, None)).await;
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["url", "html"]);
    assert_eq!(body[1]["fields"][0]["multiline"], json!(true));
}

#[tokio::test]
async fn configured_deck_rotates_and_wraps() {
    let (app, store) = open_app();
    lobby(&app).await;
    assert_eq!(store.saves(), 2);

    let (_, first) = send(&app, request("GET", "/decks/Lobby/first", None, None)).await;
    assert_eq!(first["target"], json!({ "type": "navigate", "url": "http://a" }));
    assert_eq!(first["index"], 0);
    assert_eq!(first["duration"], 10);
    assert_eq!(first["durationMs"], 10000);

    let (_, second) = send(&app, request("GET", "/decks/Lobby/next?index=0", None, None)).await;
    assert_eq!(second["target"]["type"], "inline");
    assert!(second["target"]["html"].as_str().unwrap().contains("<body>hi</body>"));

    let (_, third) = send(&app, request("GET", "/decks/Lobby/next?index=1", None, None)).await;
    assert_eq!(third["target"]["url"], "http://ci.local/jenkins/job/nightly");
    assert_eq!(third["duration"], 3);

    let (_, wrapped) = send(&app, request("GET", "/decks/Lobby/next?index=2", None, None)).await;
    assert_eq!(wrapped, first);

    // an index past the end restarts the rotation
    let (_, stale) = send(&app, request("GET", "/decks/Lobby/next?index=99", None, None)).await;
    assert_eq!(stale, first);
}

#[tokio::test]
async fn deck_view_reports_effective_durations() {
    let (app, _) = open_app();
    lobby(&app).await;
    let (status, deck) = send(&app, request("GET", "/decks/lobby", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deck["name"], "Lobby");
    let durations: Vec<i64> = deck["pages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["effectiveDuration"].as_i64().unwrap())
        .collect();
    assert_eq!(durations, [10, 10, 3]);
    assert_eq!(deck["pages"][2]["overrideDuration"], 3);
}

#[tokio::test]
async fn empty_deck_polls_as_null() {
    let (app, _) = open_app();
    send(&app, request("POST", "/decks", Some(json!({ "name": "Empty" })), None)).await;
    let (status, body) = send(&app, request("GET", "/decks/Empty/first", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
    let (_, body) = send(&app, request("GET", "/decks/Empty/next?index=4", None, None)).await;
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn invalid_configuration_is_rejected_whole() {
    let (app, store) = open_app();
    lobby(&app).await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/decks/Lobby/configure",
            Some(json!({
                "defaultDuration": -1,
                "pages": [
                    { "kind": "url", "fields": { "url": "" } },
                    { "kind": "video", "fields": {} },
                    { "kind": "html", "overrideDuration": -5, "fields": { "html": "ok" } }
                ]
            })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"pages[0].url"));
    assert!(fields.contains(&"pages[1].kind"));
    assert!(fields.contains(&"pages[2].overrideDuration"));

    // nothing changed and nothing was written
    let (_, deck) = send(&app, request("GET", "/decks/Lobby", None, None)).await;
    assert_eq!(deck["pages"].as_array().unwrap().len(), 3);
    assert_eq!(deck["defaultDuration"], 10);
    assert_eq!(store.saves(), 2);
}

#[tokio::test]
async fn deck_names_are_unique_ignoring_case() {
    let (app, _) = open_app();
    lobby(&app).await;
    let (status, body) =
        send(&app, request("POST", "/decks", Some(json!({ "name": "LOBBY" })), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("SS2001"));

    let (status, body) = send(&app, request("POST", "/decks", Some(json!({ "name": "  " })), None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["field"], "name");
}

#[tokio::test]
async fn rename_and_delete() {
    let (app, store) = open_app();
    lobby(&app).await;

    let (status, body) = send(
        &app,
        request("POST", "/decks/Lobby/rename", Some(json!({ "name": "Atrium" })), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Atrium");
    assert_eq!(store.contents().decks[0].name, "Atrium");

    let (status, _) = send(&app, request("GET", "/decks/Lobby/first", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, request("DELETE", "/decks/Atrium", None, None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(store.contents().decks.is_empty());

    let (status, _) = send(&app, request("DELETE", "/decks/Atrium", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn permissions_gate_administration_but_not_viewing() {
    let grants = GrantTable {
        anonymous: vec![Permission::List],
        tokens: vec![TokenGrant {
            token: "editor".to_string(),
            permissions: vec![Permission::Create],
        }],
    };
    let (app, _) = app(grants);

    let create = json!({ "name": "Lobby" });
    let (status, _) = send(&app, request("POST", "/decks", Some(create.clone()), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, request("POST", "/decks", Some(create.clone()), Some("wrong"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, request("POST", "/decks", Some(create), Some("editor"))).await;
    assert_eq!(status, StatusCode::CREATED);

    // create implies configure
    let pages = json!({ "pages": [{ "kind": "url", "fields": { "url": "http://a" } }] });
    let (status, _) = send(
        &app,
        request("POST", "/decks/Lobby/configure", Some(pages), Some("editor")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, request("DELETE", "/decks/Lobby", None, Some("editor"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, request("GET", "/decks", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, request("GET", "/decks/Lobby/first", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["target"]["url"], "http://a");
}

#[tokio::test]
async fn form_checks_report_field_errors() {
    let (app, _) = open_app();
    lobby(&app).await;

    let (_, body) = send(
        &app,
        request("GET", "/check/deck?name=lobby&defaultDuration=-3", None, None),
    )
    .await;
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["name", "defaultDuration"]);

    let (_, body) = send(&app, request("GET", "/check/deck?name=Atrium&defaultDuration=15", None, None)).await;
    assert_eq!(body["errors"], json!([]));

    // padded names are compared the way create stores them
    let (_, body) = send(&app, request("GET", "/check/deck?name=%20lobby%20", None, None)).await;
    assert_eq!(body["errors"][0]["field"], "name");
    assert!(body["errors"][0]["message"].as_str().unwrap().contains("SS1002"));

    let (status, body) = send(
        &app,
        request("POST", "/kinds/url/check", Some(json!({ "field": "url", "value": "not a url" })), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["errors"][0]["field"], "url");

    let (status, _) = send(
        &app,
        request("POST", "/kinds/video/check", Some(json!({ "field": "src", "value": "x" })), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn page_content_serves_inline_markup_and_redirects_urls() {
    let (app, _) = open_app();
    lobby(&app).await;

    let (status, headers, body) =
        send_raw(&app, request("GET", "/decks/Lobby/pages/1/content", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    assert!(body.contains("<body>hi</body>"));

    let (status, headers, _) =
        send_raw(&app, request("GET", "/decks/Lobby/pages/2/content", None, None)).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(headers[header::LOCATION], "http://ci.local/jenkins/job/nightly");

    let (status, _, _) = send_raw(&app, request("GET", "/decks/Lobby/pages/7/content", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn viewer_page_polls_the_deck() {
    let (app, _) = open_app();
    lobby(&app).await;
    let (status, _, body) = send_raw(&app, request("GET", "/decks/Lobby/show", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<title>Lobby</title>"));
    assert!(body.contains(r#"encodeURIComponent("Lobby")"#));

    let (status, _, _) = send_raw(&app, request("GET", "/decks/Nope/show", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn configured_server_writes_the_deck_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = slideshow_server::ServerConfig {
        store: dir.path().join("decks.toml"),
        root_url: Some("http://ci.local/jenkins".to_string()),
        ..Default::default()
    };
    let state = AppState::from_config(&config).unwrap();
    let app = create_router(state.clone());
    lobby(&app).await;

    let saved = std::fs::read_to_string(&config.store).unwrap();
    assert!(saved.contains("name = \"Lobby\""));
    assert!(saved.contains("job/nightly"));

    // a fresh server sees the same decks
    let reloaded = AppState::from_config(&config).unwrap();
    let (_, first) = send(&create_router(reloaded), request("GET", "/decks/Lobby/next?index=1", None, None)).await;
    assert_eq!(first["target"]["url"], "http://ci.local/jenkins/job/nightly");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_saves_keep_every_acknowledged_deck() {
    let store = Arc::new(SlowFirstSave::default());
    let app = create_router(state_with(store.clone(), GrantTable::open(), false));

    let (one, two) = tokio::join!(
        send(&app, request("POST", "/decks", Some(json!({ "name": "one" })), None)),
        send(&app, request("POST", "/decks", Some(json!({ "name": "two" })), None)),
    );
    assert_eq!(one.0, StatusCode::CREATED);
    assert_eq!(two.0, StatusCode::CREATED);

    let mut stored: Vec<String> = store.inner.contents().decks.into_iter().map(|d| d.name).collect();
    stored.sort();
    assert_eq!(stored, ["one", "two"]);
    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_save_answers_500_but_keeps_the_change() {
    let app = create_router(state_with(Arc::new(ReadOnlyStore), GrantTable::open(), false));

    let (status, body) =
        send(&app, request("POST", "/decks", Some(json!({ "name": "Lobby" })), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("SS4004"));

    let (status, deck) = send(&app, request("GET", "/decks/Lobby", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deck["name"], "Lobby");
}

#[tokio::test]
async fn strict_mode_cleans_polled_markup_and_refuses_script_urls() {
    let app = create_router(state_with(Arc::new(MemoryStore::default()), GrantTable::open(), true));
    send(&app, request("POST", "/decks", Some(json!({ "name": "Wall" })), None)).await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/decks/Wall/configure",
            Some(json!({ "pages": [{ "kind": "url", "fields": { "url": "javascript:alert(document.cookie)" } }] })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["field"], "pages[0].url");
    assert!(body["errors"][0]["message"].as_str().unwrap().contains("SS1104"));

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/decks/Wall/configure",
            Some(json!({ "pages": [{ "kind": "html", "fields": { "html": "<h1>Status</h1><script>alert(1)</script>" } }] })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for uri in ["/decks/Wall/first", "/decks/Wall/next?index=0"] {
        let (_, payload) = send(&app, request("GET", uri, None, None)).await;
        let html = payload["target"]["html"].as_str().unwrap();
        assert!(!html.contains("<script"), "{}: {}", uri, html);
        assert!(html.contains("<h1>Status</h1>"));
    }
}

#[tokio::test]
async fn a_deck_may_be_called_check() {
    let (app, _) = open_app();
    let (status, _) = send(&app, request("POST", "/decks", Some(json!({ "name": "check" })), None)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, deck) = send(&app, request("GET", "/decks/check", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deck["name"], "check");
}
