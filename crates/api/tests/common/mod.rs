#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;

use jigsaw_api::auth::jwt::JwtConfig;
use jigsaw_api::config::ServerConfig;
use jigsaw_api::router::build_app_router;
use jigsaw_api::state::AppState;
use jigsaw_core::expansion::DEFAULT_GRACE_PERIOD_MS;
use jigsaw_core::lease::DEFAULT_LEASE_SECONDS;
use jigsaw_events::EventBus;
use jigsaw_imagegen::{
    build_generator, ExpandRequest, GeneratedImage, GenerationError, GeneratorKind,
    ImageGenerator, InitialRequest, ProviderConfig, StorageKind,
};

/// Build a test `ServerConfig` with safe defaults: mock generator with no
/// delay, local storage under `public_dir`.
pub fn test_config(public_dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 60,
        },
        auto_adopt_after_ms: DEFAULT_GRACE_PERIOD_MS,
        lock_ttl_seconds: DEFAULT_LEASE_SECONDS,
        tile_size: 256,
        providers: ProviderConfig {
            generator: GeneratorKind::Mock,
            storage: StorageKind::Local,
            public_dir: public_dir.to_path_buf(),
            openai_api_key: None,
            mock_delay: Duration::ZERO,
        },
    }
}

/// A running test application: shared state plus the temp dir backing
/// local storage. Build a fresh [`Router`] per request with [`TestApp::app`].
pub struct TestApp {
    pub state: AppState,
    pub config: ServerConfig,
    _public_dir: TempDir,
}

impl TestApp {
    /// The full application router with all middleware layers.
    pub fn app(&self) -> Router {
        build_app_router(self.state.clone(), &self.config)
    }
}

pub fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with(pool, |_| {}, None)
}

/// Like [`build_test_app`], with config overrides and an optional
/// replacement generator.
pub fn build_test_app_with(
    pool: PgPool,
    configure: impl FnOnce(&mut ServerConfig),
    generator: Option<Arc<dyn ImageGenerator>>,
) -> TestApp {
    let public_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(public_dir.path());
    configure(&mut config);

    let generator = match generator {
        Some(generator) => generator,
        None => build_generator(&config.providers).unwrap(),
    };

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus: Arc::new(EventBus::default()),
        generator,
    };

    TestApp {
        state,
        config,
        _public_dir: public_dir,
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Always fails as if the image API returned a 500.
pub struct FailingGenerator;

#[async_trait]
impl ImageGenerator for FailingGenerator {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn generate(&self, _request: &ExpandRequest) -> Result<GeneratedImage, GenerationError> {
        Err(GenerationError::Api {
            status: 500,
            body: "upstream exploded".into(),
        })
    }

    async fn generate_initial(
        &self,
        _request: &InitialRequest,
    ) -> Result<GeneratedImage, GenerationError> {
        Err(GenerationError::Api {
            status: 500,
            body: "upstream exploded".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

fn json_request(
    method: &str,
    uri: &str,
    body: &serde_json::Value,
    token: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::get(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, json_request("POST", uri, &body, None)).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: serde_json::Value, token: &str) -> Response {
    send(app, json_request("POST", uri, &body, Some(token))).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::post(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    send(app, json_request("DELETE", uri, &body, Some(token))).await
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A registered user and their bearer token.
pub struct TestUser {
    pub id: String,
    pub token: String,
}

pub async fn register(test: &TestApp, display_name: &str) -> TestUser {
    let response = post_json(
        test.app(),
        "/api/v1/users",
        serde_json::json!({ "display_name": display_name }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    TestUser {
        id: json["data"]["user"]["id"].as_str().unwrap().to_string(),
        token: json["data"]["token"].as_str().unwrap().to_string(),
    }
}

/// Create a room owned by `owner` and generate its origin tile with the
/// mock generator. Returns `(room_id, origin_tile_id)`.
pub async fn room_with_origin(test: &TestApp, owner: &TestUser) -> (String, String) {
    let response = post_json_auth(
        test.app(),
        "/api/v1/rooms",
        serde_json::json!({ "name": "Test room", "initial_prompt": "a quiet lake" }),
        &owner.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let room_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = post_auth(
        test.app(),
        &format!("/api/v1/rooms/{room_id}/generate-initial"),
        &owner.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let tile_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    (room_id, tile_id)
}

pub async fn lock_cell(test: &TestApp, room_id: &str, user: &TestUser, x: i32, y: i32) -> Response {
    post_json_auth(
        test.app(),
        &format!("/api/v1/rooms/{room_id}/locks"),
        serde_json::json!({ "x": x, "y": y }),
        &user.token,
    )
    .await
}

/// Lock `(1, 0)` and queue an eastward expansion from the origin tile.
/// Returns the expansion id.
pub async fn queue_east_expansion(
    test: &TestApp,
    room_id: &str,
    origin_tile_id: &str,
    user: &TestUser,
    prompt: &str,
) -> String {
    let response = lock_cell(test, room_id, user, 1, 0).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json_auth(
        test.app(),
        &format!("/api/v1/rooms/{room_id}/expansions"),
        serde_json::json!({
            "from_tile_id": origin_tile_id,
            "target_x": 1,
            "target_y": 0,
            "direction": "E",
            "prompt": { "text": prompt },
        }),
        &user.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}
