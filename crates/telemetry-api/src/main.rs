// Device telemetry API server
// Decision: Read-only service; records are written by a separate ingest path
// Decision: Error class (not found vs internal) decides the HTTP status, never error text

mod config;
mod devices;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use telemetry_core::{
    DeviceMessage, DeviceState, DeviceStatus, EventReader, JsonMessageDecoder, Measures,
    MeasuresSnapshot, ResolvedEvent,
};
use telemetry_storage::{CipherConfig, Database};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ApiConfig;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    failures: MeasuresSnapshot,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        failures: state.measures.snapshot(),
    })
}

/// State for health endpoint
#[derive(Clone)]
struct HealthState {
    measures: Arc<Measures>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(devices::get_events, devices::get_status),
    components(schemas(
        ResolvedEvent,
        DeviceMessage,
        DeviceStatus,
        DeviceState,
        devices::ErrResponse,
    )),
    tags(
        (name = "devices", description = "Device event and status endpoints")
    ),
    info(
        title = "Device Telemetry API",
        version = "0.1.0",
        description = "Read stored device events and derive device online/offline status",
        license(name = "Apache-2.0", url = "https://www.apache.org/licenses/LICENSE-2.0")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "telemetry_api=debug,telemetry_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("telemetry-api starting...");

    let config = ApiConfig::from_env()?;

    // Initialize database
    let db = Database::from_url(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    // Initialize decrypters
    let ciphers = CipherConfig::from_env()?
        .build()
        .context("Failed to initialize decrypters")?;
    if ciphers.is_empty() {
        tracing::warn!("No decrypters configured; every record will resolve to an unknown event");
    } else {
        tracing::info!(count = ciphers.len(), "Decrypters configured");
    }

    let measures = Arc::new(Measures::new());
    let reader = EventReader::new(
        Arc::new(db),
        Arc::new(ciphers),
        Arc::new(JsonMessageDecoder),
        measures.clone(),
    )
    .with_get_limit(config.get_limit);
    tracing::info!(get_limit = config.get_limit, "Event reader configured");

    if !config.api_prefix.is_empty() {
        tracing::info!(prefix = %config.api_prefix, "API prefix configured");
    }

    let app = build_app(Arc::new(reader), measures, &config.api_prefix);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Assemble health, device routes, docs and tracing into one router
fn build_app(reader: Arc<EventReader>, measures: Arc<Measures>, api_prefix: &str) -> Router {
    let api_routes = devices::routes(devices::AppState::new(reader));

    Router::new()
        .route("/health", get(health).with_state(HealthState { measures }))
        .merge(build_router_with_prefix(api_routes, api_prefix))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

/// Build router with optional API prefix (extracted for testing)
fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use telemetry_core::{Ciphers, InMemoryRecordStore, NoopDecrypter};
    use tower::ServiceExt;

    fn test_routes() -> Router {
        Router::new().route("/v1/test", get(|| async { "ok" }))
    }

    fn test_app(api_prefix: &str) -> Router {
        let ciphers = Ciphers::new()
            .with_decrypter(NoopDecrypter::default())
            .unwrap();
        let measures = Arc::new(Measures::new());
        let reader = EventReader::new(
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(ciphers),
            Arc::new(JsonMessageDecoder),
            measures.clone(),
        );
        build_app(Arc::new(reader), measures, api_prefix)
    }

    async fn status_of(app: Router, uri: &str) -> u16 {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
            .as_u16()
    }

    #[tokio::test]
    async fn test_api_prefix_empty() {
        let app = build_router_with_prefix(test_routes(), "");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_api_prefix_set() {
        let app = build_router_with_prefix(test_routes(), "/api");

        // Route should work with prefix
        assert_eq!(status_of(app.clone(), "/api/v1/test").await, 200);

        // Route should NOT work without prefix
        assert_eq!(status_of(app, "/v1/test").await, 404);
    }

    #[tokio::test]
    async fn test_health_reports_failures() {
        let response = test_app("")
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["failures"]["decode_failure"], 0);
    }

    #[tokio::test]
    async fn test_device_routes_under_prefix() {
        // Empty store: the route exists and answers not found for the device
        assert_eq!(
            status_of(test_app("/api/v1"), "/api/v1/device/mac:1/events").await,
            404
        );
        // Health stays unprefixed
        assert_eq!(status_of(test_app("/api/v1"), "/health").await, 200);
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let response = test_app("")
            .oneshot(
                Request::builder()
                    .uri("/api-doc/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["paths"]["/device/{device_id}/status"].is_object());
        assert!(json["paths"]["/device/{device_id}/events"].is_object());
    }
}
