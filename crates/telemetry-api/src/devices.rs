// Device event and status HTTP routes

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use telemetry_core::{DeviceStatus, ErrorClass, EventReader, ReadError, ResolvedEvent};
use utoipa::ToSchema;

/// Header carrying the error text on failed requests
pub const ERROR_HEADER: &str = "x-telemetry-error";

/// App state for device routes
#[derive(Clone)]
pub struct AppState {
    pub reader: Arc<EventReader>,
}

impl AppState {
    pub fn new(reader: Arc<EventReader>) -> Self {
        Self { reader }
    }
}

/// Create device routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/device/:device_id/events", get(get_events))
        .route("/device/:device_id/status", get(get_status))
        .with_state(state)
}

/// Body returned with every error status
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrResponse {
    /// The HTTP status code of the response
    #[schema(example = 404)]
    pub code: u16,
}

/// Failure of a device request
#[derive(Debug)]
pub enum ApiError {
    MissingDeviceId,
    Read(ReadError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::MissingDeviceId => (StatusCode::NOT_FOUND, None),
            ApiError::Read(e) => {
                let status = match e.class() {
                    ErrorClass::NotFound => StatusCode::NOT_FOUND,
                    ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, Some(e.to_string()))
            }
        };

        let mut response = (
            status,
            Json(ErrResponse {
                code: status.as_u16(),
            }),
        )
            .into_response();

        if let Some(value) = message.and_then(|m| HeaderValue::from_str(&m).ok()) {
            response.headers_mut().insert(ERROR_HEADER, value);
        }
        response
    }
}

/// Device ids are case-insensitive; blank ids match nothing.
fn normalize_device_id(raw: &str) -> Result<String, ApiError> {
    let device_id = raw.trim().to_lowercase();
    if device_id.is_empty() {
        return Err(ApiError::MissingDeviceId);
    }
    Ok(device_id)
}

fn log_failure(action: &str, e: ReadError) -> ApiError {
    match e.class() {
        ErrorClass::NotFound => {
            tracing::info!(device_id = %e.device_id(), error = %e, "Failed to get {}", action)
        }
        ErrorClass::Internal => {
            tracing::error!(device_id = %e.device_id(), error = %e, "Failed to get {}", action)
        }
    }
    ApiError::Read(e)
}

/// GET /device/{device_id}/events - All events of a device
///
/// Records that could not be decrypted or decoded are included with
/// msg_type 11 (unknown) so the caller still sees that they exist.
#[utoipa::path(
    get,
    path = "/device/{device_id}/events",
    params(
        ("device_id" = String, Path, description = "Device ID, e.g. mac:112233445566")
    ),
    responses(
        (status = 200, description = "Events of the device, in store order", body = Vec<ResolvedEvent>),
        (status = 404, description = "No live events for the device", body = ErrResponse),
        (status = 500, description = "Record store failure", body = ErrResponse)
    ),
    tag = "devices"
)]
pub async fn get_events(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Vec<ResolvedEvent>>, ApiError> {
    let device_id = normalize_device_id(&device_id)?;

    let events = state
        .reader
        .get_device_events(&device_id)
        .await
        .map_err(|e| log_failure("events", e))?;

    Ok(Json(events))
}

/// GET /device/{device_id}/status - Current online/offline status of a device
#[utoipa::path(
    get,
    path = "/device/{device_id}/status",
    params(
        ("device_id" = String, Path, description = "Device ID, e.g. mac:112233445566")
    ),
    responses(
        (status = 200, description = "Device status", body = DeviceStatus),
        (status = 404, description = "No usable state events for the device", body = ErrResponse),
        (status = 500, description = "Record store failure", body = ErrResponse)
    ),
    tag = "devices"
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceStatus>, ApiError> {
    let device_id = normalize_device_id(&device_id)?;

    let status = state
        .reader
        .get_device_status(&device_id)
        .await
        .map_err(|e| log_failure("status", e))?;

    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use telemetry_core::{
        Ciphers, DeviceMessage, EventType, InMemoryRecordStore, JsonMessageDecoder, Measures,
        MessageType, NoopDecrypter, RawRecord,
    };
    use tower::ServiceExt;

    const DEVICE: &str = "mac:112233445566";

    fn app(store: &InMemoryRecordStore) -> Router {
        let ciphers = Ciphers::new()
            .with_decrypter(NoopDecrypter::default())
            .unwrap();
        let reader = EventReader::new(
            Arc::new(store.clone()),
            Arc::new(ciphers),
            Arc::new(JsonMessageDecoder),
            Arc::new(Measures::new()),
        );
        routes(AppState::new(Arc::new(reader)))
    }

    fn record(event_type: EventType, dest: &str, payload: &str) -> RawRecord {
        let message = DeviceMessage {
            msg_type: MessageType::SimpleEvent,
            source: "dns:talaria".to_string(),
            dest: dest.to_string(),
            payload: payload.as_bytes().to_vec(),
            ..Default::default()
        };
        RawRecord {
            id: 1,
            device_id: DEVICE.to_string(),
            event_type,
            birth_date: Utc::now() - Duration::minutes(1),
            death_date: Utc::now() + Duration::days(1),
            data: serde_json::to_vec(&message).unwrap(),
            nonce: Vec::new(),
            alg: "none".to_string(),
            key_id: "none".to_string(),
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let error = response
            .headers()
            .get(ERROR_HEADER)
            .map(|v| v.to_str().unwrap().to_string());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, error, json)
    }

    #[tokio::test]
    async fn test_get_events() {
        let store = InMemoryRecordStore::new();
        store
            .insert(record(EventType::Default, "event:iot", "{}"))
            .await;

        let (status, error, body) = get(app(&store), "/device/MAC:112233445566/events").await;

        assert_eq!(status, StatusCode::OK);
        assert!(error.is_none());
        let events = body.as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["msg_type"], 4);
        assert_eq!(events[0]["dest"], "event:iot");
        assert!(events[0]["birth_date"].is_i64());
    }

    #[tokio::test]
    async fn test_get_events_not_found() {
        let store = InMemoryRecordStore::new();

        let (status, error, body) = get(app(&store), "/device/mac:000000000000/events").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(error.unwrap().contains("No events found"));
        assert_eq!(body["code"], 404);
    }

    #[tokio::test]
    async fn test_store_failure_is_500() {
        let store = InMemoryRecordStore::new();
        store.fail_with("db down").await;

        let (status, error, body) = get(app(&store), "/device/mac:112233445566/events").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error.unwrap().contains("db down"));
        assert_eq!(body["code"], 500);
    }

    #[tokio::test]
    async fn test_blank_device_id_is_404() {
        let store = InMemoryRecordStore::new();

        let (status, error, _) = get(app(&store), "/device/%20/status").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_get_status() {
        let store = InMemoryRecordStore::new();
        store
            .insert(record(
                EventType::State,
                "event:device-status/mac:112233445566/offline",
                r#"{"reason-for-closure":"ping miss"}"#,
            ))
            .await;

        let (status, _, body) = get(app(&store), "/device/mac:112233445566/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deviceID"], DEVICE);
        assert_eq!(body["state"], "offline");
        assert_eq!(body["last_offline_reason"], "ping miss");
        assert!(body["since"].is_string());
        assert!(body["now"].is_string());
    }

    #[tokio::test]
    async fn test_get_status_ignores_undecodable_records() {
        let store = InMemoryRecordStore::new();
        let mut broken = record(EventType::State, "", "");
        broken.data = b"not json".to_vec();
        store.insert(broken).await;

        let (status, error, _) = get(app(&store), "/device/mac:112233445566/status").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(error.unwrap().contains("No events found"));
    }
}
