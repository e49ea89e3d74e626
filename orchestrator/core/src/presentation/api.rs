// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::application::provisioning::ProvisioningService;
use crate::domain::auth::{bearer_token, AuthError, TokenVerifier};
use crate::domain::provisioning::ProvisioningError;
use crate::domain::service::{ProvisionedService, ServiceRequest, StoredCluster, TenantId};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub const GREETING: &str = "hello !! Welcome to spinup";

pub struct AppState {
    pub provisioning_service: Arc<dyn ProvisioningService>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub started_at: Instant,
}

pub fn app(service: Arc<dyn ProvisioningService>, verifier: Arc<dyn TokenVerifier>) -> Router {
    let state = Arc::new(AppState {
        provisioning_service: service,
        verifier,
        started_at: Instant::now(),
    });

    Router::new()
        .route("/", get(hello))
        .route("/health", get(health))
        .route("/createservice", post(create_service))
        .route("/listcluster", get(list_clusters))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error response: `{"error": "<message>"}` with a status from the taxonomy.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        let status = rejection.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::new(status, "Request body must not be larger than 1MB")
        } else {
            Self::new(status, rejection.body_text())
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, err.to_string())
    }
}

impl From<ProvisioningError> for ApiError {
    fn from(err: ProvisioningError) -> Self {
        let status = match &err {
            ProvisioningError::Authorization(_) => StatusCode::UNAUTHORIZED,
            ProvisioningError::Validation(_) => StatusCode::BAD_REQUEST,
            ProvisioningError::ResourceExhausted { .. } => StatusCode::INSUFFICIENT_STORAGE,
            ProvisioningError::Render(_)
            | ProvisioningError::Preflight(_)
            | ProvisioningError::ComposeValidation(_)
            | ProvisioningError::Launch(_)
            | ProvisioningError::IdentifierLookup(_)
            | ProvisioningError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<TenantId, ApiError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;
    let token = bearer_token(header)?;
    state.verifier.verify(token).map_err(|e| {
        warn!(error = %e, "Rejected bearer token");
        ApiError::from(e)
    })
}

/// Decode a request body holding exactly one JSON object of type `T`.
fn decode_json_body<T: serde::de::DeserializeOwned>(headers: &HeaderMap, body: &Bytes) -> Result<T, ApiError> {
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        let mime = content_type
            .to_str()
            .unwrap_or_default()
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        if !mime.eq_ignore_ascii_case("application/json") {
            return Err(ApiError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Content-Type header is not application/json",
            ));
        }
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request("Request body must not be empty"));
    }

    let mut values = serde_json::Deserializer::from_slice(body).into_iter::<serde_json::Value>();
    match values.next() {
        Some(Ok(_)) => {}
        Some(Err(e)) if e.is_eof() => {
            return Err(ApiError::bad_request("Request body contains badly-formed JSON"))
        }
        Some(Err(e)) => {
            return Err(ApiError::bad_request(format!(
                "Request body contains badly-formed JSON (at line {} column {})",
                e.line(),
                e.column()
            )))
        }
        None => return Err(ApiError::bad_request("Request body must not be empty")),
    }
    if values.next().is_some() {
        return Err(ApiError::bad_request(
            "Request body must only contain a single JSON object",
        ));
    }

    // second pass for typed errors that name the offending field
    Json::<T>::from_bytes(body)
        .map(|Json(value)| value)
        .map_err(|rejection| {
            let detail = rejection.body_text();
            let detail = detail
                .strip_prefix("Failed to deserialize the JSON body into the target type: ")
                .unwrap_or(&detail);
            ApiError::bad_request(format!("Request body contains an invalid value: {}", detail))
        })
}

async fn hello() -> &'static str {
    GREETING
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ProvisionedService>, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let body = body?;
    let request: ServiceRequest = decode_json_body(&headers, &body)?;

    // the workflow runs to completion even if the client goes away
    let service = state.provisioning_service.clone();
    let handle = tokio::spawn(async move { service.create_service(&caller, request).await });

    match handle.await {
        Ok(result) => Ok(Json(result?)),
        Err(e) => {
            error!(error = %e, "Provisioning task aborted");
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "provisioning task aborted",
            ))
        }
    }
}

async fn list_clusters(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<StoredCluster>>, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let clusters = state.provisioning_service.list_clusters(&caller).await?;
    Ok(Json(clusters))
}
