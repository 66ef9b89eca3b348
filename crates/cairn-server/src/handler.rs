use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use tracing::{debug, warn};

use cairn_protocol::{
    AuthMethod, BatchAck, ErrorBody, HealthResponse, InfoResponse, ObjectBatch, ProtocolError,
    PROTOCOL_VERSION,
};
use cairn_transport::{Transport, TransportError};
use cairn_types::ObjectHash;

use crate::config::ServerConfig;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub transport: Arc<dyn Transport>,
    pub config: Arc<ServerConfig>,
    pub auth: AuthMethod,
}

impl AppState {
    pub fn new(transport: Arc<dyn Transport>, config: ServerConfig) -> Self {
        let auth = AuthMethod::from_api_key(config.api_key.as_deref());
        Self {
            transport,
            config: Arc::new(config),
            auth,
        }
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let given = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        if self.auth.accepts(given) {
            Ok(())
        } else {
            Err(ApiError::new(StatusCode::UNAUTHORIZED, "missing or invalid api key"))
        }
    }
}

/// A handler failure rendered as a status code plus [`ErrorBody`].
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
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody::new(self.message))).into_response()
    }
}

impl From<ProtocolError> for ApiError {
    fn from(e: ProtocolError) -> Self {
        let status = match e {
            ProtocolError::BatchTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProtocolError::HashMismatch { .. } | ProtocolError::InvalidHash(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        let status = match e {
            TransportError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        transport: state.transport.name().to_string(),
        protocol_version: PROTOCOL_VERSION,
        max_batch_objects: state.config.max_batch_objects,
        auth: state.auth.display_name().to_string(),
    })
}

/// Accept a batch: size check, hash verification, then one `persist_many`.
pub async fn put_objects_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(batch): Json<ObjectBatch>,
) -> Result<Json<BatchAck>, ApiError> {
    state.authorize(&headers)?;

    let max = state.config.max_batch_objects;
    if batch.len() > max {
        return Err(ProtocolError::BatchTooLarge {
            size: batch.len(),
            max,
        }
        .into());
    }

    let records = batch.into_records()?;
    let accepted = records.len();
    state.transport.persist_many(records).await.map_err(|e| {
        warn!(error = %e, count = accepted, "failed to persist received batch");
        ApiError::from(e)
    })?;

    debug!(count = accepted, "batch accepted");
    Ok(Json(BatchAck { accepted }))
}

/// Serve one record's canonical bytes.
pub async fn get_object_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(hash): Path<String>,
) -> Result<Response, ApiError> {
    state.authorize(&headers)?;

    let hash: ObjectHash = hash
        .parse()
        .map_err(|e: cairn_types::TypeError| ProtocolError::InvalidHash(e.to_string()))?;
    let bytes = state.transport.fetch(&hash).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], bytes).into_response())
}
