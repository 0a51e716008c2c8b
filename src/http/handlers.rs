use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::archive::StorageError;
use crate::registry::StreamKey;

use super::AppState;

const OBJECT_SUFFIX: &str = "/object";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StreamsResponse {
    pub streams: Vec<StreamKey>,
}

#[derive(Debug, Serialize)]
pub struct ObjectResponse {
    pub object: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: Option<i64>,
    pub signature: Option<String>,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn list_streams(State(state): State<AppState>) -> Json<StreamsResponse> {
    Json(StreamsResponse {
        streams: state.registry.list().await,
    })
}

/// `GET /streams/{key}/object`: latest archive of a stream with a fresh
/// presigned URL
pub async fn stream_object(
    Path(rest): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ObjectResponse>, (StatusCode, &'static str)> {
    let rest = rest.trim_start_matches('/');
    let key = match rest.strip_suffix(OBJECT_SUFFIX) {
        Some(key) if !key.is_empty() => StreamKey::new(key),
        _ => return Err((StatusCode::NOT_FOUND, "not found")),
    };

    let Some(object) = state.registry.last_archive(&key).await else {
        return Err((StatusCode::NOT_FOUND, "stream not found"));
    };

    match state.archiver.presigned_url(&object, state.presign_ttl).await {
        Ok(url) => Ok(Json(ObjectResponse {
            object: object.name,
            url,
        })),
        Err(e) => {
            tracing::warn!(stream = %key, object = %object.name, error = %e, "Presign failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "presign failed"))
        }
    }
}

/// `GET /objects/{bucket}/{object}`: serve a presigned object
pub async fn get_object(
    Path((bucket, object)): Path<(String, String)>,
    Query(query): Query<SignedQuery>,
    State(state): State<AppState>,
) -> Response {
    let Some(store) = state.objects.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let (Some(expires), Some(signature)) = (query.expires, query.signature) else {
        return (StatusCode::FORBIDDEN, "missing signature").into_response();
    };

    let object = object.trim_start_matches('/');
    let stored = match store.open_signed(&bucket, object, expires, &signature).await {
        Ok(stored) => stored,
        Err(StorageError::InvalidSignature) => {
            return (StatusCode::FORBIDDEN, "invalid signature").into_response();
        }
        Err(StorageError::ObjectNotFound(_)) | Err(StorageError::InvalidObjectName(_)) => {
            return (StatusCode::NOT_FOUND, "object not found").into_response();
        }
        Err(e) => {
            tracing::warn!(bucket = %bucket, object = object, error = %e, "Failed to open object");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let body = Body::from_stream(ReaderStream::new(stored.file));

    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, stored.metadata.content_type)
        .header(header::CONTENT_LENGTH, stored.metadata.size)
        .body(body)
    {
        Ok(response) => response,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
