// server/endpoints.rs

use std::sync::Arc;

use axum::{
    extract::{
        Multipart,
        State,
        multipart::MultipartError,
    },
    http::StatusCode,
    response::{
        Html,
        IntoResponse,
        Response,
    },
};
use tracing::{
    debug,
    error,
    info,
    warn,
};

use super::{
    core::AppState,
    gallery,
};
use crate::storage::StorageError;

/// Multipart field the upload form sends the video in
pub const UPLOAD_FIELD: &str = "video";

pub async fn upload(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            | Ok(Some(f)) => f,
            | Ok(None) => break,
            | Err(e) => {
                warn!("Rejecting malformed upload: {e}");
                return e.into_response();
            },
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        // A part without a filename is a plain form value, not a file
        let Some(original) = field.file_name().map(str::to_owned) else {
            continue;
        };

        return match state.storage.store(&original, field).await {
            | Ok(video) => {
                info!("Uploaded {original} as {}", video.name);
                (StatusCode::OK, format!("File uploaded successfully: {}", video.name))
                    .into_response()
            },
            | Err(StorageError::Body(e)) => {
                warn!("Upload of {original} was cut short: {e}");
                let status = e
                    .downcast_ref::<MultipartError>()
                    .map_or(StatusCode::BAD_REQUEST, MultipartError::status);
                (status, format!("Failed to read upload: {e}")).into_response()
            },
            | Err(e) => {
                error!("{e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload").into_response()
            },
        };
    }

    debug!("Upload request carried no '{UPLOAD_FIELD}' file");
    (StatusCode::BAD_REQUEST, "No file uploaded.").into_response()
}

pub async fn videos(State(state): State<Arc<AppState>>) -> Response {
    match state.storage.list(&state.video_extension).await {
        | Ok(names) => Html(gallery::render(&names)).into_response(),
        | Err(e) => {
            error!("{e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Unable to list videos").into_response()
        },
    }
}
