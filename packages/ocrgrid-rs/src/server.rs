//! HTTP upload/download surface.
//!
//! - `POST /ocr/text`: multipart `file`, answers with the raw OCR output
//! - `POST /ocr/excel`: multipart `file`, stores a spreadsheet and answers with its id
//! - `GET /ocr/download/:id`: streams the spreadsheet once, then deletes it
//!
//! Every JSON answer uses the [`ApiResponse`] envelope.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ocrgrid_ocr::{OcrEngine, OcrInput, OcrOutput};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::artifact_store::{ArtifactId, ArtifactStore};
use crate::table_extractor::{ExtractError, TableExtractor};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub type SharedExtractor = Arc<TableExtractor<Box<dyn OcrEngine>>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16().to_string(),
            message: "success".into(),
            data: Some(data),
        }
    }

    pub fn fail(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16().to_string(),
            message: message.into(),
            data: None,
        }
    }
}

/// Where a finished spreadsheet can be fetched.
#[derive(Debug, Clone, Serialize)]
pub struct ExcelArtifact {
    pub id: ArtifactId,
    pub download: String,
    pub rows: usize,
    pub columns: usize,
}

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

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        let status = match &err {
            ExtractError::Recognition(_) => StatusCode::BAD_GATEWAY,
            ExtractError::NoContent | ExtractError::Table(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ExtractError::Export(_) | ExtractError::Task(_) | ExtractError::NoStore => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, message = %self.message, "request failed");
        } else {
            warn!(status = %self.status, message = %self.message, "request rejected");
        }
        (self.status, Json(ApiResponse::<()>::fail(self.status, self.message))).into_response()
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    let bad_request = |e: axum::extract::multipart::MultipartError| {
        ApiError::new(StatusCode::BAD_REQUEST, format!("invalid upload: {e}"))
    };
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        if field.name() == Some("file") {
            let bytes = field.bytes().await.map_err(bad_request)?;
            if bytes.is_empty() {
                return Err(ApiError::new(StatusCode::BAD_REQUEST, "uploaded file is empty"));
            }
            return Ok(bytes.to_vec());
        }
    }
    Err(ApiError::new(StatusCode::BAD_REQUEST, "missing multipart field `file`"))
}

async fn ocr_text(
    State(extractor): State<SharedExtractor>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<OcrOutput>>, ApiError> {
    let image = read_upload(multipart).await?;
    let output = extractor.recognize(&OcrInput::Bytes(image)).await?;
    Ok(Json(ApiResponse::success(output)))
}

async fn ocr_excel(
    State(extractor): State<SharedExtractor>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<ExcelArtifact>>, ApiError> {
    let image = read_upload(multipart).await?;
    let table = extractor.extract_to_store(&OcrInput::Bytes(image)).await?;
    Ok(Json(ApiResponse::success(ExcelArtifact {
        id: table.id,
        download: format!("/ocr/download/{}", table.id),
        rows: table.grid.height(),
        columns: table.grid.width(),
    })))
}

async fn download(
    State(extractor): State<SharedExtractor>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::new(StatusCode::NOT_FOUND, format!("no spreadsheet with id {id}"));
    let id: ArtifactId = id.parse().map_err(|_| not_found())?;
    let extension = extractor.extension();
    let store = extractor.store().ok_or_else(|| ApiError::from(ExtractError::NoStore))?;
    let bytes = store
        .take(id, extension)
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(not_found)?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        ArtifactStore::file_name(id, extension)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

pub fn router(extractor: SharedExtractor) -> Router {
    Router::new()
        .route("/ocr/text", post(ocr_text))
        .route("/ocr/excel", post(ocr_excel))
        .route("/ocr/download/:id", get(download))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(extractor)
}

/// Deletes artifacts nobody downloaded within `max_age`, at startup and then
/// every quarter of `max_age`.
pub async fn sweep_artifacts(store: ArtifactStore, max_age: Duration) {
    let mut ticker = tokio::time::interval((max_age / 4).max(Duration::from_secs(1)));
    loop {
        ticker.tick().await;
        let sweep = store.clone();
        match tokio::task::spawn_blocking(move || sweep.purge_older_than(max_age)).await {
            Ok(Ok(0)) => {}
            Ok(Ok(removed)) => info!(removed, "expired artifacts removed"),
            Ok(Err(e)) => warn!(error = %e, dir = %store.root().display(), "artifact sweep failed"),
            Err(e) => warn!(error = %e, "artifact sweep task failed"),
        }
    }
}

/// Serves until Ctrl-C. Undownloaded artifacts expire after `artifact_ttl`.
pub async fn serve(
    listener: TcpListener,
    extractor: SharedExtractor,
    artifact_ttl: Duration,
) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "ocrgrid listening");
    let sweeper = extractor
        .store()
        .cloned()
        .map(|store| tokio::spawn(sweep_artifacts(store, artifact_ttl)));
    let served = axum::serve(listener, router(extractor))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await;
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    served
}
