//! HTTP surface: `POST /api/convert-images` and the static artifact tree.
//!
//! Uploads are spooled into the upload directory as temp files and handed
//! to [`convert_images`], which removes them once the conversion ends. Any
//! failure is answered with a JSON `{"error": …}` body: 400 for problems
//! with what the client sent, 500 with a generic message for everything
//! else. The internal detail only goes to the log.

use crate::config::ConversionConfig;
use crate::convert::convert_images;
use crate::error::Notes2PdfError;
use crate::output::ErrorResponse;
use crate::pipeline::input::{cleanup_inputs, InputImage};
use crate::pipeline::render::RenderEngine;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Multipart field carrying the note images.
pub const UPLOAD_FIELD: &str = "images";

/// Where and how to listen.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Scratch directory for incoming uploads. Default: `uploads`.
    pub upload_dir: PathBuf,
    /// Largest accepted request body. Default: 100 MiB.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 4000)),
            upload_dir: PathBuf::from("uploads"),
            body_limit_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Shared per-process state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn RenderEngine>,
    pub config: Arc<ConversionConfig>,
    pub upload_dir: Arc<PathBuf>,
}

/// Build the application router.
pub fn router(state: AppState, body_limit_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let artifacts = ServeDir::new(&state.config.output_dir);

    Router::new()
        .route("/api/convert-images", post(convert_images_handler))
        .nest_service(&state.config.public_prefix, artifacts)
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind, serve until Ctrl-C, then shut the render engine down.
pub async fn serve(
    server: ServerConfig,
    engine: Arc<dyn RenderEngine>,
    config: ConversionConfig,
) -> Result<(), Notes2PdfError> {
    for dir in [&server.upload_dir, &config.output_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Notes2PdfError::OutputWriteFailed {
                path: dir.clone(),
                source: e,
            })?;
    }

    let state = AppState {
        engine: Arc::clone(&engine),
        config: Arc::new(config),
        upload_dir: Arc::new(server.upload_dir.clone()),
    };
    let app = router(state, server.body_limit_bytes);

    let listener = tokio::net::TcpListener::bind(server.bind)
        .await
        .map_err(|e| Notes2PdfError::Internal(format!("bind {}: {e}", server.bind)))?;
    info!("Server running at http://{}", server.bind);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Notes2PdfError::Internal(format!("server: {e}")));

    engine.shutdown().await;
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn convert_images_handler(State(state): State<AppState>, multipart: Multipart) -> Response {
    let mut images = Vec::new();
    if let Err(e) = receive_uploads(&state, multipart, &mut images).await {
        warn!("Rejected upload: {}", e);
        cleanup_inputs(images);
        return error_response(&e);
    }

    match convert_images(images, state.engine.as_ref(), &state.config).await {
        Ok(output) => (StatusCode::OK, Json(output.response())).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Spool every `images` part to disk. Other fields are ignored.
async fn receive_uploads(
    state: &AppState,
    mut multipart: Multipart,
    images: &mut Vec<InputImage>,
) -> Result<(), Notes2PdfError> {
    let max = state.config.max_images;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(malformed)?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }
        if images.len() >= max {
            return Err(Notes2PdfError::TooManyImages {
                count: images.len() + 1,
                max,
            });
        }

        let mime = field.content_type().map(str::to_string);
        let spooled = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(state.upload_dir.as_ref())
            .map_err(|e| Notes2PdfError::OutputWriteFailed {
                path: state.upload_dir.as_ref().clone(),
                source: e,
            })?;
        let (file, path) = spooled.into_parts();
        // Registered before writing so a failed write still gets cleaned up.
        images.push(InputImage::uploaded(path, mime));

        let mut file = tokio::fs::File::from_std(file);
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(malformed)?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| Notes2PdfError::Internal(format!("spool upload: {e}")))?;
        }
        file.flush()
            .await
            .map_err(|e| Notes2PdfError::Internal(format!("spool upload: {e}")))?;
    }
    debug!("Received {} upload(s)", images.len());
    Ok(())
}

fn malformed(e: MultipartError) -> Notes2PdfError {
    Notes2PdfError::MalformedUpload {
        detail: e.body_text(),
    }
}

/// Map a failure to its status code and public JSON body.
pub fn error_response(e: &Notes2PdfError) -> Response {
    let status = if e.is_input_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let body = ErrorResponse {
        error: e.public_message().to_string(),
    };
    (status, Json(body)).into_response()
}
