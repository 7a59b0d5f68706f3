//! Receiving side of a sync: serves folder states and applies uploads and deletions.

use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use camino::{Utf8Path, Utf8PathBuf};
use std::future::Future;
use std::io::ErrorKind;
use std::sync::Arc;
use tether_core::path_utils::TetherPath;
use tether_core::{DeleteRequest, FolderState};
use tether_persistence::ConfigStore;
use tether_scanner::ChangeDetector;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("folder {0:?} is not served here")]
    UnknownFolder(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::UnknownFolder(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("{}", self);
        }
        (status, self.to_string()).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<ConfigStore>,
    detector: Arc<ChangeDetector>,
}

impl AppState {
    pub fn new(config: Arc<ConfigStore>, detector: Arc<ChangeDetector>) -> Self {
        Self { config, detector }
    }

    fn folder_root(&self, name: &str) -> Result<Utf8PathBuf, ServerError> {
        let cfg = self
            .config
            .load()
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        cfg.folder(name)
            .map(|f| Utf8PathBuf::from(&f.base_path))
            .ok_or_else(|| ServerError::UnknownFolder(name.to_string()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/files/:name", get(folder_state))
        .route(
            "/files/:name/upload",
            post(upload_files).layer(DefaultBodyLimit::disable()),
        )
        .route("/files/:name/delete", post(delete_files))
        .with_state(state)
}

/// Serve until `shutdown` resolves; requests in flight are allowed to finish.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Our own copy is re-hashed on demand; hashes sent by clients are never trusted.
async fn folder_state(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<FolderState>, ServerError> {
    let root = state.folder_root(&name)?;
    tokio::fs::create_dir_all(&root)
        .await
        .map_err(|e| ServerError::Internal(format!("cannot create {root}: {e}")))?;
    let current = state
        .detector
        .classify(&name, &root)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    debug!("Serving state of '{}' ({} files)", name, current.len());
    Ok(Json(current))
}

async fn upload_files(
    State(state): State<AppState>,
    Path(name): Path<String>,
    mut multipart: Multipart,
) -> Result<StatusCode, ServerError> {
    let root = state.folder_root(&name)?;
    let mut stored = 0usize;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let raw = field
            .file_name()
            .ok_or_else(|| ServerError::BadRequest("file field has no filename".into()))?
            .to_string();
        let rel_path = TetherPath::normalize(&raw);
        if !TetherPath::verify_safe(&rel_path) {
            warn!("Rejected upload with unsafe path {:?} into '{}'", raw, name);
            return Err(ServerError::BadRequest(format!("unsafe path {raw:?}")));
        }

        let dest = root.join(&rel_path);
        let written = store_field(&mut field, &dest).await?;
        info!("Stored {} ({} bytes) in '{}'", rel_path, written, name);
        stored += 1;
    }

    if stored == 0 {
        return Err(ServerError::BadRequest("upload carried no file field".into()));
    }
    Ok(StatusCode::OK)
}

/// Stream a field into a uniquely named temp file beside `dest`, then move it
/// into place. The temp file is removed when anything fails.
async fn store_field(field: &mut Field<'_>, dest: &Utf8Path) -> Result<u64, ServerError> {
    let internal = |e: std::io::Error| ServerError::Internal(format!("storing {dest}: {e}"));
    let parent = dest
        .parent()
        .ok_or_else(|| ServerError::Internal(format!("{dest} has no parent directory")))?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| ServerError::Internal(format!("cannot create {parent}: {e}")))?;

    let (std_file, temp_path) = tempfile::Builder::new()
        .prefix(".tether-")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(internal)?
        .into_parts();

    let mut file = tokio::fs::File::from_std(std_file);
    let mut written = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| internal(std::io::Error::other(e)))?
    {
        file.write_all(&chunk).await.map_err(internal)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(internal)?;
    file.sync_all().await.map_err(internal)?;
    drop(file);

    temp_path.persist(dest).map_err(|e| internal(e.error))?;
    Ok(written)
}

async fn delete_files(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<DeleteRequest>,
) -> Result<StatusCode, ServerError> {
    let root = state.folder_root(&name)?;

    let mut targets = Vec::with_capacity(req.files_to_delete.len());
    for raw in &req.files_to_delete {
        let rel_path = TetherPath::normalize(raw);
        if !TetherPath::verify_safe(&rel_path) {
            warn!("Rejected delete batch for '{}': unsafe path {:?}", name, raw);
            return Err(ServerError::BadRequest(format!("unsafe path {raw:?}")));
        }
        targets.push(rel_path);
    }

    let mut removed = 0usize;
    for rel_path in &targets {
        match tokio::fs::remove_file(root.join(rel_path)).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} already absent from '{}'", rel_path, name)
            }
            Err(e) => {
                return Err(ServerError::Internal(format!("cannot delete {rel_path}: {e}")));
            }
        }
    }

    info!(
        "Deleted {} of {} requested files from '{}'",
        removed,
        targets.len(),
        name
    );
    Ok(StatusCode::OK)
}
