#![allow(dead_code)]

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use camino::Utf8PathBuf;
use filetime::FileTime;
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tether_core::{DeleteRequest, FileRecord, FolderState};
use tether_persistence::{ConfigStore, MemoryMetadataStore};
use tether_pipeline::{DefaultSyncEngine, FolderRegistry};

/// What the fake peer holds and what it was asked to do.
#[derive(Default)]
pub struct PeerLog {
    pub files: BTreeMap<String, Vec<u8>>,
    pub uploads: Vec<String>,
    pub delete_requests: Vec<Vec<String>>,
    pub state_requests: usize,
    pub reject: BTreeSet<String>,
}

/// Uploads being handled right now, and the most seen at once.
#[derive(Default)]
pub struct InFlight {
    delay: Duration,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct PeerState {
    folders: Arc<BTreeSet<String>>,
    log: Arc<Mutex<PeerLog>>,
    in_flight: Arc<InFlight>,
}

pub struct FakePeer {
    pub addr: SocketAddr,
    pub log: Arc<Mutex<PeerLog>>,
    in_flight: Arc<InFlight>,
    _handle: tokio::task::JoinHandle<()>,
}

impl FakePeer {
    pub fn seed(&self, path: &str, body: &[u8]) {
        self.log
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), body.to_vec());
    }

    pub fn reject(&self, path: &str) {
        self.log.lock().unwrap().reject.insert(path.to_string());
    }

    pub fn uploads(&self) -> Vec<String> {
        let mut v = self.log.lock().unwrap().uploads.clone();
        v.sort();
        v
    }

    pub fn delete_requests(&self) -> Vec<Vec<String>> {
        self.log.lock().unwrap().delete_requests.clone()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.log.lock().unwrap().files.keys().cloned().collect()
    }

    pub fn peak_uploads(&self) -> usize {
        self.in_flight.peak.load(Ordering::SeqCst)
    }
}

fn md5_hex(data: &[u8]) -> String {
    let mut ctx = md5::Context::new();
    ctx.consume(data);
    format!("{:x}", ctx.finalize())
}

async fn folder_state(
    State(peer): State<PeerState>,
    Path(name): Path<String>,
) -> Result<Json<FolderState>, StatusCode> {
    if !peer.folders.contains(&name) {
        return Err(StatusCode::NOT_FOUND);
    }
    let mut log = peer.log.lock().unwrap();
    log.state_requests += 1;
    let mut state = FolderState::empty(&name, "/srv/peer");
    for (path, body) in &log.files {
        state.insert(FileRecord::new(path.clone(), 1.0, md5_hex(body)));
    }
    Ok(Json(state))
}

async fn upload(
    State(peer): State<PeerState>,
    Path(name): Path<String>,
    mut multipart: Multipart,
) -> StatusCode {
    if !peer.folders.contains(&name) {
        return StatusCode::NOT_FOUND;
    }
    peer.in_flight.enter();
    tokio::time::sleep(peer.in_flight.delay).await;
    let status = store_upload(&peer, &mut multipart).await;
    peer.in_flight.leave();
    status
}

async fn store_upload(peer: &PeerState, multipart: &mut Multipart) -> StatusCode {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let Some(rel) = field.file_name().map(str::to_string) else {
            return StatusCode::BAD_REQUEST;
        };
        let Ok(bytes) = field.bytes().await else {
            return StatusCode::BAD_REQUEST;
        };
        let mut log = peer.log.lock().unwrap();
        if log.reject.contains(&rel) {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        log.uploads.push(rel.clone());
        log.files.insert(rel, bytes.to_vec());
    }
    StatusCode::OK
}

async fn delete(
    State(peer): State<PeerState>,
    Path(name): Path<String>,
    Json(req): Json<DeleteRequest>,
) -> StatusCode {
    if !peer.folders.contains(&name) {
        return StatusCode::NOT_FOUND;
    }
    let mut log = peer.log.lock().unwrap();
    for path in &req.files_to_delete {
        log.files.remove(path);
    }
    log.delete_requests.push(req.files_to_delete);
    StatusCode::OK
}

pub async fn start_peer(folder: &str) -> FakePeer {
    start_slow_peer(&[folder], Duration::ZERO).await
}

/// A fake peer serving `folders` that holds every upload for `delay` before storing it.
pub async fn start_slow_peer(folders: &[&str], delay: Duration) -> FakePeer {
    let log = Arc::new(Mutex::new(PeerLog::default()));
    let in_flight = Arc::new(InFlight {
        delay,
        ..InFlight::default()
    });
    let state = PeerState {
        folders: Arc::new(folders.iter().map(|f| f.to_string()).collect()),
        log: log.clone(),
        in_flight: in_flight.clone(),
    };
    let app = Router::new()
        .route("/files/:name", get(folder_state))
        .route("/files/:name/upload", post(upload))
        .route("/files/:name/delete", post(delete))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    FakePeer {
        addr,
        log,
        in_flight,
        _handle: handle,
    }
}

/// Route engine logs through the test harness; `RUST_LOG=debug` shows them.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A client workspace: one tracked folder plus its configuration and metadata.
pub struct ClientSide {
    pub _dir: tempfile::TempDir,
    pub root: Utf8PathBuf,
    pub config: Arc<ConfigStore>,
    pub store: Arc<MemoryMetadataStore>,
    pub registry: FolderRegistry,
}

impl ClientSide {
    pub fn new(folder: &str, peer_address: &str) -> Self {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let root = base.join("data");
        std::fs::create_dir_all(&root).unwrap();

        let config = Arc::new(ConfigStore::open(&base.join("config")).unwrap());
        let store = Arc::new(MemoryMetadataStore::new());
        let registry = FolderRegistry::new(config.clone(), store.clone());
        registry.register(folder, &root).unwrap();
        registry.set_peer_address(peer_address).unwrap();

        // Registration stores the canonical form.
        let root = registry.base_path(folder).unwrap();
        Self {
            _dir: dir,
            root,
            config,
            store,
            registry,
        }
    }

    pub fn engine(&self) -> DefaultSyncEngine {
        DefaultSyncEngine::new(self.config.clone(), self.store.clone(), reqwest::Client::new())
            .unwrap()
    }

    pub fn write(&self, rel: &str, body: &[u8]) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, body).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
    }
}
