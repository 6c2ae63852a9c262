//! Static file server with live reload.
//!
//! The server runs on its own thread with its own tokio runtime so the task
//! runner and the watcher stay synchronous. The only object shared with the
//! rest of the process is the [`LiveReload`] sender.

use crate::config::ServerConfig;
use crate::livereload::{inject_client, LiveReload, CLIENT_PATH};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::convert::Infallible;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::trace::TraceLayer;

/// Error starting or running the dev server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    /// The directory to serve does not exist
    #[error("Server root {0} is not a directory")]
    MissingRoot(PathBuf),
    /// Thread or runtime creation failed
    #[error("Failed to start server runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Binding failed for a reason other than the port being taken
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// Every port in the allowed range was taken
    #[error("Ports {first}..{last} on {host} are all in use")]
    PortsInUse { host: String, first: u16, last: u16 },
    /// The server stopped with an IO error
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
    /// The server thread panicked
    #[error("Server thread panicked")]
    Panicked,
}

/// Where and what to serve.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub root: PathBuf,
    pub host: String,
    pub port: u16,
    /// Consecutive ports tried when the configured one is taken
    pub port_attempts: u16,
    pub inject_client: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig, project_root: &Path) -> Self {
        Self {
            root: crate::config::loader::resolve_path(project_root, &config.base_dir),
            host: config.host.clone(),
            port: config.port,
            port_attempts: config.port_attempts,
            inject_client: config.inject_client,
        }
    }
}

/// Handle to a running server.
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    thread: JoinHandle<Result<(), ServerError>>,
}

impl ServerHandle {
    /// Address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Block until the server stops (normally: until the process ends).
    pub fn wait(self) -> Result<(), ServerError> {
        self.thread.join().map_err(|_| ServerError::Panicked)?
    }
}

/// Development server entry point.
pub struct DevServer;

impl DevServer {
    /// Start serving on a background thread.
    ///
    /// Returns once the listener is bound, so bind errors surface here.
    pub fn spawn(options: ServerOptions, reload: LiveReload) -> Result<ServerHandle, ServerError> {
        if !options.root.is_dir() {
            return Err(ServerError::MissingRoot(options.root));
        }

        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let thread = std::thread::Builder::new()
            .name("sitepipe-server".to_string())
            .spawn(move || run(options, reload, ready_tx))
            .map_err(ServerError::Runtime)?;

        match ready_rx.recv() {
            Ok(addr) => {
                tracing::info!(%addr, "dev server listening");
                Ok(ServerHandle { addr, thread })
            }
            // The thread exits without reporting only when startup failed
            Err(_) => match thread.join() {
                Ok(Err(e)) => Err(e),
                Ok(Ok(())) | Err(_) => Err(ServerError::Panicked),
            },
        }
    }
}

#[derive(Clone)]
struct AppState {
    root: Arc<PathBuf>,
    inject_client: bool,
    reload: LiveReload,
}

fn run(
    options: ServerOptions,
    reload: LiveReload,
    ready: mpsc::SyncSender<SocketAddr>,
) -> Result<(), ServerError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(ServerError::Runtime)?;

    runtime.block_on(async move {
        let listener = bind(&options).await?;
        let addr = listener.local_addr().map_err(ServerError::Serve)?;

        let state = AppState {
            root: Arc::new(options.root),
            inject_client: options.inject_client,
            reload,
        };
        let app = Router::new()
            .route(CLIENT_PATH, get(reload_events))
            .fallback(serve_file)
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let _ = ready.send(addr);
        axum::serve(listener, app).await.map_err(ServerError::Serve)
    })
}

async fn bind(options: &ServerOptions) -> Result<TcpListener, ServerError> {
    let attempts = options.port_attempts.max(1);
    let mut last = options.port;

    for offset in 0..attempts {
        let Some(port) = options.port.checked_add(offset) else {
            break;
        };
        last = port;
        match TcpListener::bind((options.host.as_str(), port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == ErrorKind::AddrInUse && options.port != 0 => {
                tracing::debug!(port, "port in use, trying the next one");
            }
            Err(source) => {
                return Err(ServerError::Bind {
                    addr: format!("{}:{}", options.host, port),
                    source,
                })
            }
        }
    }

    Err(ServerError::PortsInUse { host: options.host.clone(), first: options.port, last })
}

async fn reload_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.reload.subscribe()).filter_map(|item| match item {
        Ok(event) => Some(Ok(Event::default().event(event.name()).data(event.data()))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "live reload subscriber lagged behind; dropping old events");
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new().interval(Duration::from_secs(15)).text("keepalive"),
    )
}

async fn serve_file(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(path) = resolve_request(&state.root, uri.path()).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(file = %path.display(), error = %e, "read failed");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let content_type = content_type(&path);
    let body = if state.inject_client && content_type.starts_with("text/html") {
        inject_client(&String::from_utf8_lossy(&bytes)).into_bytes()
    } else {
        bytes
    };

    ([(header::CONTENT_TYPE, content_type), (header::CACHE_CONTROL, "no-cache")], body)
        .into_response()
}

/// Map a request path onto a file under `root`.
///
/// Returns `None` for traversal attempts and for paths that do not name a file.
async fn resolve_request(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in request_path.split('/') {
        let segment = decode_segment(segment)?;
        match segment.as_str() {
            "" | "." => continue,
            ".." => return None,
            s if s.contains(['/', '\\']) || s.contains(':') => return None,
            s => path.push(s),
        }
    }

    let metadata = tokio::fs::metadata(&path).await.ok()?;
    if metadata.is_dir() {
        path.push("index.html");
        let index = tokio::fs::metadata(&path).await.ok()?;
        return index.is_file().then_some(path);
    }
    metadata.is_file().then_some(path)
}

/// Malformed escapes are kept literally; undecodable UTF-8 is refused.
fn decode_segment(segment: &str) -> Option<String> {
    percent_decode_str(segment).decode_utf8().ok().map(Cow::into_owned)
}

fn content_type(path: &Path) -> &'static str {
    let extension = path.extension().map(|e| e.to_string_lossy().to_lowercase());
    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json" | "map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
