// HTTP server bootstrap: config, resources, listeners and graceful shutdown.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{
        header::{self, HeaderMap, HeaderValue},
        StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use droppy_common::config::Config;
use droppy_common::paths::Paths;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::files::{self, PathRejection};
use crate::resources::{self, Bundle};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// How `droppy start` hands control to the server.
pub struct StartOptions {
    pub paths: Paths,
    pub dev: bool,
    /// Already-bound listener to serve on instead of the configured ones.
    pub preset: Option<TcpListener>,
}

#[derive(Clone)]
struct AppState {
    files_dir: Arc<PathBuf>,
    config: Arc<Config>,
    bundle: Arc<Bundle>,
}

/// Run in the foreground until Ctrl+C or SIGTERM.
pub async fn start(options: StartOptions) -> Result<()> {
    serve_until(options, shutdown_signal()).await
}

/// Run until `shutdown` resolves, then drain every listener.
pub async fn serve_until<F>(options: StartOptions, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let StartOptions { paths, dev, preset } = options;

    let config_file = paths.config_file();
    let config = Config::load_or_init(&config_file)
        .with_context(|| format!("failed to load config `{}`", config_file.display()))?;
    tokio::fs::create_dir_all(&paths.files_dir).await.with_context(|| {
        format!("failed to create files directory `{}`", paths.files_dir.display())
    })?;

    let bundle = {
        let paths = paths.clone();
        tokio::task::spawn_blocking(move || resources::load(&paths, dev))
            .await
            .context("resource loading task failed")?
    };

    let listeners = match preset {
        Some(listener) => vec![listener],
        None => bind_all(&config).await?,
    };

    let app = build_router(AppState {
        files_dir: Arc::new(paths.files_dir.clone()),
        config: Arc::new(config),
        bundle: Arc::new(bundle),
    });

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown.await;
        let _ = stop_tx.send(true);
    });

    let mut servers = JoinSet::new();
    for listener in listeners {
        let addr = listener.local_addr().context("listener has no local address")?;
        info!(%addr, files_dir = %paths.files_dir.display(), dev, "droppy listening");

        let app = app.clone();
        let mut stop_rx = stop_rx.clone();
        servers.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.wait_for(|stop| *stop).await;
                })
                .await
                .with_context(|| format!("server on {addr} exited unexpectedly"))
        });
    }

    while let Some(joined) = servers.join_next().await {
        joined.context("server task panicked")??;
    }
    info!("droppy stopped");
    Ok(())
}

async fn bind_all(config: &Config) -> Result<Vec<TcpListener>> {
    if config.listeners.is_empty() {
        anyhow::bail!("no listeners configured");
    }

    let mut listeners = Vec::with_capacity(config.listeners.len());
    for listener in &config.listeners {
        let addr = listener.address();
        let bound = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind listener on {addr}"))?;
        listeners.push(bound);
    }
    Ok(listeners)
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(index))
        .route("/res/{name}", get(resource))
        .route("/files", get(files_root))
        .route("/files/", get(files_root))
        .route("/files/{*path}", get(files_path))
        .layer(middleware::from_fn_with_state(state.clone(), frame_policy))
        .layer(middleware::from_fn(request_context_middleware))
        .with_state(state)
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    serve_resource(&state.bundle, "index.html", &headers)
}

async fn resource(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    serve_resource(&state.bundle, &name, &headers)
}

fn serve_resource(bundle: &Bundle, name: &str, headers: &HeaderMap) -> Response {
    let Some(resource) = bundle.get(name) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    let etag = format!("\"{}\"", resource.etag);
    let matches = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.split(',').any(|tag| tag.trim() == etag));

    let mut response = if matches {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        resource.content.clone().into_response()
    };
    let response_headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&resource.mime) {
        response_headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&etag) {
        response_headers.insert(header::ETAG, value);
    }
    response
}

async fn files_root(State(state): State<AppState>) -> Response {
    serve_path(&state, String::new()).await
}

async fn files_path(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    serve_path(&state, path).await
}

async fn serve_path(state: &AppState, rel: String) -> Response {
    let target = match files::resolve(&state.files_dir, &rel, &state.config) {
        Ok(target) => target,
        Err(PathRejection::Ignored) => return (StatusCode::NOT_FOUND, "not found").into_response(),
        Err(rejection) => {
            debug!(path = %rel, ?rejection, "rejected file path");
            return (StatusCode::BAD_REQUEST, "invalid path").into_response();
        }
    };

    let metadata = match tokio::fs::metadata(&target).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (StatusCode::NOT_FOUND, "not found").into_response();
        }
        Err(e) => {
            warn!(path = %target.display(), error = %e, "failed to stat file");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if metadata.is_dir() {
        return match files::list(&target, &rel, &state.config).await {
            Ok(listing) => Json(listing).into_response(),
            Err(e) => {
                warn!(path = %target.display(), error = %e, "failed to list directory");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        };
    }

    match tokio::fs::File::open(&target).await {
        Ok(file) => {
            let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
            response
        }
        Err(e) => {
            warn!(path = %target.display(), error = %e, "failed to open file");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn frame_policy(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    if !state.config.allow_frame {
        response.headers_mut().insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    }
    response
}

async fn request_context_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response = next.run(request).await;

    if let Ok(request_id_header) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, request_id_header);
    }

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started_at.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state(files_dir: &std::path::Path, config: Config) -> AppState {
        AppState {
            files_dir: Arc::new(files_dir.to_path_buf()),
            config: Arc::new(config),
            bundle: Arc::new(resources::compile(true)),
        }
    }

    async fn get_with(app: Router, uri: &str, headers: &[(&str, &str)]) -> Response {
        let mut builder = axum::http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        app.oneshot(builder.body(Body::empty()).expect("request should build"))
            .await
            .expect("request should return a response")
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
    }

    #[tokio::test]
    async fn health_check_has_request_id_header() {
        let tmp = TempDir::new().unwrap();
        let response = get_with(build_router(state(tmp.path(), Config::default())), "/healthz", &[])
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let tmp = TempDir::new().unwrap();
        let app = build_router(state(tmp.path(), Config::default()));
        let response = get_with(app, "/healthz", &[(REQUEST_ID_HEADER, "abc-123")]).await;

        assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc-123");
    }

    #[tokio::test]
    async fn index_serves_html_with_etag() {
        let tmp = TempDir::new().unwrap();
        let response = get_with(build_router(state(tmp.path(), Config::default())), "/", &[]).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert!(response.headers().contains_key(header::ETAG));
        assert!(body_string(response).await.contains("<title>droppy</title>"));
    }

    #[tokio::test]
    async fn resource_honours_if_none_match() {
        let tmp = TempDir::new().unwrap();
        let app = build_router(state(tmp.path(), Config::default()));

        let first = get_with(app.clone(), "/res/style.css", &[]).await;
        assert_eq!(first.status(), StatusCode::OK);
        let etag = first.headers()[header::ETAG].to_str().unwrap().to_owned();

        let second = get_with(app, "/res/style.css", &[("if-none-match", etag.as_str())]).await;
        assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn unknown_resource_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let app = build_router(state(tmp.path(), Config::default()));
        assert_eq!(get_with(app, "/res/nope.js", &[]).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn frames_denied_unless_allowed() {
        let tmp = TempDir::new().unwrap();
        let denied = get_with(build_router(state(tmp.path(), Config::default())), "/", &[]).await;
        assert_eq!(denied.headers()[header::X_FRAME_OPTIONS], "DENY");

        let allowed_cfg = Config { allow_frame: true, ..Config::default() };
        let allowed = get_with(build_router(state(tmp.path(), allowed_cfg)), "/", &[]).await;
        assert!(!allowed.headers().contains_key(header::X_FRAME_OPTIONS));
    }

    #[tokio::test]
    async fn files_root_lists_directory() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();
        std::fs::write(tmp.path().join("hello.txt"), "hello").unwrap();
        let app = build_router(state(tmp.path(), Config::default()));

        for uri in ["/files", "/files/"] {
            let response = get_with(app.clone(), uri, &[]).await;
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            let json: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(json["entries"][0]["name"], "docs");
            assert_eq!(json["entries"][1]["name"], "hello.txt");
            assert_eq!(json["entries"][1]["size"], 5);
        }
    }

    #[tokio::test]
    async fn files_path_downloads_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();
        std::fs::write(tmp.path().join("docs").join("a.txt"), "contents").unwrap();
        let app = build_router(state(tmp.path(), Config::default()));

        let response = get_with(app.clone(), "/files/docs/a.txt", &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(body_string(response).await, "contents");

        let listing = get_with(app, "/files/docs", &[]).await;
        let json: serde_json::Value = serde_json::from_str(&body_string(listing).await).unwrap();
        assert_eq!(json["path"], "docs");
    }

    #[tokio::test]
    async fn large_download_streams_whole_file() {
        let tmp = TempDir::new().unwrap();
        let payload: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(tmp.path().join("big.bin"), &payload).unwrap();
        let app = build_router(state(tmp.path(), Config::default()));

        let response = get_with(app, "/files/big.bin", &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "1000000");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn files_missing_and_ignored_are_not_found() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("secret.part"), "x").unwrap();
        let cfg = Config { ignore_patterns: vec!["*.part".into()], ..Config::default() };
        let app = build_router(state(tmp.path(), cfg));

        assert_eq!(
            get_with(app.clone(), "/files/missing.txt", &[]).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(get_with(app, "/files/secret.part", &[]).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn files_traversal_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let app = build_router(state(tmp.path(), Config::default()));

        let response = get_with(app, "/files/..%2F..%2Fetc%2Fpasswd", &[]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
