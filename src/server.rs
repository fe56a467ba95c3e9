/*!
 * HTTP surface: the manifest route plus a static-file fallback
 *
 * Routing is an explicit table: the manifest route dispatches to the
 * manifest provider, everything else resolves against the serve root. The
 * only state shared between requests is the read-only configuration.
 */

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::advertise::Advertisement;
use crate::config::BeaconConfig;
use crate::error::{BeaconError, Result};
use crate::manifest;

/// Build the request router for the given configuration.
pub fn build_router(config: Arc<BeaconConfig>) -> Router {
    let manifest_route = config.manifest_route.clone();
    Router::new()
        .route(&manifest_route, get(manifest_handler))
        .fallback(static_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(config)
}

/// Bind, advertise, and serve until interrupted.
///
/// The advertisement is registered only after the bind succeeds, using the
/// listener's actual port. Both failures are startup-fatal.
pub async fn run(config: BeaconConfig) -> Result<()> {
    config.validate()?;

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| BeaconError::Bind { addr, source })?;
    let local_addr = listener.local_addr().map_err(BeaconError::Io)?;

    let advertisement = Advertisement::register(&config.hostname, local_addr.port())?;

    tracing::info!(
        addr = %local_addr,
        hostname = %config.hostname,
        root = %config.root.display(),
        manifest_route = %config.manifest_route,
        "firmware endpoint listening"
    );

    let app = build_router(Arc::new(config));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(advertisement))
        .await
        .map_err(BeaconError::Io)?;

    tracing::info!("listener closed, exiting");
    Ok(())
}

/// Wait for an operator interrupt, then withdraw the advertisement.
///
/// The withdrawal happens as soon as the signal arrives, so peer caches
/// clear while in-flight responses drain.
async fn shutdown_signal(advertisement: Advertisement) {
    wait_for_interrupt().await;
    advertisement.withdraw();
}

async fn wait_for_interrupt() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("error waiting for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("received Ctrl+C, shutting down");
    }
}

/// Serve the update manifest, recomputed from the build metadata on disk.
async fn manifest_handler(State(config): State<Arc<BeaconConfig>>) -> Response {
    match manifest::produce_manifest(&config) {
        Ok(manifest) => {
            tracing::info!(
                method = "GET",
                path = %config.manifest_route,
                status = 200,
                version = %manifest.version,
                binary = %manifest.path,
                "served manifest"
            );
            Json(manifest).into_response()
        }
        Err(err) => {
            tracing::error!(
                method = "GET",
                path = %config.manifest_route,
                status = 500,
                error = %err,
                "manifest request failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("manifest unavailable: {}", err),
            )
                .into_response()
        }
    }
}

/// Default fallback: resolve the request path under the serve root and
/// return the file bytes.
async fn static_handler(
    State(config): State<Arc<BeaconConfig>>,
    method: Method,
    uri: Uri,
) -> Response {
    let path = uri.path().to_string();

    if method != Method::GET {
        tracing::warn!(%method, %path, status = 405, "method not allowed");
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    match serve_file(&config, &path).await {
        Ok((bytes, content_type)) => {
            tracing::info!(
                %method,
                %path,
                status = 200,
                bytes = bytes.len(),
                "served file"
            );
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type)],
                bytes,
            )
                .into_response()
        }
        Err(err) => {
            let status = match err {
                BeaconError::FileNotFound(_) => StatusCode::NOT_FOUND,
                BeaconError::PathRejected(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::warn!(%method, %path, status = %status.as_u16(), error = %err, "request failed");
            (status, err.to_string()).into_response()
        }
    }
}

async fn serve_file(config: &BeaconConfig, raw_path: &str) -> Result<(Vec<u8>, HeaderValue)> {
    let resolved = resolve_static_path(&config.root, raw_path)?;

    let metadata = tokio::fs::metadata(&resolved)
        .await
        .map_err(|_| BeaconError::FileNotFound(resolved.clone()))?;
    if !metadata.is_file() {
        return Err(BeaconError::FileNotFound(resolved));
    }

    let bytes = tokio::fs::read(&resolved)
        .await
        .map_err(|_| BeaconError::FileNotFound(resolved.clone()))?;

    let mime = mime_guess::from_path(&resolved).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.essence_str())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((bytes, content_type))
}

/// Resolve a request path against the serve root.
///
/// Request paths are attacker-influenced on any reachable network, so any
/// parent-directory or prefix component is rejected outright rather than
/// normalized.
fn resolve_static_path(root: &Path, raw_path: &str) -> Result<PathBuf> {
    let decoded = percent_decode_str(raw_path)
        .decode_utf8()
        .map_err(|_| BeaconError::PathRejected(raw_path.to_string()))?;

    let mut resolved = root.to_path_buf();
    for component in Path::new(decoded.as_ref()).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(BeaconError::PathRejected(raw_path.to_string()));
            }
        }
    }

    Ok(resolved)
}
