//! Simple upload server binary.
//!
//! Clients upload a file with `PUT`/`POST` to `<prefix>/{key}` and fetch it
//! back with `GET`/`HEAD`. An optional shared token gates every request under
//! the prefix. The main entry point builds the Axum router and starts the
//! HTTP (or HTTPS) listener.

mod auth;
mod config;
mod error;
mod files;
mod http;
mod locking;
mod logging;
mod storage;
mod tls;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Extension, connect_info::ConnectInfo};
use axum::http::Request;
use axum::middleware;
use axum::routing::any;
use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, info_span};

use crate::auth::TokenAuth;
use crate::config::{Args, SHUTDOWN_GRACE_SECS};
use crate::files::UploadConfig;
use crate::http::Mount;
use crate::locking::KeyLocks;
use crate::storage::Storage;

shadow!(build);

/// Starts the upload server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let args = Args::parse();
    logging::init_logging(&args.log_level);
    info!("starting up simple-upload-server");

    let mount = Arc::new(Mount::new(&args.prefix)?);
    let storage = Arc::new(Storage::new(PathBuf::from(&args.root)));
    let auth = Arc::new(TokenAuth::from_args(args.token.clone(), args.protected)?);
    let upload = Arc::new(UploadConfig {
        max_size: args.upload_limit,
    });
    storage.ensure_root().await?;

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let addr = SocketAddr::new(host, args.port);
    let tls_config = tls::build_rustls_config(&args).await?;

    let app = build_router(mount.clone(), storage.clone(), auth.clone(), upload);
    let handle = Handle::new();
    info!(
        ip = %host,
        port = args.port,
        root = %storage.root_path().display(),
        prefix = mount.prefix(),
        protected = auth.is_protected(),
        tls = tls_config.is_some(),
        "start listening"
    );

    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    let server = async {
        match tls_config {
            Some(config) => {
                axum_server::bind_rustls(addr, config)
                    .handle(handle.clone())
                    .serve(service)
                    .await
            }
            None => {
                axum_server::bind(addr)
                    .handle(handle.clone())
                    .serve(service)
                    .await
            }
        }
    };

    tokio::select! {
        result = server => result?,
        _ = shutdown_signal(handle.clone()) => {}
    }

    Ok(())
}

/// Builds the router: one key route under the mount, JSON 404 everywhere else.
pub(crate) fn build_router(
    mount: Arc<Mount>,
    storage: Arc<Storage>,
    auth: Arc<TokenAuth>,
    upload: Arc<UploadConfig>,
) -> Router {
    Router::new()
        .route(&mount.key_route(), any(files::handle_key))
        .fallback(files::not_found)
        .layer(middleware::from_fn(auth::token_middleware))
        .layer(middleware::from_fn(http::add_security_headers))
        .layer(DefaultBodyLimit::disable())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let client_ip = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| addr.ip().to_string())
                        .unwrap_or_else(|| "unknown".to_string());

                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(mount))
        .layer(Extension(storage))
        .layer(Extension(auth))
        .layer(Extension(upload))
        .layer(Extension(Arc::new(KeyLocks::new())))
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("received termination signal, shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_GRACE_SECS)));
}
