//! Demo binary: wires `ProviderProxy` into a thin HTTP server. The
//! surrounding request-processing pipeline this filter plugs into in
//! production is out of scope (see `pipeline.rs`); this binary exists so
//! the filter has somewhere to run standalone, not as a production
//! deployment target.

use axum::body::Bytes;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use provider_proxy::config::ProviderSpec;
use provider_proxy::pipeline::{Context, InboundRequest};
use provider_proxy::ProviderProxy;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let log_level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    if let Err(e) = PrometheusBuilder::new().install() {
        error!("failed to install prometheus recorder: {e}");
    }

    let config_path =
        std::env::var("PROVIDER_PROXY_CONFIG").unwrap_or_else(|_| "provider-proxy.yaml".to_string());
    let raw = match std::fs::read_to_string(&config_path) {
        Ok(raw) => raw,
        Err(e) => {
            error!("failed to read {config_path}: {e}");
            std::process::exit(1);
        }
    };
    let spec: ProviderSpec = match serde_yaml::from_str(&raw) {
        Ok(spec) => spec,
        Err(e) => {
            error!("failed to parse {config_path}: {e}");
            std::process::exit(1);
        }
    };

    info!("policy: {}, {} upstream(s)", spec.policy.as_str(), spec.urls.len());

    let proxy = match ProviderProxy::init(spec).await {
        Ok(proxy) => Arc::new(proxy),
        Err(e) => {
            error!("failed to initialize provider proxy: {e}");
            std::process::exit(1);
        }
    };

    let addr: SocketAddr = std::env::var("PROVIDER_PROXY_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));

    let app = Router::new()
        .route("/*path", any(forward))
        .route("/", any(forward))
        .with_state(Arc::clone(&proxy));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!("listening on {addr}");
    info!("press ctrl+c to stop");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("server error: {e}");
            }
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    proxy.close();
    info!("shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("failed to listen for shutdown: {e}");
    }
}

async fn forward(
    State(proxy): State<Arc<ProviderProxy>>,
    method: Method,
    uri: OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = InboundRequest::new(method, uri.0.path().to_string(), headers, body);
    let mut ctx = Context::new(request);
    let result = proxy.handle(&mut ctx).await;

    match ctx.into_response() {
        Some(response) if result.is_empty() => {
            (response.status, response.headers, response.body).into_response()
        }
        _ => (StatusCode::BAD_GATEWAY, result).into_response(),
    }
}
