//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: health probes, the upload route
//! and the catch-all download route, with method checks and access logging.

use crate::config::{AppState, Config};
use crate::handler::{download, upload};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, SERVER};
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

const UPLOAD_ALLOW: &str = "POST, OPTIONS";
const DOWNLOAD_ALLOW: &str = "GET, HEAD, OPTIONS";

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer: Option<SocketAddr>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let started = Instant::now();
    let entry = state
        .config
        .logging
        .access_log
        .then(|| AccessLogEntry::from_request(&req, peer));

    let mut response = route_request(req, &state).await;
    decorate(&mut response, &state.config);

    if let Some(mut entry) = entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route request based on path and method
async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let routes = &state.config.routes;
    let method = req.method().clone();
    let path = req.uri().path();

    // Health check endpoints (highest priority, always fast)
    if routes.health.enabled && matches!(method, Method::GET | Method::HEAD) {
        if path == routes.health.liveness_path {
            return http::build_health_response(StatusCode::OK, "ok");
        }
        if path == routes.health.readiness_path {
            return if state.storage.is_ready().await {
                http::build_health_response(StatusCode::OK, "ok")
            } else {
                logger::log_warning(&format!(
                    "readiness check failed: storage root {} is not a directory",
                    state.storage.path().display()
                ));
                http::build_health_response(StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
            };
        }
    }

    if path == routes.upload_path {
        return match method {
            Method::POST => upload::handle_upload(req, state).await,
            Method::OPTIONS => {
                http::build_options_response(state.config.http.enable_cors, UPLOAD_ALLOW)
            }
            _ => method_not_allowed(&method, UPLOAD_ALLOW),
        };
    }

    match method {
        Method::GET | Method::HEAD => download::handle_download(&method, path, state).await,
        Method::OPTIONS => http::build_options_response(state.config.http.enable_cors, DOWNLOAD_ALLOW),
        _ => method_not_allowed(&method, DOWNLOAD_ALLOW),
    }
}

fn method_not_allowed(method: &Method, allow: &'static str) -> Response<Full<Bytes>> {
    logger::log_warning(&format!("Method not allowed: {method}"));
    http::build_405_response(allow)
}

/// Headers every response carries
fn decorate(response: &mut Response<Full<Bytes>>, config: &Config) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&config.http.server_name) {
        headers.insert(SERVER, value);
    }
    if config.http.enable_cors {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    }
}
