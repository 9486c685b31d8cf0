//! HTTP response building module
//!
//! Builders for the plain-text and attachment responses the handlers return.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Build plain-text response with the given status
pub fn build_text_response(status: StatusCode, message: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let body: Bytes = message.into();
    Response::builder()
        .status(status)
        .header("Content-Type", TEXT_PLAIN)
        .header("Content-Length", body.len())
        .body(Full::new(body.clone()))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(body))
        })
}

/// Build empty 200 response
pub fn build_empty_response() -> Response<Full<Bytes>> {
    Response::new(Full::new(Bytes::new()))
}

/// Build 404 Not Found response carrying the failure text
pub fn build_404_response(message: &str) -> Response<Full<Bytes>> {
    build_text_response(StatusCode::NOT_FOUND, message.to_string())
}

/// Build 405 Method Not Allowed response
pub fn build_405_response(allow: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Content-Type", TEXT_PLAIN)
        .header("Allow", allow)
        .body(Full::new(Bytes::from("405 Method Not Allowed")))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(Full::new(Bytes::from("405 Method Not Allowed")))
        })
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool, allow: &'static str) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", allow);

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", allow)
            .header("Access-Control-Allow-Headers", "Content-Type, Content-Length")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Build health probe response
pub fn build_health_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .header("Cache-Control", "no-cache, no-store")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|e| {
            log_build_error("health", &e);
            Response::new(Full::new(Bytes::from(body)))
        })
}

/// Build file download response
///
/// `Content-Length` always reports the file size; for HEAD the body is empty.
pub fn build_attachment_response(
    file_name: &str,
    content_type: &str,
    data: Bytes,
    content_length: u64,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let body = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Disposition", format!("attachment; filename={file_name}"))
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("attachment", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_text_response() {
        let resp = build_text_response(StatusCode::OK, "no file");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-length"], "7");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"no file");
    }

    #[test]
    fn test_attachment_headers() {
        let resp = build_attachment_response(
            "zhao/Group%20886.png",
            "application/octet-stream",
            Bytes::from_static(b"abc"),
            3,
            false,
        );
        let headers = resp.headers();
        assert_eq!(
            headers["content-disposition"],
            "attachment; filename=zhao/Group%20886.png"
        );
        assert_eq!(headers["content-type"], "application/octet-stream");
        assert_eq!(headers["content-length"], "3");
    }

    #[tokio::test]
    async fn test_attachment_head_has_no_body() {
        let resp = build_attachment_response("a.bin", "application/octet-stream", Bytes::new(), 42, true);
        assert_eq!(resp.headers()["content-length"], "42");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[test]
    fn test_options_cors() {
        let resp = build_options_response(true, "POST, OPTIONS");
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");

        let resp = build_options_response(false, "POST, OPTIONS");
        assert!(resp.headers().get("access-control-allow-origin").is_none());
    }
}
