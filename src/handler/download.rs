//! Download handler
//!
//! Serves any file below the storage root as an attachment, addressed by the
//! percent-encoded request path.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Response, StatusCode};
use percent_encoding::percent_decode_str;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::config::{AppState, StatusMode};
use crate::error::{DownloadError, StorageError};
use crate::http::{self, mime, ContentTypePolicy};
use crate::logger;
use crate::storage::StorageRoot;

/// Upper bound on the read buffer reserved up front; larger files grow it while reading
const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

/// A file ready to be sent
#[derive(Debug)]
pub struct DownloadedFile {
    /// Request path as sent, still percent-encoded
    pub name: String,
    pub content_type: &'static str,
    pub size: u64,
    /// Empty when only headers were requested
    pub data: Bytes,
}

/// HTTP entry point for the catch-all download route
pub async fn handle_download(method: &Method, path: &str, state: &AppState) -> Response<Full<Bytes>> {
    if state.config.routes.favicon_paths.iter().any(|p| p == path) {
        return http::build_empty_response();
    }

    let is_head = *method == Method::HEAD;
    let result = fetch(
        path,
        &state.storage,
        state.config.download.content_type,
        is_head,
    )
    .await;
    render(result, is_head, state.config.http.status_mode)
}

/// Locate, stat and read the file named by `raw_path`
///
/// With `skip_body` the file is opened and stat'ed but not read.
pub async fn fetch(
    raw_path: &str,
    storage: &StorageRoot,
    policy: ContentTypePolicy,
    skip_body: bool,
) -> Result<DownloadedFile, DownloadError> {
    let name = raw_path.strip_prefix('/').unwrap_or(raw_path);
    let relative = decode_path(name)?;

    let (path, mut file) = storage.open(&relative).await.map_err(|e| {
        logger::log_warning(&format!("open {name} failed: {e}"));
        DownloadError::NotFound(e)
    })?;

    let meta = file
        .metadata()
        .await
        .map_err(|source| DownloadError::Stat(StorageError::Stat {
            path: path.clone(),
            source,
        }))?;
    if !meta.is_file() {
        return Err(DownloadError::NotFound(StorageError::NotAFile(path)));
    }

    let content_type = mime::content_type_for(&relative, policy);
    let size = meta.len();

    let data = if skip_body {
        Bytes::new()
    } else {
        let capacity = usize::try_from(size.min(MAX_PREALLOC)).unwrap_or_default();
        let mut buf = Vec::with_capacity(capacity);
        let read = async {
            file.seek(std::io::SeekFrom::Start(0)).await?;
            file.read_to_end(&mut buf).await
        }
        .await;
        read.map_err(|source| DownloadError::Read(StorageError::Read { path, source }))?;
        Bytes::from(buf)
    };

    Ok(DownloadedFile {
        name: name.to_string(),
        content_type,
        size,
        data,
    })
}

/// Percent-decode a path, rejecting malformed escapes and invalid UTF-8
///
/// `+` is not treated as a space.
pub fn decode_path(encoded: &str) -> Result<String, DownloadError> {
    // Query-style unescaping would map '+' to ' '; paths keep it literal
    let bytes = encoded.as_bytes();
    for (i, _) in encoded.match_indices('%') {
        let valid = bytes
            .get(i + 1..i + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            let end = (i + 3).min(encoded.len());
            let escape = encoded.get(i..end).unwrap_or("%");
            return Err(DownloadError::Decode(format!("invalid URL escape {escape:?}")));
        }
    }

    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| DownloadError::Decode(format!("invalid UTF-8 in path {encoded:?}")))
}

/// Status code for a failed download
pub const fn error_status(err: &DownloadError, mode: StatusMode) -> StatusCode {
    match (err, mode) {
        (DownloadError::NotFound(_), _) => StatusCode::NOT_FOUND,
        (_, StatusMode::Compat) => StatusCode::OK,
        (DownloadError::Decode(_), StatusMode::Strict) => StatusCode::BAD_REQUEST,
        (DownloadError::Stat(_) | DownloadError::Read(_), StatusMode::Strict) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn render(
    result: Result<DownloadedFile, DownloadError>,
    is_head: bool,
    mode: StatusMode,
) -> Response<Full<Bytes>> {
    match result {
        Ok(file) => http::build_attachment_response(
            &file.name,
            file.content_type,
            file.data,
            file.size,
            is_head,
        ),
        Err(DownloadError::NotFound(e)) => http::build_404_response(&e.to_string()),
        Err(err) => {
            logger::log_warning(&format!("download failed: {err}"));
            http::build_text_response(error_status(&err, mode), err.to_string())
        }
    }
}
