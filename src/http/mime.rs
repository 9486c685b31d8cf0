//! MIME type detection module
//!
//! Maps download file extensions to a Content-Type.

use serde::Deserialize;
use std::path::Path;

/// Fallback type for unknown files
pub const OCTET_STREAM: &str = "application/octet-stream";

/// How the download handler picks the Content-Type header
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentTypePolicy {
    /// Always `application/octet-stream`, so browsers save instead of render
    #[default]
    Generic,
    /// Use the extension table, falling back to `application/octet-stream`
    ByExtension,
}

/// Look up the MIME type for an extension (case-insensitive)
///
/// # Examples
/// ```
/// use rust_fileserver::http::mime::lookup;
/// assert_eq!(lookup(Some("JPG")), Some("image/jpeg"));
/// assert_eq!(lookup(Some("mp4")), Some("video/mpeg4"));
/// assert_eq!(lookup(None), None);
/// ```
pub fn lookup(extension: Option<&str>) -> Option<&'static str> {
    let ext = extension?.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        // Images
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",

        // Video/Audio
        "mp4" => "video/mpeg4",
        "mp3" => "audio/mp3",
        "wav" => "audio/wav",

        // Documents
        "pdf" => "application/pdf",
        "doc" => "application/msword",

        _ => return None,
    };
    Some(content_type)
}

/// Resolve the Content-Type for a downloaded file name
pub fn content_type_for(file_name: &str, policy: ContentTypePolicy) -> &'static str {
    match policy {
        ContentTypePolicy::Generic => OCTET_STREAM,
        ContentTypePolicy::ByExtension => {
            let extension = Path::new(file_name).extension().and_then(|e| e.to_str());
            lookup(extension).unwrap_or(OCTET_STREAM)
        }
    }
}
