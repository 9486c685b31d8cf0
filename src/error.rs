//! Error types for the upload and download pipelines.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Filesystem-level failures under the storage root.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The resolved path would leave the storage root.
    #[error("path escapes storage root: {0}")]
    PathEscapesRoot(String),

    /// The attachment name has no usable final component.
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("mkdir {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("create {}: {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("stat {}: {source}", path.display())]
    Stat { path: PathBuf, source: io::Error },

    #[error("read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("{} is not a regular file", .0.display())]
    NotAFile(PathBuf),
}

/// Why an upload request was rejected or only partly stored.
///
/// The `Display` text is what clients see in the response body.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("content-type must be multipart/form-data")]
    InvalidContentType,

    #[error("file too large, length={length}, limit {limit}")]
    TooLarge { length: u64, limit: u64 },

    #[error("parse multipart form error: {0}")]
    Multipart(#[from] multer::Error),

    #[error("mkdir fail, {}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    /// The subdirectory directive itself could not be resolved.
    #[error("invalid subdir: {0}")]
    Storage(#[source] StorageError),

    #[error("no file")]
    NoFile,

    #[error("no multipartform key")]
    EmptyFieldName,

    #[error("too many files: {count}")]
    TooManyFiles { count: usize },

    /// Some attachments of a field failed; only the last failure is kept.
    #[error("upload failed, last err: {last}")]
    Partial {
        uploaded: usize,
        failed: usize,
        last: StorageError,
    },
}

/// Why a download request could not be served.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Malformed percent-encoding or a non-UTF-8 result.
    #[error("{0}")]
    Decode(String),

    /// Covers missing files, directories and paths outside the root.
    #[error("{0}")]
    NotFound(StorageError),

    #[error("{0}")]
    Stat(StorageError),

    #[error("{0}")]
    Read(StorageError),
}

impl UploadError {
    /// Whether the request was malformed rather than the server failing.
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::CreateDir { .. } | Self::Partial { .. })
    }
}
