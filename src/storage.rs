//! Storage root
//!
//! Every path the handlers read or write is resolved here, so nothing outside
//! the configured root is ever touched.

use std::path::{Component, Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;

/// Default permissions for directories created under the root (rwxr-xr-x).
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Base directory for all uploaded and served files.
#[derive(Debug, Clone)]
pub struct StorageRoot {
    root: PathBuf,
    dir_mode: u32,
}

impl StorageRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dir_mode: DEFAULT_DIR_MODE,
        }
    }

    #[must_use]
    pub const fn with_dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Join `relative` onto the root after lexical normalization.
    ///
    /// Leading separators and `.` segments are dropped and `..` pops one
    /// segment; climbing above the root is an error. Symlinks are not
    /// followed.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
        let relative = relative.as_ref();
        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part),
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(StorageError::PathEscapesRoot(
                            relative.display().to_string(),
                        ));
                    }
                }
                Component::CurDir | Component::RootDir => {}
                Component::Prefix(_) => {
                    return Err(StorageError::PathEscapesRoot(
                        relative.display().to_string(),
                    ));
                }
            }
        }

        let mut resolved = self.root.clone();
        resolved.extend(parts);
        Ok(resolved)
    }

    /// Resolve `root/subdir/file_name`.
    pub fn resolve_file(&self, subdir: &str, file_name: &str) -> Result<PathBuf, StorageError> {
        self.resolve(Path::new(subdir).join(file_name))
    }

    /// Create `root/subdir` and any missing parents. Idempotent.
    pub async fn ensure_dir(&self, subdir: &str) -> Result<PathBuf, StorageError> {
        let path = self.resolve(subdir)?;
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(self.dir_mode);

        builder
            .create(&path)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Create (or truncate) `root/subdir/file_name` and write `data` into it.
    ///
    /// Returns the destination path.
    pub async fn write_file(
        &self,
        subdir: &str,
        file_name: &str,
        data: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let path = self.resolve_file(subdir, file_name)?;
        let mut file = File::create(&path)
            .await
            .map_err(|source| StorageError::Create {
                path: path.clone(),
                source,
            })?;

        let written = async {
            file.write_all(data).await?;
            file.flush().await
        }
        .await;
        written.map_err(|source| StorageError::Write {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }

    /// Open an existing regular file below the root for reading.
    pub async fn open(&self, relative: &str) -> Result<(PathBuf, File), StorageError> {
        let path = self.resolve(relative)?;
        let file = File::open(&path)
            .await
            .map_err(|source| StorageError::Open {
                path: path.clone(),
                source,
            })?;
        Ok((path, file))
    }

    /// Whether the root exists and is a directory.
    pub async fn is_ready(&self) -> bool {
        fs::metadata(&self.root)
            .await
            .is_ok_and(|meta| meta.is_dir())
    }
}

/// Reduce a client-supplied attachment name to its final path component.
///
/// Both `/` and `\` count as separators. Names with no usable component
/// (empty, `.` or `..`) are rejected.
pub fn sanitize_file_name(name: &str) -> Result<&str, StorageError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    match base {
        "" | "." | ".." => Err(StorageError::InvalidFileName(name.to_string())),
        _ => Ok(base),
    }
}
