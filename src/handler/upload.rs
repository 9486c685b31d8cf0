//! Upload handler
//!
//! Validates a `multipart/form-data` request, creates the requested
//! subdirectory and writes every attachment below the storage root.

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};

use super::form::{self, FileAttachment, FileField, MultipartForm};
use crate::config::{AppState, FieldPolicy, StatusMode, UploadConfig};
use crate::error::{StorageError, UploadError};
use crate::http;
use crate::logger;
use crate::storage::{sanitize_file_name, StorageRoot};

const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Files stored for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReport {
    pub name: String,
    pub uploaded: usize,
}

/// Outcome of a fully successful upload
#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    /// Subdirectory below the root, empty for the root itself
    pub subdir: String,
    pub fields: Vec<FieldReport>,
}

impl UploadReport {
    pub fn uploaded(&self) -> usize {
        self.fields.iter().map(|f| f.uploaded).sum()
    }

    pub fn message(&self) -> String {
        format!("successful, {} files uploaded", self.uploaded())
    }
}

/// HTTP entry point for the upload route
pub async fn handle_upload<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let result = process_upload(req, &state.storage, &state.config.upload).await;
    render(&result, state.config.http.status_mode)
}

/// Run the whole upload pipeline without touching HTTP response types
pub async fn process_upload<B>(
    req: Request<B>,
    storage: &StorageRoot,
    config: &UploadConfig,
) -> Result<UploadReport, UploadError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let content_length = declared_length(&req);

    logger::log_info(&format!(
        "uploading content-type={content_type}, content-length={}",
        content_length.map_or_else(|| "-".to_string(), |len| len.to_string())
    ));

    if !content_type.contains(MULTIPART_FORM_DATA) {
        return Err(UploadError::InvalidContentType);
    }
    check_length(content_length, config.max_size)?;

    let form = form::parse(req.into_body(), &content_type, config.max_size).await?;
    for name in form.value_names() {
        logger::log_debug(&format!("multipartform value name={name}"));
    }

    let subdir = prepare_subdir(&form, storage, &config.subdir_field).await?;

    let fields = match (form.files(), config.field_policy) {
        ([], _) => return Err(UploadError::NoFile),
        ([first, ..], FieldPolicy::FirstOnly) => std::slice::from_ref(first),
        (all, FieldPolicy::All) => all,
    };

    let mut report = UploadReport {
        subdir,
        fields: Vec::with_capacity(fields.len()),
    };
    for field in fields {
        logger::log_info(&format!("multipartform file name={}", field.name));
        let uploaded = store_field(
            field,
            storage,
            &report.subdir,
            config.max_files_per_field,
            content_length,
        )
        .await?;
        report.fields.push(FieldReport {
            name: field.name.clone(),
            uploaded,
        });
    }

    Ok(report)
}

fn declared_length<B>(req: &Request<B>) -> Option<u64> {
    let value = req.headers().get("content-length")?;
    match value.to_str().ok().and_then(|v| v.trim().parse().ok()) {
        Some(len) => Some(len),
        None => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: {value:?}, skipping size check"
            ));
            None
        }
    }
}

/// The declared length must stay strictly below the limit
const fn check_length(content_length: Option<u64>, limit: u64) -> Result<(), UploadError> {
    match content_length {
        Some(length) if length >= limit => Err(UploadError::TooLarge { length, limit }),
        _ => Ok(()),
    }
}

/// Create the directory named by the subdir field, if present
async fn prepare_subdir(
    form: &MultipartForm,
    storage: &StorageRoot,
    field_name: &str,
) -> Result<String, UploadError> {
    let Some(subdir) = form.first_value(field_name) else {
        return Ok(String::new());
    };

    match storage.ensure_dir(subdir).await {
        Ok(path) => {
            logger::log_debug(&format!("ensured directory {}", path.display()));
            Ok(subdir.to_string())
        }
        Err(StorageError::CreateDir { path, source }) => {
            logger::log_warning(&format!("mkdir {} failed: {source}", path.display()));
            Err(UploadError::CreateDir { path, source })
        }
        Err(err) => {
            logger::log_warning(&format!("rejected subdir {subdir:?}: {err}"));
            Err(UploadError::Storage(err))
        }
    }
}

/// Write every attachment of one field, continuing past individual failures
async fn store_field(
    field: &FileField,
    storage: &StorageRoot,
    subdir: &str,
    max_files: usize,
    content_length: Option<u64>,
) -> Result<usize, UploadError> {
    if field.name.is_empty() {
        return Err(UploadError::EmptyFieldName);
    }
    let count = field.attachments.len();
    if count > max_files {
        return Err(UploadError::TooManyFiles { count });
    }

    let mut uploaded = 0;
    let mut failed = 0;
    let mut last_err = None;

    for attachment in &field.attachments {
        match store_attachment(attachment, storage, subdir).await {
            Ok(path) => {
                uploaded += 1;
                logger::log_info(&stored_line(attachment, content_length, &path));
            }
            Err(err) => {
                failed += 1;
                logger::log_warning(&format!(
                    "store file error, name={}, size={}, err: {err}",
                    attachment.filename,
                    attachment.size()
                ));
                last_err = Some(err);
            }
        }
    }

    match last_err {
        Some(last) => Err(UploadError::Partial {
            uploaded,
            failed,
            last,
        }),
        None => Ok(uploaded),
    }
}

fn stored_line(
    attachment: &FileAttachment,
    content_length: Option<u64>,
    path: &std::path::Path,
) -> String {
    #[allow(clippy::cast_precision_loss)]
    let kib = attachment.size() as f64 / 1024.0;
    format!(
        "successful uploaded, file={}, size: {kib:.2} KB, content-length={}, path={}",
        attachment.filename,
        content_length.map_or_else(|| "-".to_string(), |len| len.to_string()),
        path.display()
    )
}

async fn store_attachment(
    attachment: &FileAttachment,
    storage: &StorageRoot,
    subdir: &str,
) -> Result<std::path::PathBuf, StorageError> {
    let file_name = sanitize_file_name(&attachment.filename)?;
    storage.write_file(subdir, file_name, &attachment.data).await
}

/// Status code for a failed upload
pub const fn error_status(err: &UploadError, mode: StatusMode) -> StatusCode {
    if matches!(mode, StatusMode::Compat) {
        return StatusCode::OK;
    }
    match err {
        UploadError::InvalidContentType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        UploadError::TooLarge { .. }
        | UploadError::Multipart(
            multer::Error::StreamSizeExceeded { .. } | multer::Error::FieldSizeExceeded { .. },
        ) => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render the pipeline result as the plain-text response clients expect
pub fn render(result: &Result<UploadReport, UploadError>, mode: StatusMode) -> Response<Full<Bytes>> {
    match result {
        Ok(report) => http::build_text_response(StatusCode::OK, report.message()),
        Err(err) => {
            if let UploadError::Partial {
                uploaded, failed, ..
            } = err
            {
                logger::log_warning(&format!(
                    "upload partially failed: {uploaded} stored, {failed} failed"
                ));
            }
            http::build_text_response(error_status(err, mode), err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::form::tests::{content_type, multipart_body, Part};
    use http_body_util::{BodyExt, Full};
    use tempfile::TempDir;

    fn setup() -> (TempDir, StorageRoot, UploadConfig) {
        let tmp = tempfile::tempdir().unwrap();
        let storage = StorageRoot::new(tmp.path());
        (tmp, storage, UploadConfig::default())
    }

    fn upload_request(body: Vec<u8>) -> Request<Full<Bytes>> {
        Request::builder()
            .method("POST")
            .uri("/file/upload")
            .header("content-type", content_type())
            .header("content-length", body.len())
            .body(Full::new(Bytes::from(body)))
            .unwrap()
    }

    fn count_files(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().is_file())
            .count()
    }

    #[tokio::test]
    async fn test_single_file_with_subdir() {
        let (tmp, storage, config) = setup();
        let body = multipart_body(&[
            Part::Text("subdir", "zhao"),
            Part::File("file", "Group 886.png", b"\x89PNG data"),
        ]);

        let report = process_upload(upload_request(body), &storage, &config)
            .await
            .unwrap();

        assert_eq!(report.subdir, "zhao");
        assert_eq!(report.message(), "successful, 1 files uploaded");
        let stored = std::fs::read(tmp.path().join("zhao").join("Group 886.png")).unwrap();
        assert_eq!(stored, b"\x89PNG data");
    }

    #[tokio::test]
    async fn test_without_subdir_writes_to_root() {
        let (tmp, storage, config) = setup();
        let body = multipart_body(&[Part::File("file", "a.txt", b"hello")]);

        process_upload(upload_request(body), &storage, &config)
            .await
            .unwrap();
        assert_eq!(std::fs::read(tmp.path().join("a.txt")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_rejects_non_multipart() {
        let (tmp, storage, config) = setup();
        let req = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from_static(b"{}")))
            .unwrap();

        let result = process_upload(req, &storage, &config).await;
        let resp = render(&result, StatusMode::Compat);
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"content-type must be multipart/form-data");
        assert_eq!(count_files(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_rejects_declared_length_at_limit() {
        let (tmp, storage, config) = setup();
        let req = Request::builder()
            .method("POST")
            .header("content-type", content_type())
            .header("content-length", config.max_size)
            .body(Full::new(Bytes::new()))
            .unwrap();

        let err = process_upload(req, &storage, &config).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(&config.max_size.to_string()));
        assert!(matches!(err, UploadError::TooLarge { length, limit } if length == limit));
        assert_eq!(error_status(&err, StatusMode::Strict), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(count_files(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (_tmp, storage, config) = setup();
        let req = Request::builder()
            .method("POST")
            .header("content-type", "multipart/form-data")
            .body(Full::new(Bytes::from_static(b"garbage")))
            .unwrap();

        let err = process_upload(req, &storage, &config).await.unwrap_err();
        assert!(err.to_string().starts_with("parse multipart form error: "));
        assert_eq!(error_status(&err, StatusMode::Strict), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_too_many_files_writes_nothing() {
        let (tmp, storage, config) = setup();
        let names: Vec<String> = (0..101).map(|i| format!("f{i}.txt")).collect();
        let parts: Vec<Part<'_>> = names
            .iter()
            .map(|n| Part::File("file", n.as_str(), b"x"))
            .collect();

        let err = process_upload(upload_request(multipart_body(&parts)), &storage, &config)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "too many files: 101");
        assert_eq!(count_files(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_subdir_created_without_files() {
        let (tmp, storage, config) = setup();
        let body = multipart_body(&[Part::Text("subdir", "a/b")]);

        let err = process_upload(upload_request(body), &storage, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NoFile));
        assert!(tmp.path().join("a").join("b").is_dir());
    }

    #[tokio::test]
    async fn test_subdir_traversal_rejected() {
        let (tmp, storage, config) = setup();
        let body = multipart_body(&[
            Part::Text("subdir", "../outside"),
            Part::File("file", "a.txt", b"x"),
        ]);

        let err = process_upload(upload_request(body), &storage, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Storage(StorageError::PathEscapesRoot(_))));
        assert!(!tmp.path().parent().unwrap().join("outside").exists());
    }

    #[tokio::test]
    async fn test_mkdir_failure_aborts() {
        let (tmp, storage, config) = setup();
        std::fs::write(tmp.path().join("blocker"), b"not a directory").unwrap();
        let body = multipart_body(&[
            Part::Text("subdir", "blocker/sub"),
            Part::File("file", "a.txt", b"x"),
        ]);

        let err = process_upload(upload_request(body), &storage, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::CreateDir { .. }));
        assert!(err.to_string().starts_with("mkdir fail, "));
        assert_eq!(
            error_status(&err, StatusMode::Strict),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(!tmp.path().join("a.txt").exists());
        assert!(!tmp.path().join("blocker").join("sub").exists());
    }

    #[tokio::test]
    async fn test_partial_failure_reports_last_error_and_keeps_successes() {
        let (tmp, storage, config) = setup();
        let body = multipart_body(&[
            Part::File("file", "good1.txt", b"1"),
            Part::File("file", "..", b"bad"),
            Part::File("file", "good2.txt", b"2"),
        ]);

        let err = process_upload(upload_request(body), &storage, &config)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploadError::Partial {
                uploaded: 2,
                failed: 1,
                ..
            }
        ));
        assert!(err.to_string().starts_with("upload failed, last err: "));
        assert!(tmp.path().join("good1.txt").is_file());
        assert!(tmp.path().join("good2.txt").is_file());
    }

    #[tokio::test]
    async fn test_filename_reduced_to_base_name() {
        let (tmp, storage, config) = setup();
        let body = multipart_body(&[Part::File("file", "../../evil.sh", b"echo")]);

        process_upload(upload_request(body), &storage, &config)
            .await
            .unwrap();
        assert!(tmp.path().join("evil.sh").is_file());
    }

    #[tokio::test]
    async fn test_first_field_only_by_default() {
        let (tmp, storage, config) = setup();
        let body = multipart_body(&[
            Part::File("first", "a.txt", b"a"),
            Part::File("second", "b.txt", b"b"),
        ]);

        let report = process_upload(upload_request(body), &storage, &config)
            .await
            .unwrap();
        assert_eq!(report.fields.len(), 1);
        assert!(tmp.path().join("a.txt").is_file());
        assert!(!tmp.path().join("b.txt").exists());
    }

    #[tokio::test]
    async fn test_all_fields_policy() {
        let (tmp, storage, mut config) = setup();
        config.field_policy = FieldPolicy::All;
        let body = multipart_body(&[
            Part::File("first", "a.txt", b"a"),
            Part::File("second", "b.txt", b"b"),
            Part::File("second", "c.txt", b"c"),
        ]);

        let report = process_upload(upload_request(body), &storage, &config)
            .await
            .unwrap();
        assert_eq!(report.message(), "successful, 3 files uploaded");
        assert_eq!(
            report.fields,
            vec![
                FieldReport {
                    name: "first".to_string(),
                    uploaded: 1
                },
                FieldReport {
                    name: "second".to_string(),
                    uploaded: 2
                },
            ]
        );
        assert_eq!(count_files(tmp.path()), 3);
    }

    #[tokio::test]
    async fn test_empty_field_name() {
        let (_tmp, storage, config) = setup();
        let body = multipart_body(&[Part::File("", "a.txt", b"a")]);

        let err = process_upload(upload_request(body), &storage, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::EmptyFieldName));
    }

    #[test]
    fn test_stored_line_reports_size_and_request_length() {
        let attachment = FileAttachment {
            filename: "a.png".to_string(),
            content_type: None,
            data: Bytes::from(vec![0u8; 2048]),
        };
        let path = std::path::Path::new("/srv/files/a.png");

        let line = stored_line(&attachment, Some(4096), path);
        assert_eq!(
            line,
            "successful uploaded, file=a.png, size: 2.00 KB, content-length=4096, path=/srv/files/a.png"
        );
        assert!(stored_line(&attachment, None, path).contains("content-length=-"));
    }

    #[test]
    fn test_status_modes() {
        let err = UploadError::NoFile;
        assert_eq!(error_status(&err, StatusMode::Compat), StatusCode::OK);
        assert_eq!(error_status(&err, StatusMode::Strict), StatusCode::BAD_REQUEST);
        assert_eq!(
            error_status(&UploadError::InvalidContentType, StatusMode::Strict),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        let partial = UploadError::Partial {
            uploaded: 0,
            failed: 1,
            last: StorageError::InvalidFileName(String::new()),
        };
        assert_eq!(
            error_status(&partial, StatusMode::Strict),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
