//! Multipart form parsing
//!
//! Buffers a whole `multipart/form-data` body into text values and file
//! attachments, grouped by field name in order of first appearance.

use http_body_util::BodyExt;
use hyper::body::{Body, Bytes};
use multer::{Constraints, Multipart, SizeLimit};

/// One uploaded file within a named field
#[derive(Debug, Clone)]
pub struct FileAttachment {
    /// Name as sent by the client, before sanitizing
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FileAttachment {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// All attachments sent under one field name
#[derive(Debug, Clone)]
pub struct FileField {
    pub name: String,
    pub attachments: Vec<FileAttachment>,
}

/// Parsed multipart body
#[derive(Debug, Default)]
pub struct MultipartForm {
    values: Vec<(String, Vec<String>)>,
    files: Vec<FileField>,
}

impl MultipartForm {
    /// Names of the text fields, in body order
    pub fn value_names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    /// First value of a text field, if it has any
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }

    pub fn files(&self) -> &[FileField] {
        &self.files
    }

    pub fn push_value(&mut self, name: &str, value: String) {
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some((_, values)) => values.push(value),
            None => self.values.push((name.to_string(), vec![value])),
        }
    }

    pub fn push_file(&mut self, name: &str, attachment: FileAttachment) {
        match self.files.iter_mut().find(|f| f.name == name) {
            Some(field) => field.attachments.push(attachment),
            None => self.files.push(FileField {
                name: name.to_string(),
                attachments: vec![attachment],
            }),
        }
    }
}

/// Parse a request body as `multipart/form-data`
///
/// `content_type` must carry the boundary parameter. The whole body is
/// capped at `max_size` bytes. Parts with a non-empty filename become
/// attachments, every other part a text value.
pub async fn parse<B>(body: B, content_type: &str, max_size: u64) -> Result<MultipartForm, multer::Error>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let boundary = multer::parse_boundary(content_type)?;
    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(max_size));
    let mut multipart = Multipart::with_constraints(body.into_data_stream(), boundary, constraints);

    let mut form = MultipartForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field
            .file_name()
            .filter(|f| !f.is_empty())
            .map(ToString::to_string);

        match filename {
            Some(filename) => {
                let content_type = field.content_type().map(ToString::to_string);
                let data = field.bytes().await?;
                form.push_file(
                    &name,
                    FileAttachment {
                        filename,
                        content_type,
                        data,
                    },
                );
            }
            None => {
                let value = field.text().await?;
                form.push_value(&name, value);
            }
        }
    }

    Ok(form)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use http_body_util::Full;

    pub const BOUNDARY: &str = "X-TEST-BOUNDARY";

    /// A part of a hand-built multipart body
    pub enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, filename, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    #[tokio::test]
    async fn test_parse_groups_fields_in_order() {
        let body = multipart_body(&[
            Part::File("file", "b.txt", b"bbb"),
            Part::Text("subdir", "zhao"),
            Part::File("other", "c.txt", b"c"),
            Part::File("file", "a.txt", b"aa"),
            Part::Text("subdir", "ignored"),
        ]);

        let form = parse(Full::new(Bytes::from(body)), &content_type(), 1024)
            .await
            .unwrap();

        assert_eq!(form.value_names().collect::<Vec<_>>(), vec!["subdir"]);
        assert_eq!(form.first_value("subdir"), Some("zhao"));
        assert_eq!(form.first_value("missing"), None);

        let files = form.files();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "file");
        let names: Vec<_> = files[0].attachments.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
        assert_eq!(files[0].attachments[1].size(), 2);
        assert_eq!(
            files[0].attachments[0].content_type.as_deref(),
            Some("application/octet-stream")
        );
        assert_eq!(files[1].name, "other");
    }

    #[tokio::test]
    async fn test_empty_filename_is_a_value() {
        let body = multipart_body(&[Part::File("file", "", b"not a file")]);
        let form = parse(Full::new(Bytes::from(body)), &content_type(), 1024)
            .await
            .unwrap();
        assert!(form.files().is_empty());
        assert_eq!(form.first_value("file"), Some("not a file"));
    }

    #[tokio::test]
    async fn test_missing_boundary() {
        let result = parse(Full::new(Bytes::new()), "multipart/form-data", 1024).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_body_over_ceiling() {
        let data = vec![b'x'; 4096];
        let body = multipart_body(&[Part::File("file", "big.bin", &data)]);
        let err = parse(Full::new(Bytes::from(body)), &content_type(), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, multer::Error::StreamSizeExceeded { .. }));
    }
}
