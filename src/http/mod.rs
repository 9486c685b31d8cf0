//! HTTP protocol layer module
//!
//! MIME lookup and response builders shared by the upload and download handlers.

pub mod mime;
pub mod response;

// Re-export commonly used types
pub use mime::ContentTypePolicy;
pub use response::{
    build_404_response, build_405_response, build_attachment_response, build_empty_response,
    build_health_response, build_options_response, build_text_response,
};
