//! Request handler module
//!
//! Routing dispatch plus the upload and download handlers behind it.

pub mod download;
pub mod form;
pub mod router;
pub mod upload;

// Re-export main entry point
pub use router::handle_request;
