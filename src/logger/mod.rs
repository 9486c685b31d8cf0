//! Logger module
//!
//! Provides logging utilities for the file server including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Leveled info/warning/error lines for the upload and download paths
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;
pub use writer::Level;

use crate::config::{Config, LoggingConfig};
use std::net::SocketAddr;

/// Initialize the logger with configuration
///
/// Should be called once at application startup. Until then every line goes
/// to stdout/stderr unfiltered.
pub fn init(config: &LoggingConfig) -> std::io::Result<()> {
    writer::init(
        &config.level,
        config.access_log_file.as_deref(),
        config.error_log_file.as_deref(),
    )
}

fn write(level: Level, message: &str) {
    match writer::get() {
        Some(w) => w.write(level, message),
        None if level >= Level::Warn => eprintln!("{message}"),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write(Level::Info, "======================================");
    write(Level::Info, "File server started successfully");
    write(Level::Info, &format!("Listening on: http://{addr}"));
    write(Level::Info, &format!("Storage root: {}", config.storage.root));
    write(
        Level::Info,
        &format!(
            "Upload route: POST {} (limit {} bytes, {} files per field)",
            config.routes.upload_path, config.upload.max_size, config.upload.max_files_per_field
        ),
    );
    write(Level::Info, &format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write(Level::Info, &format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write(Level::Info, &format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write(Level::Info, &format!("Error log: {path}"));
    }
    write(Level::Info, "======================================\n");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write(Level::Debug, &format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write(Level::Error, &format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_debug(message: &str) {
    write(Level::Debug, &format!("[D] {message}"));
}

pub fn log_info(message: &str) {
    write(Level::Info, &format!("[I] {message}"));
}

pub fn log_warning(message: &str) {
    write(Level::Warn, &format!("[W] {message}"));
}

pub fn log_error(message: &str) {
    write(Level::Error, &format!("[E] {message}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    let line = entry.format(format);
    match writer::get() {
        Some(w) => w.write_access(&line),
        None => println!("{line}"),
    }
}

pub fn log_shutdown_requested(active: usize) {
    write(
        Level::Info,
        &format!("[Shutdown] Stopped accepting, waiting for {active} active connection(s)"),
    );
}

pub fn log_shutdown_complete(remaining: usize) {
    if remaining == 0 {
        write(Level::Info, "[Shutdown] All connections closed, bye");
    } else {
        write(
            Level::Warn,
            &format!("[Shutdown] Drain timed out with {remaining} connection(s) still open"),
        );
    }
}
