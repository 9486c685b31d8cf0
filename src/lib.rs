//! A small HTTP file server: multipart uploads under `/file/upload` and
//! attachment downloads for every other path, both confined to one storage
//! root.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod storage;
