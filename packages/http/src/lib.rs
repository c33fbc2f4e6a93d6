//! # httpfs-http
//!
//! Client for the httpfs v1 protocol.
//!
//! A backend exposes a file tree over plain HTTP using two verbs:
//!
//! - `HEAD /path` answers metadata through headers (`Content-Length`,
//!   `Last-Modified`, `Content-Disposition`, `Content-Permissions`, and a
//!   `Content-Type` of [`DIRECTORY_CONTENT_TYPE`] for directories)
//! - `GET /path` returns raw file bytes, or `{"dir": [names...]}` for a
//!   directory
//!
//! A 404 on either verb means the path does not exist.
//!
//! ## Example
//!
//! ```ignore
//! use httpfs_http::{HttpFs, RemoteFs};
//!
//! let fs = HttpFs::for_port(8080)?;
//!
//! let entry = fs.stat("hello")?;
//! let content = fs.read("hello")?.into_bytes()?;
//! assert_eq!(content.len() as u64, entry.size);
//! ```

pub mod cache;
pub mod entry;
pub mod error;
pub mod executor;
pub mod path;
pub mod types;

mod client;

/// Content-Type marking a HEAD or GET response as a directory.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/vnd.httpfs.v1+json";

// Re-export main types
pub use cache::StatCache;
pub use client::{HttpFs, RemoteFs};
pub use entry::{DirEntry, EntryKind, Listing, RemoteEntry};
pub use error::Error;
pub use executor::{HttpExecutor, ReqwestExecutor};
pub use types::{Body, HttpRequest, HttpResponse, Method};
