//! Remote metadata records and their header decoding.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::path;
use crate::types::HttpResponse;
use crate::DIRECTORY_CONTENT_TYPE;

/// Mode bits for a file when the backend sends no permissions.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Mode bits for a directory when the backend sends no permissions.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Whether an entry is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

/// The directory-entry view of a [`RemoteEntry`]: what a listing needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Metadata for one remote path, as produced by `stat`.
///
/// The same record serves as the metadata view (size, mode, times) and,
/// through [`RemoteEntry::dir_entry`], as the directory-entry view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub size: u64,
    /// Permission bits only; the kind lives in `is_dir`.
    pub mode: u32,
    /// Modification time, seconds since the Unix epoch.
    pub mtime: i64,
    pub is_dir: bool,
}

impl RemoteEntry {
    /// Decode a HEAD response for `path` (normalized).
    ///
    /// Each header is applied independently and only when it parses; anything
    /// else keeps the defaults: a 0644 file named after the last path
    /// component with `default_mtime` as its modification time.
    pub fn from_headers(path: &str, response: &HttpResponse, default_mtime: i64) -> Self {
        let mut entry = RemoteEntry {
            name: path::base_name(path).to_string(),
            size: 0,
            mode: DEFAULT_FILE_MODE,
            mtime: default_mtime,
            is_dir: false,
        };

        if let Some(name) = response
            .header("Content-Disposition")
            .and_then(disposition_filename)
        {
            entry.name = name;
        }

        if let Some(size) = response
            .header("Content-Length")
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            entry.size = size;
        }

        if let Some(mtime) = response.header("Last-Modified").and_then(parse_http_date) {
            entry.mtime = mtime;
        }

        if response
            .header("Content-Type")
            .is_some_and(is_directory_content_type)
        {
            entry.is_dir = true;
            entry.mode = DEFAULT_DIR_MODE;
        }

        if let Some(mode) = response
            .header("Content-Permissions")
            .and_then(|v| u32::from_str_radix(v.trim(), 8).ok())
        {
            entry.mode = mode;
        }

        entry
    }

    pub fn kind(&self) -> EntryKind {
        if self.is_dir {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }

    pub fn dir_entry(&self) -> DirEntry {
        DirEntry {
            name: self.name.clone(),
            kind: self.kind(),
        }
    }

    /// Modification time as a `SystemTime`; pre-epoch times clamp to the epoch.
    pub fn modified(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.mtime.max(0) as u64)
    }
}

/// Body of a directory response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    #[serde(default)]
    pub dir: Vec<String>,
}

/// Compare the media type of a Content-Type header against the directory marker.
fn is_directory_content_type(value: &str) -> bool {
    let essence = value.split(';').next().unwrap_or("").trim();
    essence.eq_ignore_ascii_case(DIRECTORY_CONTENT_TYPE)
}

/// Extract the `filename` parameter from a Content-Disposition value.
fn disposition_filename(value: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|param| {
        let (key, raw) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let raw = raw.trim();
        let name = raw
            .strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .unwrap_or(raw);
        Some(name.replace("\\\"", "\""))
    })
}

/// Parse an RFC 1123 date (`Mon, 02 Jan 2006 15:04:05 GMT`) to Unix seconds.
fn parse_http_date(value: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|t| t.timestamp())
}
