//! Remote path normalization.
//!
//! Remote paths are `/`-separated and relative to the backend root. The
//! normalized form has no leading or trailing slash, no `.` or empty
//! components, and `..` resolved lexically; the root is the empty string.

/// Normalize a remote path. `""`, `"."` and `"/"` all name the root.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            c => parts.push(c),
        }
    }
    parts.join("/")
}

/// Join a child name onto a parent path and normalize the result.
pub fn join(parent: &str, name: &str) -> String {
    normalize(&format!("{}/{}", parent, name))
}

/// Last component of a normalized path; the root is `"."`.
pub fn base_name(path: &str) -> &str {
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => ".",
    }
}
