//! Synthetic inode numbers.
//!
//! The backend has no notion of inodes, so every path gets the FNV-1a 64-bit
//! hash of its normalized form. The same path always maps to the same number
//! within a run; distinct paths collide only with negligible probability.

use std::hash::Hasher;

use fnv::FnvHasher;

/// Inode the kernel uses for the mount root.
pub const ROOT_INO: u64 = fuser::FUSE_ROOT_ID;

/// FNV-1a 64-bit hash of `path`.
pub fn fake_ino(path: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(path.as_bytes());
    hasher.finish()
}

/// Inode for a normalized remote path; the root path maps to [`ROOT_INO`].
pub fn inode_for(path: &str) -> u64 {
    if path.is_empty() {
        ROOT_INO
    } else {
        fake_ino(path)
    }
}
