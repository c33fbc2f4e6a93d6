//! # httpfs-fuse
//!
//! Exposes an httpfs backend to the kernel as a read-only FUSE filesystem.
//!
//! [`RemoteTree`] answers lookup, getattr, readdir, open, read and release
//! by calling a [`RemoteFs`](httpfs_http::RemoteFs). [`HttpFsAdapter`]
//! plugs it into fuser and runs backend calls on a [`WorkerPool`];
//! [`FuseMount`] attaches it to a directory and detaches it again.
//!
//! Inode numbers are synthetic (see [`identity`]): the root is the kernel
//! root inode and every other path gets the FNV-1a hash of its normalized
//! form, so `readdir` and `lookup` agree without a shared table.

pub mod adapter;
pub mod errno;
pub mod identity;
pub mod mount;
pub mod worker;

pub use adapter::{HttpFsAdapter, ListingEntry, Owner, RemoteTree};
pub use errno::errno;
pub use identity::{fake_ino, inode_for, ROOT_INO};
pub use mount::{FuseMount, MountError, Mounter, FS_NAME};
pub use worker::{WorkerPool, DEFAULT_WORKERS};
