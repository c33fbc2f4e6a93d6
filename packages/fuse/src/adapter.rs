//! Kernel-facing filesystem over a [`RemoteFs`].

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, Request,
};
use libc::c_int;
use tracing::{debug, warn};

use httpfs_http::{path, EntryKind, Error, RemoteEntry, RemoteFs};

use crate::errno::errno;
use crate::identity::{inode_for, ROOT_INO};
use crate::worker::WorkerPool;

/// How long the kernel may reuse attributes and lookups.
const TTL: Duration = Duration::from_secs(1);

/// Lets the kernel run lookups and readdirs in one directory concurrently.
/// Not exported by fuser; value from the kernel's `fuse.h`.
const FUSE_PARALLEL_DIROPS: u32 = 1 << 18;

/// Capabilities requested at init on top of fuser's defaults.
const INIT_CAPABILITIES: u32 = FUSE_PARALLEL_DIROPS;

/// One directory entry as handed to the kernel: inode, type, name.
pub type ListingEntry = (u64, FileType, String);

/// User and group reported as owner of every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    /// The user running this process.
    pub fn current() -> Self {
        Self {
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
        }
    }
}

/// One mounted path. The path is fixed at creation and keys both the
/// metadata cache and the inode hash.
#[derive(Debug, Clone)]
struct Node {
    path: String,
}

/// An open file: the whole remote body, fetched at open time.
struct Handle {
    path: String,
    data: Vec<u8>,
}

/// The mounted tree: nodes, open files and open directories.
///
/// Nodes are created on first lookup and live for the whole mount. File
/// handles live from `open` to `release` and directory handles from
/// `opendir` to `releasedir`. Every table is lock-protected, so any number
/// of threads may call in at once.
pub struct RemoteTree {
    fs: Arc<dyn RemoteFs>,
    owner: Owner,
    nodes: RwLock<HashMap<u64, Node>>,
    handles: RwLock<HashMap<u64, Handle>>,
    dirs: RwLock<HashMap<u64, Arc<Vec<ListingEntry>>>>,
    next_handle: AtomicU64,
}

impl RemoteTree {
    pub fn new(fs: Arc<dyn RemoteFs>, owner: Owner) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_INO,
            Node {
                path: String::new(),
            },
        );

        Self {
            fs,
            owner,
            nodes: RwLock::new(nodes),
            handles: RwLock::new(HashMap::new()),
            dirs: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    fn node(&self, ino: u64) -> Result<Node, c_int> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ino)
            .cloned()
            .ok_or(libc::ENOENT)
    }

    /// Remote path of a known inode.
    pub fn node_path(&self, ino: u64) -> Option<String> {
        self.node(ino).ok().map(|node| node.path)
    }

    /// Number of files currently open.
    pub fn open_handles(&self) -> usize {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of directories currently open.
    pub fn open_directories(&self) -> usize {
        self.dirs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn allocate_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::SeqCst)
    }

    /// Convert remote metadata to kernel attributes.
    fn to_file_attr(&self, ino: u64, entry: &RemoteEntry) -> FileAttr {
        let kind = match entry.kind() {
            EntryKind::Directory => FileType::Directory,
            EntryKind::File => FileType::RegularFile,
        };
        let mtime = entry.modified();

        FileAttr {
            ino,
            size: entry.size,
            blocks: entry.size.div_ceil(512),
            atime: mtime,
            mtime,
            ctime: mtime,
            crtime: mtime,
            kind,
            perm: (entry.mode & 0o7777) as u16,
            nlink: if kind == FileType::Directory { 2 } else { 1 },
            uid: self.owner.uid,
            gid: self.owner.gid,
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }

    /// Attributes of a known node, fetched through the client cache.
    pub fn attributes(&self, ino: u64) -> Result<FileAttr, c_int> {
        let node = self.node(ino)?;
        let entry = self.fs.stat(&node.path).map_err(|e| errno(&e))?;
        Ok(self.to_file_attr(ino, &entry))
    }

    /// Resolve `name` under `parent`, registering the child node.
    pub fn lookup_child(&self, parent: u64, name: &str) -> Result<FileAttr, c_int> {
        let parent = self.node(parent)?;
        let child_path = path::join(&parent.path, name);
        let entry = self.fs.stat(&child_path).map_err(|e| errno(&e))?;

        let ino = inode_for(&child_path);
        self.nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(ino)
            .or_insert_with(|| Node { path: child_path });

        Ok(self.to_file_attr(ino, &entry))
    }

    /// Directory listing: `.`, `..`, then the remote children in order.
    pub fn read_directory(&self, ino: u64) -> Result<Vec<ListingEntry>, c_int> {
        let node = self.node(ino)?;
        let entries = self.fs.list_dir(&node.path).map_err(|e| errno(&e))?;

        let parent_ino = inode_for(&path::join(&node.path, ".."));
        let mut listing = Vec::with_capacity(entries.len() + 2);
        listing.push((ino, FileType::Directory, ".".to_string()));
        listing.push((parent_ino, FileType::Directory, "..".to_string()));

        for entry in entries {
            let dir_entry = entry.dir_entry();
            let kind = match dir_entry.kind {
                EntryKind::Directory => FileType::Directory,
                EntryKind::File => FileType::RegularFile,
            };
            let child_ino = inode_for(&path::join(&node.path, &dir_entry.name));
            listing.push((child_ino, kind, dir_entry.name));
        }

        Ok(listing)
    }

    /// Fetch the listing once and keep it for every `readdir` on the
    /// returned handle.
    pub fn open_directory(&self, ino: u64) -> Result<u64, c_int> {
        let listing = self.read_directory(ino)?;
        let fh = self.allocate_handle();
        debug!(ino, fh, entries = listing.len(), "opened directory");

        self.dirs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fh, Arc::new(listing));
        Ok(fh)
    }

    /// The listing captured by [`open_directory`](Self::open_directory).
    pub fn directory_entries(&self, fh: u64) -> Result<Arc<Vec<ListingEntry>>, c_int> {
        self.dirs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&fh)
            .cloned()
            .ok_or(libc::EBADF)
    }

    pub fn release_directory(&self, fh: u64) {
        self.dirs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&fh);
    }

    /// Fetch the node's content and register a handle for it.
    pub fn open_file(&self, ino: u64, flags: i32) -> Result<u64, c_int> {
        if flags & libc::O_ACCMODE != libc::O_RDONLY {
            return Err(libc::EROFS);
        }

        let node = self.node(ino)?;
        let entry = self.fs.stat(&node.path).map_err(|e| errno(&e))?;
        if entry.is_dir {
            return Err(libc::EISDIR);
        }

        let body = self.fs.read(&node.path).map_err(|e| errno(&e))?;
        let data = body
            .into_bytes()
            .map_err(|e| errno(&Error::from(e)))?;

        let fh = self.allocate_handle();
        debug!(path = %node.path, fh, bytes = data.len(), "opened");

        self.handles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                fh,
                Handle {
                    path: node.path,
                    data,
                },
            );

        Ok(fh)
    }

    /// Up to `size` bytes of an open file starting at `offset`.
    ///
    /// Reading at or past the end yields an empty buffer.
    pub fn read_file(&self, fh: u64, offset: i64, size: u32) -> Result<Vec<u8>, c_int> {
        if offset < 0 {
            return Err(libc::EINVAL);
        }

        let handles = self.handles.read().unwrap_or_else(PoisonError::into_inner);
        let handle = handles.get(&fh).ok_or(libc::EBADF)?;

        let len = handle.data.len() as u64;
        let start = (offset as u64).min(len);
        let end = start.saturating_add(size as u64).min(len);
        Ok(handle.data[start as usize..end as usize].to_vec())
    }

    /// Drop an open handle and its buffered content.
    pub fn release_file(&self, fh: u64) {
        let removed = self
            .handles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&fh);
        if let Some(handle) = removed {
            debug!(path = %handle.path, fh, "released");
        }
    }
}

/// Read-only FUSE filesystem backed by an httpfs client.
///
/// Requests that reach the backend (lookup, getattr, opendir, open) run on
/// a [`WorkerPool`] and answer the kernel from there, so one slow backend
/// call does not stall the session. Reads, readdir and the releases only
/// touch memory and are answered in place.
pub struct HttpFsAdapter {
    tree: Arc<RemoteTree>,
    pool: WorkerPool,
}

impl HttpFsAdapter {
    pub fn new(fs: Arc<dyn RemoteFs>, owner: Owner, workers: usize) -> io::Result<Self> {
        Ok(Self {
            tree: Arc::new(RemoteTree::new(fs, owner)),
            pool: WorkerPool::new(workers)?,
        })
    }

    pub fn tree(&self) -> &Arc<RemoteTree> {
        &self.tree
    }

    fn dispatch<F>(&self, request: F)
    where
        F: FnOnce(&RemoteTree) + Send + 'static,
    {
        let tree = Arc::clone(&self.tree);
        self.pool.execute(move || request(&tree));
    }
}

impl Filesystem for HttpFsAdapter {
    fn init(&mut self, _req: &Request<'_>, config: &mut KernelConfig) -> Result<(), c_int> {
        // Without this the kernel serializes lookups per directory, and a
        // slow backend stat still blocks its siblings.
        if let Err(unsupported) = config.add_capabilities(INIT_CAPABILITIES) {
            warn!(unsupported, "kernel does not offer parallel directory operations");
        }
        Ok(())
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str().map(str::to_owned) else {
            reply.error(libc::ENOENT);
            return;
        };

        self.dispatch(move |tree| match tree.lookup_child(parent, &name) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(code) => reply.error(code),
        });
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        self.dispatch(move |tree| match tree.attributes(ino) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(code) => reply.error(code),
        });
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        self.dispatch(move |tree| match tree.open_directory(ino) {
            Ok(fh) => reply.opened(fh, 0),
            Err(code) => reply.error(code),
        });
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let listing = match self.tree.directory_entries(fh) {
            Ok(listing) => listing,
            Err(code) => {
                reply.error(code);
                return;
            }
        };

        for (i, (entry_ino, kind, name)) in listing
            .iter()
            .enumerate()
            .skip(offset.max(0) as usize)
        {
            if reply.add(*entry_ino, (i + 1) as i64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        self.tree.release_directory(fh);
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        self.dispatch(move |tree| match tree.open_file(ino, flags) {
            Ok(fh) => reply.opened(fh, fuser::consts::FOPEN_DIRECT_IO),
            Err(code) => reply.error(code),
        });
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.tree.read_file(fh, offset, size) {
            Ok(data) => reply.data(&data),
            Err(code) => reply.error(code),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.tree.release_file(fh);
        reply.ok();
    }
}
