use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;
use url::Url;

use crate::cache::{StatCache, DEFAULT_STAT_TTL};
use crate::entry::{Listing, RemoteEntry};
use crate::error::Error;
use crate::executor::{HttpExecutor, ReqwestExecutor};
use crate::path;
use crate::types::{Body, HttpRequest, HttpResponse};

/// Read-only view of a remote file tree.
///
/// Paths are `/`-separated and relative to the tree root; `""`, `"."` and
/// `"/"` all name the root. Implementations must tolerate concurrent calls.
pub trait RemoteFs: Send + Sync {
    /// Metadata for `path`.
    fn stat(&self, path: &str) -> Result<RemoteEntry, Error>;

    /// Full content of `path` as a byte stream. No ranged reads.
    fn read(&self, path: &str) -> Result<Body, Error>;

    /// Metadata of every child of `path`, in listing order.
    fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, Error>;
}

/// Client for one httpfs v1 origin.
///
/// Maps filesystem queries onto the two protocol verbs:
/// - `stat(path)` performs a HEAD request, cached for one second
/// - `read(path)` performs a GET request and streams the body
/// - `list_dir(path)` performs a GET request, then `stat`s every child
///
/// # Example
///
/// ```ignore
/// use httpfs_http::{HttpFs, RemoteFs};
///
/// let fs = HttpFs::new("http://localhost:8080")?;
///
/// let root = fs.stat(".")?;
/// assert!(root.is_dir);
///
/// for entry in fs.list_dir("/")? {
///     println!("{} ({} bytes)", entry.name, entry.size);
/// }
/// ```
pub struct HttpFs<E = ReqwestExecutor> {
    executor: E,
    base_url: Url,
    cache: StatCache,
    /// Default modification time, seconds since the epoch.
    start_time: i64,
}

impl HttpFs<ReqwestExecutor> {
    /// Create a client for the given origin, e.g. `http://localhost:8080`.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let executor = ReqwestExecutor::new().map_err(|message| Error::Transport { message })?;
        Self::with_executor(executor, base_url)
    }

    /// Create a client for a backend listening on a local port.
    pub fn for_port(port: u16) -> Result<Self, Error> {
        Self::new(&format!("http://localhost:{}", port))
    }
}

impl<E: HttpExecutor> HttpFs<E> {
    /// Create a client with a custom executor.
    pub fn with_executor(executor: E, base_url: &str) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Invalid {
                message: format!("not a base URL: {}", base_url),
            });
        }

        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Ok(Self {
            executor,
            base_url,
            cache: StatCache::new(DEFAULT_STAT_TTL),
            start_time,
        })
    }

    /// Change how long `stat` results are reused.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = StatCache::new(ttl);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Modification time reported when the backend sends none.
    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    /// Number of cached metadata entries, fresh or stale.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop any cached metadata for `path`.
    pub fn invalidate(&self, path: &str) {
        self.cache.invalidate(&path::normalize(path));
    }

    /// Build the full URL for a normalized remote path.
    fn build_url(&self, path: &str) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Invalid {
                message: format!("not a base URL: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(path.split('/').filter(|c| !c.is_empty()));
        Ok(url)
    }

    /// Execute a request and turn every non-2xx status into an error.
    fn send(&self, request: HttpRequest, path: &str) -> Result<HttpResponse, Error> {
        debug!(method = %request.method, url = %request.url, "httpfs request");

        let response = self
            .executor
            .execute(&request)
            .map_err(|message| Error::Transport { message })?;

        if !response.is_success() {
            return Err(Error::from_status(
                response.status,
                &response.status_text,
                path,
            ));
        }

        Ok(response)
    }
}

impl<E: HttpExecutor> RemoteFs for HttpFs<E> {
    fn stat(&self, path: &str) -> Result<RemoteEntry, Error> {
        let path = path::normalize(path);

        if let Some(entry) = self.cache.get(&path) {
            return Ok(entry);
        }

        let url = self.build_url(&path)?;
        let response = self.send(HttpRequest::head(url.as_str()), &path)?;
        let entry = RemoteEntry::from_headers(&path, &response, self.start_time);

        self.cache.insert(&path, entry.clone());
        Ok(entry)
    }

    fn read(&self, path: &str) -> Result<Body, Error> {
        let path = path::normalize(path);
        let url = self.build_url(&path)?;
        let response = self.send(HttpRequest::get(url.as_str()), &path)?;
        Ok(response.body)
    }

    fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, Error> {
        let path = path::normalize(path);
        let url = self.build_url(&path)?;
        let response = self.send(HttpRequest::get(url.as_str()), &path)?;

        let bytes = response.body.into_bytes()?;
        let listing: Listing = serde_json::from_slice(&bytes)?;

        listing
            .dir
            .iter()
            .map(|child| self.stat(&path::join(&path, child)))
            .collect()
    }
}
