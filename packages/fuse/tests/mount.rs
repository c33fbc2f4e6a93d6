//! Tests against a real kernel mount. Skipped where FUSE is unavailable.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use httpfs_fuse::{FuseMount, Mounter};
use httpfs_http::{HttpFs, DIRECTORY_CONTENT_TYPE};

const SLOW: Duration = Duration::from_secs(3);

async fn slow_and_fast_backend() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", DIRECTORY_CONTENT_TYPE))
        .mount(&server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(SLOW))
        .mount(&server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    server
}

fn fuse_available() -> bool {
    Path::new("/dev/fuse").exists()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_lookup_does_not_block_sibling() {
    if !fuse_available() {
        eprintln!("skipping: /dev/fuse not present");
        return;
    }

    let server = slow_and_fast_backend().await;
    let uri = server.uri();

    let fast_took = tokio::task::spawn_blocking(move || {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("mnt");
        let mount = FuseMount::new(&target, Arc::new(HttpFs::new(&uri).unwrap()));
        mount.prepare().unwrap();
        if let Err(err) = mount.mount() {
            eprintln!("skipping: {err}");
            return None;
        }

        // Root attributes go through before the race starts.
        fs::metadata(&target).unwrap();

        let slow_path = target.join("slow");
        let slow = thread::spawn(move || fs::metadata(slow_path).is_ok());
        thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        let fast = fs::metadata(target.join("fast"));
        let fast_took = started.elapsed();

        assert!(fast.is_ok());
        assert!(slow.join().unwrap());
        mount.unmount().unwrap();
        assert!(!mount.is_mounted());
        Some(fast_took)
    })
    .await
    .unwrap();

    if let Some(fast_took) = fast_took {
        assert!(fast_took < SLOW / 2, "fast stat took {fast_took:?}");
    }
}
