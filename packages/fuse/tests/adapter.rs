use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use httpfs_fuse::{fake_ino, Owner, RemoteTree, ROOT_INO};
use httpfs_http::{HttpFs, DIRECTORY_CONTENT_TYPE};

async fn hello_backend() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", DIRECTORY_CONTENT_TYPE))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", DIRECTORY_CONTENT_TYPE)
                .set_body_string(r#"{"dir":["hello"]}"#),
        )
        .mount(&server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/hello"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/hello"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Hello world!\n"))
        .mount(&server)
        .await;

    server
}

fn adapter_for(uri: &str) -> RemoteTree {
    let fs = HttpFs::new(uri).unwrap();
    RemoteTree::new(Arc::new(fs), Owner::current())
}

#[tokio::test]
async fn test_read_hello_through_adapter() {
    let server = hello_backend().await;
    let uri = server.uri();

    let (whole, prefix, past_end) = tokio::task::spawn_blocking(move || {
        let adapter = adapter_for(&uri);
        let hello = adapter.lookup_child(ROOT_INO, "hello").unwrap();
        let fh = adapter.open_file(hello.ino, libc::O_RDONLY).unwrap();

        let whole = adapter.read_file(fh, 0, 4096).unwrap();
        let prefix = adapter.read_file(fh, 0, 5).unwrap();
        let past_end = adapter.read_file(fh, 64, 4096).unwrap();
        adapter.release_file(fh);
        (whole, prefix, past_end)
    })
    .await
    .unwrap();

    assert_eq!(whole, b"Hello world!\n");
    assert_eq!(prefix, b"Hello");
    assert!(past_end.is_empty());
}

#[tokio::test]
async fn test_readdir_and_lookup_agree() {
    let server = hello_backend().await;
    let uri = server.uri();

    let (listing, looked_up) = tokio::task::spawn_blocking(move || {
        let adapter = adapter_for(&uri);
        let fh = adapter.open_directory(ROOT_INO).unwrap();
        let listing = adapter.directory_entries(fh).unwrap().to_vec();
        adapter.release_directory(fh);
        let looked_up = adapter.lookup_child(ROOT_INO, "hello").unwrap();
        (listing, looked_up)
    })
    .await
    .unwrap();

    let names: Vec<&str> = listing.iter().map(|(_, _, name)| name.as_str()).collect();
    assert_eq!(names, vec![".", "..", "hello"]);
    assert_eq!(listing[2].0, looked_up.ino);
    assert_eq!(looked_up.ino, fake_ino("hello"));
}

#[tokio::test]
async fn test_missing_entry_is_enoent() {
    let server = hello_backend().await;
    let uri = server.uri();

    let code = tokio::task::spawn_blocking(move || {
        let adapter = adapter_for(&uri);
        adapter.lookup_child(ROOT_INO, "missing").unwrap_err()
    })
    .await
    .unwrap();

    assert_eq!(code, libc::ENOENT);
}

#[tokio::test]
async fn test_backend_failure_is_eio() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let uri = server.uri();
    let code = tokio::task::spawn_blocking(move || {
        let adapter = adapter_for(&uri);
        adapter.attributes(ROOT_INO).unwrap_err()
    })
    .await
    .unwrap();

    assert_eq!(code, libc::EIO);
}
