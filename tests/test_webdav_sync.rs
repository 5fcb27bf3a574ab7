use mockito::{Matcher, Server};
use paperref::session::LibrarySession;
use paperref::settings::WebDavConfig;
use paperref::sync::{RemoteStore, WebDavStore};
use paperref::{Entry, LibraryError};

const AUTH: &str = "Basic dXNlcjpwYXNz";

const REMOTE_BIB: &str = "@article{Smith20,\n  author = {Smith, John},\n  title = {Deep Learning},\n  year = {2020}\n}\n";

fn store_for(server: &Server) -> WebDavStore {
    let config = WebDavConfig {
        url: format!("{}/dav/", server.url()),
        username: "user".to_string(),
        app_password: "pass".to_string(),
        filename: "lib.bib".to_string(),
        timeout_secs: Some(5),
    };
    WebDavStore::new(&config).unwrap()
}

#[test]
fn test_fetch_sends_basic_auth() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/dav/lib.bib")
        .match_header("authorization", AUTH)
        .with_status(200)
        .with_body(REMOTE_BIB)
        .expect(1)
        .create();

    let store = store_for(&server);
    let bytes = store.fetch().unwrap();

    assert_eq!(bytes, REMOTE_BIB.as_bytes());
    mock.assert();
}

#[test]
fn test_missing_file_maps_to_not_found() {
    let mut server = Server::new();
    let _get = server.mock("GET", "/dav/lib.bib").with_status(404).create();
    let _head = server.mock("HEAD", "/dav/lib.bib").with_status(404).create();

    let store = store_for(&server);
    assert!(matches!(store.fetch(), Err(LibraryError::RemoteNotFound(_))));
    assert!(!store.exists().unwrap());
}

#[test]
fn test_auth_failure_maps_to_unavailable() {
    let mut server = Server::new();
    let _mock = server.mock("GET", "/dav/lib.bib").with_status(401).create();

    let store = store_for(&server);
    match store.fetch() {
        Err(LibraryError::RemoteUnavailable(message)) => {
            assert!(message.contains("authentication"))
        }
        other => panic!("expected RemoteUnavailable, got {other:?}"),
    }
}

#[test]
fn test_server_error_maps_to_unavailable() {
    let mut server = Server::new();
    let _mock = server.mock("GET", "/dav/lib.bib").with_status(503).create();

    let store = store_for(&server);
    assert!(matches!(
        store.fetch(),
        Err(LibraryError::RemoteUnavailable(_))
    ));
}

#[test]
fn test_unreachable_server_maps_to_unavailable() {
    let config = WebDavConfig {
        url: "http://127.0.0.1:9/dav".to_string(),
        username: "user".to_string(),
        app_password: "pass".to_string(),
        filename: "lib.bib".to_string(),
        timeout_secs: Some(2),
    };
    let store = WebDavStore::new(&config).unwrap();
    assert!(matches!(
        store.fetch(),
        Err(LibraryError::RemoteUnavailable(_))
    ));
}

#[test]
fn test_put_uses_bibtex_content_type() {
    let mut server = Server::new();
    let mock = server
        .mock("PUT", "/dav/lib.bib")
        .match_header("authorization", AUTH)
        .match_header("content-type", "application/x-bibtex")
        .match_body(Matcher::Regex("@article\\{k1,".to_string()))
        .with_status(201)
        .expect(1)
        .create();

    let store = store_for(&server);
    store
        .store(b"@article{k1,\n  title = {One}\n}\n")
        .unwrap();
    mock.assert();
}

#[test]
fn test_session_pull_404_keeps_store() {
    let mut server = Server::new();
    let _mock = server.mock("GET", "/dav/lib.bib").with_status(404).create();

    let mut session = LibrarySession::default();
    session
        .import_entries(
            vec![Entry::new("a", "misc").with_field("title", "Local")],
            "local.bib",
        )
        .unwrap();
    let before = session.store().clone();

    let store = store_for(&server);
    assert!(matches!(
        session.import_from_remote(&store),
        Err(LibraryError::RemoteNotFound(_))
    ));
    assert_eq!(session.store(), &before);
}

#[test]
fn test_session_pull_then_push_roundtrip() {
    let mut server = Server::new();
    let _get = server
        .mock("GET", "/dav/lib.bib")
        .with_status(200)
        .with_body(REMOTE_BIB)
        .create();
    let put = server
        .mock("PUT", "/dav/lib.bib")
        .match_body(Matcher::Regex("journal = \\{Nature\\}".to_string()))
        .with_status(204)
        .expect(1)
        .create();

    let mut session = LibrarySession::default();
    session
        .import_entries(
            vec![Entry::new("Smith20b", "article")
                .with_field("title", "Deep Learning")
                .with_field("year", "2020")
                .with_field("journal", "Nature")],
            "local.bib",
        )
        .unwrap();

    let store = store_for(&server);
    let report = session.import_from_remote(&store).unwrap();
    assert!(report.conflicts.is_empty());
    assert_eq!(session.store().len(), 1);

    // Remote unchanged since the pull
    assert!(!session.remote_changed(&store).unwrap());

    session.push(&store).unwrap();
    put.assert();
}
