use std::sync::{Mutex, Once};
use std::time::Duration;

use bagger_engine::{download_documents, EngineError, HttpClient, NetSettings, Reporter};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(bagger_logging::initialize_for_tests);
}

#[derive(Default)]
struct CollectingReporter {
    alerts: Mutex<Vec<String>>,
}

impl Reporter for CollectingReporter {
    fn inform(&self, _text: &str) {}
    fn warn(&self, _text: &str) {}
    fn alert(&self, text: &str) {
        self.alerts.lock().unwrap().push(text.to_string());
    }
}

fn fast_client() -> HttpClient {
    HttpClient::new(NetSettings {
        round_pause: Duration::from_millis(5),
        rate_limit_pause: Duration::from_millis(5),
        accepted_pause: Duration::from_millis(1),
        ..NetSettings::default()
    })
    .unwrap()
}

async fn mock_document(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn documents_stream_to_files_named_by_url_basename() {
    init_logging();
    let server = MockServer::start().await;
    mock_document(&server, "/10/1/paper.pdf", "pdf bytes").await;
    mock_document(&server, "/10/2/data.csv", "a,b,c").await;

    let out = TempDir::new().unwrap();
    let urls = vec![
        format!("{}/10/1/paper.pdf", server.uri()),
        format!("{}/10/2/data.csv", server.uri()),
    ];
    let reporter = CollectingReporter::default();
    let written = download_documents(&fast_client(), &urls, out.path(), false, &reporter)
        .await
        .unwrap();

    assert_eq!(written.len(), 2);
    assert_eq!(
        std::fs::read_to_string(out.path().join("paper.pdf")).unwrap(),
        "pdf bytes"
    );
    assert_eq!(
        std::fs::read_to_string(out.path().join("data.csv")).unwrap(),
        "a,b,c"
    );
}

#[tokio::test]
async fn missing_document_is_skipped_while_siblings_download() {
    init_logging();
    let server = MockServer::start().await;
    mock_document(&server, "/10/1/paper.pdf", "pdf bytes").await;
    Mock::given(method("GET"))
        .and(path("/10/2/lost.dat"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mock_document(&server, "/10/3/notes.txt", "notes").await;

    let out = TempDir::new().unwrap();
    let urls = vec![
        format!("{}/10/1/paper.pdf", server.uri()),
        format!("{}/10/2/lost.dat", server.uri()),
        format!("{}/10/3/notes.txt", server.uri()),
    ];
    let reporter = CollectingReporter::default();
    let written = download_documents(&fast_client(), &urls, out.path(), true, &reporter)
        .await
        .unwrap();

    assert_eq!(written.len(), 2);
    assert!(out.path().join("paper.pdf").is_file());
    assert!(!out.path().join("lost.dat").exists());
    assert!(out.path().join("notes.txt").is_file());
    assert_eq!(reporter.alerts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_document_aborts_the_run_without_missing_ok() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/10/2/lost.dat"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let out = TempDir::new().unwrap();
    let urls = vec![format!("{}/10/2/lost.dat", server.uri())];
    let reporter = CollectingReporter::default();
    let err = download_documents(&fast_client(), &urls, out.path(), false, &reporter)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Net(_)));
}

#[tokio::test]
async fn not_ready_documents_are_retried_after_a_pause() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/10/1/slow.bin"))
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mock_document(&server, "/10/1/slow.bin", "eventually").await;

    let out = TempDir::new().unwrap();
    let urls = vec![format!("{}/10/1/slow.bin", server.uri())];
    let reporter = CollectingReporter::default();
    download_documents(&fast_client(), &urls, out.path(), false, &reporter)
        .await
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(out.path().join("slow.bin")).unwrap(),
        "eventually"
    );
}
