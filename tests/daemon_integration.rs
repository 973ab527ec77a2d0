use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use textsim::config::Config;
use textsim::corpus::NewEntry;
use textsim::daemon::{Daemon, ErrorKind, IpcClient, IpcMessage};
use textsim::service::{
    CorpusStatistics, ExtendCorpusResponse, InitializeSearchResponse, ServiceStatus,
    SimilaritySearchResponse,
};
use textsim::TextsimError;
use tokio::sync::oneshot;
use tokio::time::sleep;

async fn wait_for_socket(path: &Path) {
    for _ in 0..100 {
        if path.exists() {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("daemon socket never appeared at {:?}", path);
}

fn test_config(base: &Path) -> Config {
    let mut config = Config::default();
    config.daemon.socket_path = base.join("textsim.sock");
    config.daemon.max_connections = 4;
    config
}

#[tokio::test]
async fn test_daemon_search_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let socket_path = config.daemon.socket_path.clone();

    let daemon = Daemon::new(config).unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let daemon_handle = tokio::spawn(async move {
        daemon
            .run_until(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    wait_for_socket(&socket_path).await;
    let client = IpcClient::new(socket_path.clone());

    // Initialize on an empty corpus is valid
    let init: InitializeSearchResponse = client
        .send(&IpcMessage::Initialize)
        .await
        .unwrap()
        .into_payload()
        .unwrap();
    assert_eq!(init.texts_loaded, 0);

    let extended: ExtendCorpusResponse = client
        .send(&IpcMessage::Extend {
            entries: vec![
                NewEntry::new("Nunca te rindas", "motivacional"),
                NewEntry::new("El amor todo lo puede", "amor"),
                NewEntry::new("Ríe y sonríe", "humor"),
                NewEntry::uncategorized("Sigue adelante sin rendirte"),
            ],
        })
        .await
        .unwrap()
        .into_payload()
        .unwrap();
    assert_eq!(extended.appended, 4);
    assert_eq!(extended.total, 4);

    let status: ServiceStatus = client
        .send(&IpcMessage::Status)
        .await
        .unwrap()
        .into_payload()
        .unwrap();
    assert!(status.stale);
    assert_eq!(status.indexed, 0);

    let response: SimilaritySearchResponse = client
        .send(&IpcMessage::Search {
            query: "rendirte".to_string(),
            top_n: Some(2),
        })
        .await
        .unwrap()
        .into_payload()
        .unwrap();
    assert_eq!(response.query, "rendirte");
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].text, "Sigue adelante sin rendirte");
    assert_eq!(response.results[0].category, "sin_categoria");
    assert_eq!(response.results[1].text, "Nunca te rindas");

    let stats: CorpusStatistics = client
        .send(&IpcMessage::Stats)
        .await
        .unwrap()
        .into_payload()
        .unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.per_category.get("motivacional"), Some(&1));
    assert_eq!(stats.per_category.get("sin_categoria"), Some(&1));

    // Bad input is reported, not fatal
    let rejected = client
        .send(&IpcMessage::Search {
            query: "amor".to_string(),
            top_n: Some(0),
        })
        .await
        .unwrap();
    assert!(!rejected.success);
    assert_eq!(rejected.error_kind, Some(ErrorKind::InvalidArgument));

    let still_up = client.send(&IpcMessage::Status).await.unwrap();
    assert!(still_up.success);

    shutdown_tx.send(()).unwrap();
    daemon_handle.await.unwrap().unwrap();
    assert!(!socket_path.exists());
}

#[tokio::test]
async fn test_stop_message_shuts_down() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let socket_path = config.daemon.socket_path.clone();

    let daemon = Daemon::new(config).unwrap();
    let daemon_handle = tokio::spawn(async move {
        daemon.run_until(std::future::pending::<()>()).await
    });

    wait_for_socket(&socket_path).await;
    let client = IpcClient::new(socket_path.clone());

    let response = client.send(&IpcMessage::Stop).await.unwrap();
    assert!(response.success);

    tokio::time::timeout(Duration::from_secs(5), daemon_handle)
        .await
        .expect("daemon did not stop")
        .unwrap()
        .unwrap();
    assert!(!socket_path.exists());

    let err = client.send(&IpcMessage::Status).await.unwrap_err();
    assert!(matches!(err, TextsimError::DaemonNotRunning));
}

#[tokio::test]
async fn test_daemon_loads_seed_file() {
    let temp_dir = TempDir::new().unwrap();
    let seed = temp_dir.path().join("frases.json");
    std::fs::write(
        &seed,
        r#"[
            {"texto": "Nunca te rindas", "categoria": "motivacional"},
            {"texto": "El amor todo lo puede", "categoria": "amor"},
            {"text": "Ríe y sonríe", "category": "humor"}
        ]"#,
    )
    .unwrap();

    let mut config = test_config(temp_dir.path());
    config.corpus.seed_file = Some(seed);
    let socket_path = config.daemon.socket_path.clone();

    let daemon = Daemon::new(config).unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let daemon_handle = tokio::spawn(async move {
        daemon
            .run_until(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    wait_for_socket(&socket_path).await;
    let client = IpcClient::new(socket_path);

    let init: InitializeSearchResponse = client
        .send(&IpcMessage::Initialize)
        .await
        .unwrap()
        .into_payload()
        .unwrap();
    assert_eq!(init.texts_loaded, 3);

    let response: SimilaritySearchResponse = client
        .send(&IpcMessage::Search {
            query: "Nunca te rindas".to_string(),
            top_n: None,
        })
        .await
        .unwrap()
        .into_payload()
        .unwrap();
    assert_eq!(response.results.len(), 3);
    assert_eq!(response.results[0].text, "Nunca te rindas");
    assert!(response.results[0].similarity_percent >= 99.99);

    shutdown_tx.send(()).unwrap();
    daemon_handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_stop_is_served_with_connections_at_limit() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(temp_dir.path());
    config.daemon.max_connections = 1;
    let socket_path = config.daemon.socket_path.clone();

    let daemon = Daemon::new(config).unwrap();
    let daemon_handle = tokio::spawn(async move {
        daemon.run_until(std::future::pending::<()>()).await
    });

    wait_for_socket(&socket_path).await;

    // Connected clients that never send a request
    let _idle_a = tokio::net::UnixStream::connect(&socket_path).await.unwrap();
    let _idle_b = tokio::net::UnixStream::connect(&socket_path).await.unwrap();
    sleep(Duration::from_millis(50)).await;

    let client = IpcClient::new(socket_path.clone());
    let response = tokio::time::timeout(Duration::from_secs(5), client.send(&IpcMessage::Stop))
        .await
        .expect("stop was not served")
        .unwrap();
    assert!(response.success);

    tokio::time::timeout(Duration::from_secs(5), daemon_handle)
        .await
        .expect("daemon did not stop")
        .unwrap()
        .unwrap();
    assert!(!socket_path.exists());
}
