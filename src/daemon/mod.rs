// Daemon module: serves the search service over a local socket

mod ipc;
mod signals;

pub use ipc::{read_message, write_response, ErrorKind, IpcClient, IpcMessage, IpcResponse, IpcServer};
pub use signals::SignalHandler;

use crate::config::Config;
use crate::corpus::{self, NewEntry};
use crate::error::{Result, TextsimError};
use crate::service::{ExtendCorpusRequest, SearchService, SimilaritySearchRequest};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task;

/// Long-running process that owns one `SearchService` and answers IPC requests
pub struct Daemon {
    config: Config,
    service: SearchService,
}

impl Daemon {
    /// Create a new daemon with an empty corpus
    pub fn new(config: Config) -> Result<Self> {
        let service = SearchService::new(&config)?;
        Ok(Self { config, service })
    }

    pub fn with_service(config: Config, service: SearchService) -> Self {
        Self { config, service }
    }

    pub fn service(&self) -> &SearchService {
        &self.service
    }

    /// Load a corpus file into the service in `load_batch_size` chunks
    pub fn seed(&self, path: &Path) -> Result<usize> {
        let entries = corpus::load_file(&expand_tilde(path))?;
        let batch_size = self.config.corpus.load_batch_size.max(1);

        let mut loaded = 0;
        let mut pending = entries.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<NewEntry> = pending.by_ref().take(batch_size).collect();
            let response = self
                .service
                .extend_corpus(ExtendCorpusRequest { entries: batch })?;
            loaded += response.appended;
        }

        tracing::info!("Seeded corpus with {} entries from {:?}", loaded, path);
        Ok(loaded)
    }

    /// Run in the foreground until SIGTERM/SIGINT/SIGHUP or a `stop` request
    pub async fn run(&self) -> Result<()> {
        let mut signal_handler = SignalHandler::new()?;
        self.run_until(async move {
            let sig = signal_handler.wait().await;
            tracing::info!("Received {} signal", sig);
        })
        .await
    }

    /// Serve requests until `shutdown` resolves or a client sends `stop`
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if let Some(seed_file) = &self.config.corpus.seed_file {
            self.seed(seed_file)?;
        }

        let socket_path = expand_tilde(&self.config.daemon.socket_path);
        let mut ipc_server = IpcServer::new(socket_path);
        ipc_server.bind().await?;

        let permits = Arc::new(Semaphore::new(self.config.daemon.max_connections.max(1)));
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        tracing::info!("Daemon started successfully");

        tokio::pin!(shutdown);

        // Main event loop
        loop {
            tokio::select! {
                accepted = ipc_server.accept() => {
                    let stream = match accepted {
                        Ok(stream) => stream,
                        Err(e) => {
                            tracing::warn!("Failed to accept client: {}", e);
                            continue;
                        }
                    };

                    let permits = Arc::clone(&permits);
                    let service = self.service.clone();
                    let stop_tx = stop_tx.clone();

                    task::spawn(async move {
                        if let Err(e) = handle_client(stream, service, permits, stop_tx).await {
                            tracing::error!("Client handler error: {}", e);
                        }
                    });
                }

                _ = stop_rx.recv() => {
                    tracing::info!("Stop requested by client");
                    break;
                }

                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            }
        }

        tracing::info!("Shutting down daemon");
        ipc_server.shutdown()?;
        tracing::info!("Daemon shutdown complete");

        Ok(())
    }
}

/// Handle a client connection: one request, one response
///
/// Only service calls hold a permit; idle connections and `stop` never wait
/// on one.
async fn handle_client(
    mut stream: tokio::net::UnixStream,
    service: SearchService,
    permits: Arc<Semaphore>,
    stop_tx: mpsc::Sender<()>,
) -> Result<()> {
    let message = read_message(&mut stream).await?;
    let is_stop = matches!(message, IpcMessage::Stop);

    let response = if is_stop {
        IpcResponse::success("Shutdown initiated")
    } else {
        let _permit = permits
            .acquire_owned()
            .await
            .map_err(|e| TextsimError::Daemon(format!("Connection limiter closed: {}", e)))?;

        // Index builds are CPU bound; keep them off the reactor threads
        task::spawn_blocking(move || dispatch(&service, message))
            .await
            .unwrap_or_else(|e| IpcResponse::error(format!("Request handler panicked: {}", e)))
    };

    write_response(&mut stream, &response).await?;

    if is_stop {
        // A full channel means a stop is already pending
        let _ = stop_tx.try_send(());
    }

    Ok(())
}

/// Route a request to the service and wrap the outcome
fn dispatch(service: &SearchService, message: IpcMessage) -> IpcResponse {
    let result = match message {
        IpcMessage::Initialize => service
            .initialize_search()
            .and_then(|r| IpcResponse::with_payload(&r)),
        IpcMessage::Search { query, top_n } => service
            .similarity_search(&SimilaritySearchRequest { query, top_n })
            .and_then(|r| IpcResponse::with_payload(&r)),
        IpcMessage::Extend { entries } => service
            .extend_corpus(ExtendCorpusRequest { entries })
            .and_then(|r| IpcResponse::with_payload(&r)),
        IpcMessage::Stats => service
            .corpus_statistics()
            .and_then(|r| IpcResponse::with_payload(&r)),
        IpcMessage::Status => service.status().and_then(|r| IpcResponse::with_payload(&r)),
        IpcMessage::Stop => Ok(IpcResponse::success("Shutdown initiated")),
    };

    result.unwrap_or_else(|e| {
        if e.is_invalid_argument() {
            tracing::debug!("Rejected request: {}", e);
        } else {
            tracing::error!("Request failed: {}", e);
        }
        IpcResponse::from_error(&e)
    })
}

/// Expand tilde in path
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        let path = PathBuf::from("~/.textsim");
        let expanded = expand_tilde(&path);
        assert_eq!(expanded, home.join(".textsim"));

        let path = PathBuf::from("/tmp/textsim");
        let expanded = expand_tilde(&path);
        assert_eq!(expanded, PathBuf::from("/tmp/textsim"));
    }

    #[test]
    fn test_dispatch_maps_invalid_argument() {
        let service = SearchService::new(&Config::default()).unwrap();
        let response = dispatch(
            &service,
            IpcMessage::Search {
                query: "  ".to_string(),
                top_n: None,
            },
        );
        assert!(!response.success);
        assert_eq!(response.error_kind, Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn test_dispatch_extend_then_stats() {
        let service = SearchService::new(&Config::default()).unwrap();
        let response = dispatch(
            &service,
            IpcMessage::Extend {
                entries: vec![NewEntry::new("hola", "saludo"), NewEntry::uncategorized("adios")],
            },
        );
        assert!(response.success);

        let stats: crate::service::CorpusStatistics =
            dispatch(&service, IpcMessage::Stats).into_payload().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.per_category.get("saludo"), Some(&1));
    }

    #[test]
    fn test_seed_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("corpus.jsonl");
        std::fs::write(
            &file,
            "{\"text\": \"uno\", \"category\": \"a\"}\n{\"text\": \"dos\"}\n{\"texto\": \"tres\", \"categoria\": \"b\"}\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.corpus.load_batch_size = 2;
        let daemon = Daemon::new(config).unwrap();

        assert_eq!(daemon.seed(&file).unwrap(), 3);
        assert_eq!(daemon.service().corpus_statistics().unwrap().total, 3);
    }
}
