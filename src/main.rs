use std::path::{Path, PathBuf};
use textsim::cli::{Cli, Commands, ConfigAction};
use textsim::config::Config;
use textsim::corpus;
use textsim::daemon::{expand_tilde, Daemon, IpcClient, IpcMessage, IpcResponse};
use textsim::error::{Result, TextsimError};
use textsim::service::{
    CorpusStatistics, ExtendCorpusRequest, ExtendCorpusResponse, InitializeSearchResponse,
    SearchService, ServiceStatus, SimilaritySearchRequest, SimilaritySearchResponse,
};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Serve { corpus } => {
            cmd_serve(cli.config, corpus)?;
        }
        Commands::Init => {
            cmd_init(cli.config)?;
        }
        Commands::Search {
            query,
            top_n,
            json,
            corpus,
        } => {
            cmd_search(cli.config, query, top_n, json, corpus)?;
        }
        Commands::Load {
            file,
            category,
            batch_size,
        } => {
            cmd_load(cli.config, &file, category, batch_size)?;
        }
        Commands::Stats { json } => {
            cmd_stats(cli.config, json)?;
        }
        Commands::Status => {
            cmd_status(cli.config)?;
        }
        Commands::Stop => {
            cmd_stop(cli.config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "textsim=debug" } else { "textsim=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_serve(config_path: Option<PathBuf>, corpus: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if corpus.is_some() {
        config.corpus.seed_file = corpus;
    }

    tracing::info!("Starting textsim daemon...");

    let daemon = Daemon::new(config)?;
    runtime()?.block_on(daemon.run())
}

fn cmd_init(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let response: InitializeSearchResponse = request(&config, IpcMessage::Initialize)?.into_payload()?;

    println!("✓ Similarity index ready");
    println!("  Texts indexed: {}", response.texts_loaded);

    Ok(())
}

fn cmd_search(
    config_path: Option<PathBuf>,
    query: String,
    top_n: Option<i64>,
    json: bool,
    corpus: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;

    let response: SimilaritySearchResponse = match corpus {
        Some(path) => {
            let service = SearchService::new(&config)?;
            let entries = corpus::load_file(&expand_tilde(&path))?;
            service.extend_corpus(ExtendCorpusRequest { entries })?;
            service.similarity_search(&SimilaritySearchRequest { query, top_n })?
        }
        None => request(&config, IpcMessage::Search { query, top_n })?.into_payload()?,
    };

    if json {
        println!("{}", to_json(&response)?);
        return Ok(());
    }

    println!("Query: {}", response.query);
    if response.results.is_empty() {
        println!("\nNo texts in corpus");
        return Ok(());
    }

    println!();
    for (rank, result) in response.results.iter().enumerate() {
        println!(
            "{:>3}. [{:>6.2}%] {} ({})",
            rank + 1,
            result.similarity_percent,
            result.text,
            result.category
        );
    }

    Ok(())
}

fn cmd_load(
    config_path: Option<PathBuf>,
    file: &Path,
    category: Option<String>,
    batch_size: Option<usize>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let batch_size = batch_size.unwrap_or(config.corpus.load_batch_size).max(1);

    let mut entries = corpus::load_file(&expand_tilde(file))?;
    if let Some(category) = category {
        for entry in entries.iter_mut().filter(|e| e.category.is_none()) {
            entry.category = Some(category.clone());
        }
    }

    if entries.is_empty() {
        println!("No entries found in {}", file.display());
        return Ok(());
    }

    let client = IpcClient::new(expand_tilde(&config.daemon.socket_path));
    let rt = runtime()?;

    let mut appended = 0;
    let mut total = 0;
    for batch in entries.chunks(batch_size) {
        let message = IpcMessage::Extend {
            entries: batch.to_vec(),
        };
        let response: ExtendCorpusResponse = rt.block_on(client.send(&message))?.into_payload()?;
        appended += response.appended;
        total = response.total;
        tracing::debug!("Sent batch of {} entries", batch.len());
    }

    println!("✓ Loaded {} entries from {}", appended, file.display());
    println!("  Corpus size: {}", total);

    Ok(())
}

fn cmd_stats(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let stats: CorpusStatistics = request(&config, IpcMessage::Stats)?.into_payload()?;

    if json {
        println!("{}", to_json(&stats)?);
        return Ok(());
    }

    println!("Corpus Statistics");
    println!("=================");
    println!("\nTotal texts: {}", stats.total);

    if !stats.per_category.is_empty() {
        println!("\nBy category:");
        for (category, count) in &stats.per_category {
            println!("  {:<24} {}", category, count);
        }
    }

    Ok(())
}

fn cmd_status(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    let status: ServiceStatus = match request(&config, IpcMessage::Status) {
        Ok(response) => response.into_payload()?,
        Err(TextsimError::DaemonNotRunning) => {
            println!("Daemon: Stopped");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    println!("textsim Status");
    println!("==============");
    println!("\nDaemon: Running");
    println!("Index: {:?}", status.state);
    println!("Corpus size: {}", status.corpus_size);
    println!("Indexed texts: {}", status.indexed);
    println!("Stale: {}", if status.stale { "yes" } else { "no" });
    println!("Builds: {}", status.builds);

    Ok(())
}

fn cmd_stop(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    match request(&config, IpcMessage::Stop) {
        Ok(response) if response.success => {
            println!("✓ Daemon stopping");
            Ok(())
        }
        Ok(response) => Err(TextsimError::Daemon(
            response.message.unwrap_or_else(|| "stop refused".to_string()),
        )),
        Err(TextsimError::DaemonNotRunning) => {
            println!("Daemon is not running");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let content = toml::to_string_pretty(&config)?;
            println!("{}", content);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| TextsimError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::debug!(
            "Config file not found, using defaults. Run 'textsim config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        return Ok(config);
    }

    Config::load(&path)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| TextsimError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn request(config: &Config, message: IpcMessage) -> Result<IpcResponse> {
    let client = IpcClient::new(expand_tilde(&config.daemon.socket_path));
    runtime()?.block_on(client.send(&message))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| TextsimError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })
}
