use booksearch::cli::{Cli, Commands, ConfigAction};
use booksearch::config::Config;
use booksearch::error::{BookSearchError, Result};
use booksearch::server::{IpcClient, RetrieveRequest, Server, ServingStatus};
use std::future::Future;
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve { listen } => {
            cmd_serve(cli.config, listen)?;
        }
        Commands::Search {
            query,
            dense_top_k,
            sparse_top_k,
            top_k,
            top_n,
            addr,
            json,
        } => {
            let request = RetrieveRequest {
                query,
                dense_top_k,
                sparse_top_k,
                top_k,
                top_n,
            };
            cmd_search(cli.config, request, addr, json)?;
        }
        Commands::Health { addr } => {
            cmd_health(cli.config, addr)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "booksearch=debug"
    } else {
        "booksearch=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| BookSearchError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;
    Ok(rt.block_on(future))
}

fn cmd_serve(config_path: Option<PathBuf>, listen: Option<String>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(listen) = listen {
        config.server.listen_addr = listen;
    }

    tracing::info!("Starting booksearch server...");

    block_on(async {
        let server = Server::from_config(&config).await?;
        tracing::info!("Collaborators ready");
        server.run().await
    })?
}

fn cmd_search(
    config_path: Option<PathBuf>,
    request: RetrieveRequest,
    addr: Option<String>,
    json: bool,
) -> Result<()> {
    let addr = resolve_addr(config_path, addr)?;
    let client = IpcClient::new(addr);

    let response = block_on(client.retrieve(request))??;

    if json {
        let output = serde_json::to_string_pretty(&response).map_err(|e| BookSearchError::Json {
            source: e,
            context: "Failed to format response".to_string(),
        })?;
        println!("{}", output);
        return Ok(());
    }

    if response.book_ids.is_empty() {
        println!("No results");
        return Ok(());
    }

    for (rank, (id, score)) in response
        .book_ids
        .iter()
        .zip(&response.scores)
        .enumerate()
    {
        println!("{:>3}. {:<40} {:.4}", rank + 1, id, score);
    }

    Ok(())
}

fn cmd_health(config_path: Option<PathBuf>, addr: Option<String>) -> Result<()> {
    let addr = resolve_addr(config_path, addr)?;
    let client = IpcClient::new(addr.clone());

    let status = match block_on(client.health())? {
        Ok(status) => status,
        Err(e) => {
            tracing::debug!("Health check failed: {}", e);
            ServingStatus::NotServing
        }
    };

    match status {
        ServingStatus::Serving => {
            println!("✓ {} is serving", addr);
            Ok(())
        }
        ServingStatus::NotServing => {
            println!("✗ {} is not serving", addr);
            std::process::exit(1);
        }
    }
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
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
    Config::load_or_default(&path)
}

/// Client address: explicit flag, else the configured port on localhost
fn resolve_addr(config_path: Option<PathBuf>, addr: Option<String>) -> Result<String> {
    if let Some(addr) = addr {
        return Ok(addr);
    }

    let config = load_config(config_path)?;
    let listen: std::net::SocketAddr =
        config
            .server
            .listen_addr
            .parse()
            .map_err(|_| BookSearchError::InvalidConfigValue {
                path: "server.listen_addr".to_string(),
                message: format!("Invalid socket address: {}", config.server.listen_addr),
            })?;

    Ok(format!("127.0.0.1:{}", listen.port()))
}
