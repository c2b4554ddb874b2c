//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "booksearch",
    version,
    about = "Hybrid book search service with query structuring, fused retrieval and reranking",
    long_about = "booksearch turns free-text book queries into structured filters, retrieves \
                  candidates from dense and sparse vector spaces fused with reciprocal rank \
                  fusion, reranks them with a cross-encoder, and serves the results over RPC."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/booksearch/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the retrieval server in the foreground
    Serve {
        /// Listen address, overriding server.listen_addr
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Send a search request to a running server
    Search {
        /// Search query text
        query: String,

        /// Candidates from the dense space (0 = server default)
        #[arg(long, default_value = "0")]
        dense_top_k: u32,

        /// Candidates from the sparse space (0 = server default)
        #[arg(long, default_value = "0")]
        sparse_top_k: u32,

        /// Candidates kept after fusion (0 = server default)
        #[arg(long, default_value = "0")]
        top_k: u32,

        /// Results returned after reranking (0 = server default)
        #[arg(short = 'n', long, default_value = "0")]
        top_n: u32,

        /// Server address (defaults to the configured listen port on localhost)
        #[arg(short, long)]
        addr: Option<String>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Check whether a server is serving (exit code 1 when it is not)
    Health {
        /// Server address (defaults to the configured listen port on localhost)
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_defaults_to_zero() {
        let cli = Cli::try_parse_from(["booksearch", "search", "cheap fantasy", "-n", "5"]).unwrap();

        match cli.command {
            Commands::Search {
                query,
                top_n,
                dense_top_k,
                ..
            } => {
                assert_eq!(query, "cheap fantasy");
                assert_eq!(top_n, 5);
                assert_eq!(dense_top_k, 0);
            }
            _ => panic!("Wrong command"),
        }
    }
}
