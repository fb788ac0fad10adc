//! Command-line interface

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::auth::{GoogleTokenProvider, TokenProvider};
use crate::client::GmailMessageSource;
use crate::config::Config;
use crate::error::{GmailError, Result};
use crate::session::SessionStore;
use crate::web::{self, AppState};

#[derive(Parser, Debug)]
#[command(name = "gmail-size-sorter")]
#[command(version = "0.1.0")]
#[command(about = "Group Gmail messages into Small, Medium and Large by size", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Address to listen on, overriding server.bind_addr
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Print a Google authorization URL to check the client credentials
    AuthUrl,

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Load the configuration and run the web server until shutdown
pub async fn serve(config_path: &Path, bind: Option<&str>) -> Result<()> {
    let config = Config::load(config_path).await?;

    let bind_addr = bind.unwrap_or(&config.server.bind_addr);
    let addr: SocketAddr = bind_addr.parse().map_err(|_| {
        GmailError::ConfigError(format!("'{}' is not a socket address", bind_addr))
    })?;

    let state = build_state(&config).await?;
    info!(
        "Serving size report (limits {}..={}, default {}, session ttl {:?})",
        state.limits.min(),
        state.limits.max(),
        state.limits.default_limit(),
        state.sessions.ttl()
    );

    web::run_server(addr, state).await
}

/// Wire the production token provider and message source
pub async fn build_state(config: &Config) -> Result<AppState> {
    let tokens = GoogleTokenProvider::from_credentials_file(
        &config.server.credentials_path,
        &config.server.redirect_uri,
    )
    .await?;
    let messages = GmailMessageSource::from_config(&config.fetch)?;

    Ok(AppState {
        sessions: Arc::new(
            SessionStore::new(
                config.server.session_cookie.clone(),
                config.server.secure_cookies,
            )
            .with_limits(
                Duration::from_secs(config.server.session_ttl_secs),
                config.server.max_sessions,
            ),
        ),
        tokens: Arc::new(tokens),
        messages: Arc::new(messages),
        thresholds: config.classification.thresholds()?,
        limits: config.fetch.request_limits()?,
    })
}

/// Authorization URL for the configured client, without starting a server
pub async fn authorization_url(config_path: &Path) -> Result<String> {
    let config = Config::load(config_path).await?;
    let provider = GoogleTokenProvider::from_credentials_file(
        &config.server.credentials_path,
        &config.server.redirect_uri,
    )
    .await?;
    Ok(provider.authorization_url()?.url)
}

/// Write the default configuration, refusing to overwrite unless forced
pub async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(GmailError::ConfigError(format!(
            "Configuration file already exists at {:?}. Use --force to overwrite.",
            output
        )));
    }
    Config::create_example(output).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_serve_with_bind() {
        let cli = Cli::try_parse_from(["gmail-size-sorter", "-v", "serve", "--bind", "0.0.0.0:8080"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("config.toml"));
        match cli.command {
            Commands::Serve { bind } => assert_eq!(bind.as_deref(), Some("0.0.0.0:8080")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_init_config_defaults() {
        let cli = Cli::try_parse_from(["gmail-size-sorter", "init-config"]).unwrap();
        match cli.command {
            Commands::InitConfig { output, force } => {
                assert_eq!(output, PathBuf::from("config.toml"));
                assert!(!force);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["gmail-size-sorter"]).is_err());
    }

    #[tokio::test]
    async fn test_init_config_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        init_config(&path, false).await.unwrap();
        let loaded = Config::load(&path).await.unwrap();
        assert_eq!(loaded.fetch.default_max_results, 1000);

        let err = init_config(&path, false).await.unwrap_err();
        assert!(err.to_string().contains("--force"));

        init_config(&path, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_serve_rejects_bad_bind_address() {
        let dir = TempDir::new().unwrap();
        let missing_config = dir.path().join("absent.toml");
        let err = serve(&missing_config, Some("not-an-address"))
            .await
            .unwrap_err();
        assert!(matches!(err, GmailError::ConfigError(_)));
    }
}
