use anyhow::Result;
use clap::Parser;
use gmail_size_sorter::cli::{self, Cli, Commands};
use gmail_size_sorter::error::GmailError;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        display_error(&e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Several dependencies pull in rustls; pick one crypto provider up front
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_size_sorter=debug,tower_http=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_size_sorter=info,warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    match cli.command {
        Commands::Serve { bind } => {
            tracing::info!("Gmail size sorter starting...");
            cli::serve(&cli.config, bind.as_deref()).await?;
            Ok(())
        }

        Commands::AuthUrl => {
            let url = cli::authorization_url(&cli.config).await?;
            println!("Open this URL to authorize read-only Gmail access:\n{}", url);
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            tracing::info!("Generating example configuration file");
            cli::init_config(&output, force).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nPlease edit this file to customize your settings.");
            println!("Key settings to review:");
            println!("  - server.credentials_path: OAuth client secrets from Google Cloud Console");
            println!("  - server.redirect_uri: must match a redirect URI registered for the client");
            println!("  - fetch.default_max_results: messages scanned when none are requested");
            println!("  - classification.medium_min_bytes / large_min_bytes: bucket boundaries");

            Ok(())
        }
    }
}

fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }

    if let Some(gmail_err) = error.downcast_ref::<GmailError>() {
        match gmail_err {
            GmailError::AuthError(_) => {
                eprintln!("\nHint: Make sure your credentials.json file is valid.");
                eprintln!("      You can download it from Google Cloud Console.");
            }
            GmailError::ConfigError(_) => {
                eprintln!("\nHint: Check your configuration file for errors.");
                eprintln!("      Run: gmail-size-sorter init-config --force");
            }
            GmailError::IoError(_) => {
                eprintln!("\nHint: Is another process already listening on the bind address?");
            }
            _ => {}
        }
    }

    eprintln!("\nFor help, run: gmail-size-sorter --help");
}
