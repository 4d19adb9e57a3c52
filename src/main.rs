//! cfm-storage command-line tool

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cfm_storage::config::{AppConfig, LogFormat};
use cfm_storage::Storage;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a bucket if it does not exist yet
    CreateBucket { bucket: String },
    /// Upload a file and print its generated key
    Put {
        bucket: String,
        file: PathBuf,
        /// Extension for the stored key; defaults to the file's extension
        #[arg(long)]
        extension: Option<String>,
    },
    /// Print a client URL for a stored object
    Url { bucket: String, key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config);

    let storage = Storage::from_config(&config)
        .await
        .context("failed to initialise storage")?;
    tracing::info!(environment = %storage.environment(), "Storage adapter ready");

    match cli.command {
        Command::CreateBucket { bucket } => {
            storage.idempotent_create_bucket(&bucket).await?;
            println!("{bucket}");
        }
        Command::Put {
            bucket,
            file,
            extension,
        } => {
            let extension = match extension {
                Some(ext) => ext,
                None => file
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        anyhow!("{} has no extension; pass --extension", file.display())
                    })?,
            };
            let blob = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let key = storage.write(&bucket, &extension, blob).await?;
            println!("{key}");
        }
        Command::Url { bucket, key } => {
            let url = storage.generate_file_url(&bucket, &key).await?;
            println!("{url}");
        }
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.clone()))
        .unwrap_or_else(|_| EnvFilter::new("cfm_storage=info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Logs go to stderr so command output stays pipeable.
    match config.logging.format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
