use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use polybucket::config;
use polybucket::{create_storage, ObjectStorage, StorageProvider};

#[derive(Parser)]
#[command(name = "polybucket")]
#[command(about = "Provider-agnostic object storage CLI")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, global = true, env = "POLYBUCKET_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Override the configured provider (local, s3, obs)
    #[arg(long, global = true)]
    provider: Option<StorageProvider>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file
    Upload {
        bucket: String,
        key: String,
        /// Source file
        file: PathBuf,
    },
    /// Download an object (to stdout when no file is given)
    Download {
        bucket: String,
        key: String,
        file: Option<PathBuf>,
    },
    /// Delete an object
    Delete { bucket: String, key: String },
    /// Check whether an object exists
    Exists { bucket: String, key: String },
    /// List object keys
    List {
        bucket: String,
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Generate a presigned download URL
    Presign {
        bucket: String,
        key: String,
        /// Expiry in seconds
        #[arg(long, default_value_t = 3600)]
        expiry: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, stdout carries command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polybucket=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut app_config = config::load_config(&cli.config)?;
    if let Some(provider) = cli.provider {
        app_config.object_storage.provider = provider;
    }
    tracing::info!("Using storage provider {}", app_config.object_storage.provider);

    let storage = create_storage(&app_config.object_storage)?;

    // Ctrl-C cancels the running operation / Ctrl-C 取消当前操作
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            signal_token.cancel();
        }
    });

    run(cli.command, storage.as_ref(), &cancel).await
}

async fn run(command: Commands, storage: &dyn ObjectStorage, cancel: &CancellationToken) -> Result<()> {
    match command {
        Commands::Upload { bucket, key, file } => {
            let mut source = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Failed to open {:?}", file))?;
            storage.upload(&bucket, &key, &mut source, cancel).await?;
            println!("uploaded {}/{}", bucket, key);
        }
        Commands::Download { bucket, key, file } => match file {
            Some(path) => {
                let mut output = tokio::fs::File::create(&path)
                    .await
                    .with_context(|| format!("Failed to create {:?}", path))?;
                storage.download(&bucket, &key, &mut output, cancel).await?;
                eprintln!("downloaded {}/{} to {:?}", bucket, key, path);
            }
            None => {
                let mut stdout = tokio::io::stdout();
                storage.download(&bucket, &key, &mut stdout, cancel).await?;
                stdout.flush().await?;
            }
        },
        Commands::Delete { bucket, key } => {
            storage.delete(&bucket, &key, cancel).await?;
            println!("deleted {}/{}", bucket, key);
        }
        Commands::Exists { bucket, key } => {
            let exists = storage.exists(&bucket, &key, cancel).await?;
            println!("{}", exists);
        }
        Commands::List { bucket, prefix } => {
            for key in storage.list(&bucket, prefix.as_deref(), cancel).await? {
                println!("{}", key);
            }
        }
        Commands::Presign { bucket, key, expiry } => {
            let url = storage
                .presigned_url(&bucket, &key, Duration::from_secs(expiry))
                .await?;
            println!("{}", url);
        }
    }
    Ok(())
}
