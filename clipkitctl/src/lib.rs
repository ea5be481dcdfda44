pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

use clipkit_core::{load_pipeline_config, Delivery, MediaPipeline, PipelineError};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] clipkit_core::ConfigError),
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "clipkit media pipeline control interface", long_about = None)]
pub struct Cli {
    /// Path to pipeline.toml
    #[arg(long, default_value = "configs/pipeline.toml")]
    pub config: PathBuf,
    /// Directory for directly delivered artifacts
    #[arg(long, default_value = ".")]
    pub output: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a remote media asset and deliver it
    Download(commands::download::DownloadArgs),
    /// Convert a local video or image into a size-capped GIF
    Gif(commands::gif::GifArgs),
    /// Re-encode a local video with heavy quantization
    Degrade(commands::degrade::DegradeArgs),
}

pub fn run(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_async(cli))
}

async fn run_async(cli: Cli) -> Result<()> {
    let config = load_pipeline_config(&cli.config)?;
    let pipeline = MediaPipeline::new(config)?;
    let delivery = match cli.command {
        Commands::Download(args) => commands::download::run(&pipeline, args).await?,
        Commands::Gif(args) => commands::gif::run(&pipeline, args).await?,
        Commands::Degrade(args) => commands::degrade::run(&pipeline, args).await?,
    };
    render_delivery(delivery, &cli.output).await
}

async fn render_delivery(delivery: Delivery, output_dir: &std::path::Path) -> Result<()> {
    match delivery {
        Delivery::Direct { file_name, bytes } => {
            let path = output_dir.join(file_name);
            tokio::fs::write(&path, bytes).await?;
            println!("{}", path.display());
        }
        Delivery::Hosted { url, expires_at } => {
            println!("{url}");
            println!("expires: {}", expires_at.to_rfc3339());
        }
    }
    Ok(())
}
