use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bucket_audio::media::{FfmpegTranscoder, FfprobeProber};
use bucket_audio::storage::S3Gateway;
use bucket_audio::{utils, Cli, Commands, Config, Pipeline, PipelineSettings, Watcher};

#[tokio::main]
async fn main() -> ExitCode {
    // AWS credentials may come from a local .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose { "bucket_audio=debug" } else { "bucket_audio=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command() {
        Commands::Config { init } => run_config(&cli, init),
        Commands::Watch { interval } => {
            let config = Config::load(cli.config.as_deref())?;
            let interval = match interval {
                Some(secs) => {
                    anyhow::ensure!(secs > 0, "--interval must be greater than zero");
                    Duration::from_secs(secs)
                }
                None => config.scan_interval(),
            };

            let mut watcher = build_watcher(&config, interval).await?;
            watcher.run(shutdown_signal()).await;
            Ok(())
        }
        Commands::Once => {
            let config = Config::load(cli.config.as_deref())?;
            let mut watcher = build_watcher(&config, config.scan_interval()).await?;

            let report = watcher.run_once().await;
            if let Some(error) = &report.listing_error {
                anyhow::bail!("Scan failed: {}", error);
            }
            println!(
                "Scan finished: {} listed, {} new, {} delivered, {} failed",
                report.listed,
                report.outcomes.len(),
                report.delivered(),
                report.failed()
            );
            Ok(())
        }
    }
}

fn run_config(cli: &Cli, init: bool) -> Result<()> {
    if init {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => Config::default_path()?,
        };
        anyhow::ensure!(!path.exists(), "Config file already exists: {}", path.display());

        Config::default().save(&path)?;
        println!("Default configuration written to: {}", path.display());
    } else {
        Config::load(cli.config.as_deref())?.display();
    }
    Ok(())
}

async fn build_watcher(config: &Config, interval: Duration) -> Result<Watcher> {
    // Missing tools only produce warnings; every file would then fail individually
    let missing = utils::check_dependencies(&config.media.ffmpeg_path, &config.media.ffprobe_path).await;
    for dep in missing {
        tracing::warn!("Dependency check warning: {} (continuing anyway)", dep);
    }

    let scratch_dir = config.scratch_dir();
    fs_err::create_dir_all(&scratch_dir).context("Failed to create scratch directory")?;

    let store = S3Gateway::connect(&config.aws).await;
    tracing::info!(bucket = %store.bucket(), scratch = %scratch_dir.display(), "Connected");

    let pipeline = Pipeline::new(
        Box::new(store),
        Box::new(FfprobeProber::from_config(&config.media)),
        Box::new(FfmpegTranscoder::from_config(&config.media)),
        PipelineSettings::from_config(config),
    );

    Ok(Watcher::new(pipeline, interval))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Unable to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
