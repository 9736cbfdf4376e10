use app::Pipeline;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use vg_config::Config;
use vg_core::telemetry;
use vg_record::StopHandle;

/// Record frames from an image sequence whenever something moves
#[derive(Debug, Parser)]
#[command(name = "vigil", version, about)]
struct Cli {
    /// Config file (defaults to ./vigil.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of frames to process, overrides source.input_dir
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output prefix, overrides output.prefix
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Runtime environment; `production` switches to JSON logs
    #[arg(long, default_value = "development")]
    env: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.env, "vigil");
    tracing::info!("vigil starting");

    // Load configuration - exit with non-zero if invalid
    let mut config = match Config::load_from(cli.config.as_deref()) {
        Ok(config) => {
            tracing::debug!(?config, "Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Some(input) = cli.input {
        config.source.input_dir = Some(input.to_string_lossy().into_owned());
    }
    if let Some(output) = cli.output {
        config.output.prefix = output.to_string_lossy().into_owned();
    }

    let pipeline = match Pipeline::build(&config, Local::now()) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!("Failed to start pipeline: {}", e);
            process::exit(1);
        }
    };

    #[cfg(feature = "status_server")]
    let pipeline = match config.status.bind_addr.as_deref() {
        Some(bind_addr) => {
            let status = vg_obs::LiveStatus::new(config.source.fps);
            let server = match vg_obs::bind_server(bind_addr, status.clone()) {
                Ok(server) => server,
                Err(e) => {
                    tracing::error!("Failed to start status server: {}", e);
                    process::exit(1);
                }
            };
            tokio::spawn(async move {
                if let Err(e) = server.await {
                    tracing::error!("Status server error: {}", e);
                }
            });
            pipeline.with_status(status)
        }
        None => pipeline,
    };

    if cfg!(not(feature = "status_server")) && config.status.bind_addr.is_some() {
        tracing::warn!("status.bind_addr set but status_server feature not enabled, ignoring");
    }

    let stop = StopHandle::new();
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current frame");
            signal_stop.request_stop();
        }
    });

    // The capture loop is synchronous; keep it off the async workers
    let result = tokio::task::spawn_blocking(move || pipeline.run(&stop)).await;

    match result {
        Ok(Ok(summary)) => {
            let summary_json = serde_json::to_string(&summary).unwrap_or_default();
            tracing::info!(summary = %summary_json, "vigil finished");
        }
        Ok(Err(e)) => {
            tracing::error!("Capture failed: {}", e);
            process::exit(1);
        }
        Err(e) => {
            tracing::error!("Capture thread panicked: {}", e);
            process::exit(1);
        }
    }
}
