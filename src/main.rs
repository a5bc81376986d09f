mod cli;

use vidi::{config, dump, notificator, processor, storage, videoapi};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

async fn run_processor(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    config::validate_config(&config)?;

    tracing::info!("Starting vidi processor");
    tracing::info!(
        videoapi = %config.videoapi.endpoint,
        backend = ?config.storage.backend,
        upload_prefix = %config.s3.prefix.upload,
        watch_prefix = %config.s3.prefix.watch,
        "Effective configuration"
    );

    let store = storage::from_config(&config)
        .await
        .context("Failed to set up box store")?;
    let api: Arc<dyn videoapi::VideoApi> = Arc::new(videoapi::HttpVideoApi::new(&config.videoapi));

    let (sender, notificator) = notificator::channel(Arc::clone(&api));
    let processor = processor::Processor::new(&config, api, store, sender);

    let processor_cancel = CancellationToken::new();
    let notificator_cancel = CancellationToken::new();
    let processor_handle = tokio::spawn(processor.run(processor_cancel.clone()));
    let notificator_handle = tokio::spawn(notificator.run(notificator_cancel.clone()));

    shutdown_signal().await;

    // The processor stops first so its last status updates are queued
    // before the notificator drains.
    tracing::info!("Shutting down...");
    processor_cancel.cancel();
    if let Err(e) = processor_handle.await {
        tracing::error!("Processor task failed: {}", e);
    }
    notificator_cancel.cancel();
    if let Err(e) = notificator_handle.await {
        tracing::error!("Notificator task failed: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidi=debug,vidi_media=debug,vidi_common=debug".to_string()
        } else {
            "vidi=info,vidi_media=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Process => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_processor(cli.config.as_deref()))
        }
        Commands::Segment {
            input,
            out_dir,
            segment_duration,
        } => segment_file(&input, &out_dir, segment_duration),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("vidi {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn segment_file(input: &Path, out_dir: &Path, segment_duration: u64) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let rt = tokio::runtime::Runtime::new()?;
    let meta = rt
        .block_on(dump::segment_file(
            input,
            out_dir,
            Duration::from_secs(segment_duration),
        ))
        .with_context(|| format!("Failed to segment {:?}", input))?;

    println!("Output: {}", out_dir.display());
    println!("Duration: {}s", meta.duration);
    for track in &meta.tracks {
        print!("  {} {} {}", track.name, track.mime_type, track.codec.profile);
        if let Some(rate) = track.codec.sample_rate {
            print!(" {} Hz", rate);
        }
        println!(
            " ({}/{} s segments)",
            track.segment.duration, track.segment.timescale
        );
    }
    println!("Manifest: {}", out_dir.join(storage::paths::MANIFEST_NAME).display());

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using default locations");
            let config = config::load_config_or_default(None)?;
            let violations = config::config_violations(&config);
            if violations.is_empty() {
                println!("✓ Configuration is valid");
            } else {
                for violation in &violations {
                    println!("✗ {}", violation);
                }
            }
            config
        }
    };

    println!("  Video API: {}", config.videoapi.endpoint);
    println!("  Storage backend: {:?}", config.storage.backend);
    println!("  S3: {} bucket {}", config.s3.endpoint_url(), config.s3.bucket);
    println!(
        "  Prefixes: upload={} watch={}",
        config.s3.prefix.upload, config.s3.prefix.watch
    );
    println!(
        "  Segment duration: {}s, check period: {}s",
        config.processor.segment_duration, config.processor.video_check_period
    );
    println!("  Purge uploads: {}", config.processor.purge_uploads);

    Ok(())
}
