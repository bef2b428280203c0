//! `gsidem` command-line tool.
//!
//! Resolves renderer tiles to GSI elevation tiles and renders heightmaps from
//! payloads already on disk. Nothing is downloaded; `url` prints what to fetch.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::batch::BatchArgs;
use commands::render::RenderArgs;
use commands::url::UrlArgs;
use commands::ConfigOverrides;
use error::CliError;
use gsidem::GsiTerrainProvider;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "gsidem",
    version,
    about = "Quantized terrain heightmaps from GSI elevation tiles"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[clap(long, global = true, help = "YAML provider configuration")]
    config: Option<PathBuf>,

    #[clap(long, global = true, help = "Use dem_png tiles instead of dem text tiles")]
    png: bool,

    #[clap(long, global = true, help = "Multiplier applied to every height")]
    height_power: Option<f64>,

    #[clap(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase log verbosity"
    )]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Print the upstream tile and URL for a renderer tile")]
    Url(UrlArgs),
    #[command(about = "Render one local payload to heightmap JSON")]
    Render(RenderArgs),
    #[command(about = "Render a range of tiles from a local mirror in parallel")]
    Batch(BatchArgs),
}

fn init_tracing(verbose: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::builder().from_env_lossy()
    } else {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::builder().parse_lossy(level)
    };

    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = commands::resolve_config(&ConfigOverrides {
        config: cli.config,
        png: cli.png,
        height_power: cli.height_power,
    })?;
    let provider = GsiTerrainProvider::new(config)?;

    match cli.command {
        Commands::Url(args) => {
            println!("{}", commands::url::describe(&provider, &args));
            Ok(())
        }
        Commands::Render(args) => commands::render::run(&provider, &args),
        Commands::Batch(args) => {
            let cancel = Arc::new(AtomicBool::new(false));
            let handler_flag = cancel.clone();
            ctrlc::set_handler(move || {
                eprintln!("Received interrupt, cancelling tiles not yet started...");
                handler_flag.store(true, Ordering::SeqCst);
            })
            .map_err(|e| CliError::Config(format!("failed to set signal handler: {}", e)))?;

            let summary = commands::batch::run_batch(&provider, &args, &cancel)?;
            println!(
                "{} written, {} cancelled, {} failed",
                summary.written, summary.cancelled, summary.failed
            );
            if summary.failed > 0 {
                return Err(CliError::BatchFailed {
                    failed: summary.failed,
                    total: summary.total(),
                });
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    gsidem_metrics::describe_metrics();
    info!(version = env!("CARGO_PKG_VERSION"), "gsidem starting");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
