//! uds-tester - holds an ECU in the Extended Diagnostic Session and prints all CAN traffic

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use uds_tester::config::FileConfig;
use uds_tester::session::{SessionController, StdoutSink};

#[derive(Parser)]
#[command(name = "uds-tester")]
#[command(author, version, about = "Keep a UDS extended diagnostic session alive and print all CAN frames")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "UDS_TESTER_CONFIG")]
    config: Option<PathBuf>,

    /// Print the full error chain and enable debug logging
    #[arg(long)]
    debug: bool,

    /// Use the simulated CAN bus instead of a real interface
    #[arg(long)]
    simulate: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Tester Present period in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Request arbitration ID, hex (e.g. 7E0)
    #[arg(long, value_parser = parse_hex_id)]
    request_id: Option<u32>,
}

fn parse_hex_id(s: &str) -> std::result::Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hex ID '{}': {}", s, e))
}

fn init_logging(cli: &Cli) {
    let filter = if cli.verbose || cli.debug {
        EnvFilter::new("uds_tester=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("uds_tester=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<FileConfig> {
    let mut file = match &cli.config {
        Some(path) => FileConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => FileConfig::load().context("Failed to load default config")?,
    };

    if let Some(interval_ms) = cli.interval_ms {
        file.session.keepalive_interval_ms = Some(interval_ms);
    }
    if let Some(request_id) = cli.request_id {
        file.session.request_id = Some(request_id);
    }

    Ok(file)
}

async fn run(cli: &Cli) -> Result<()> {
    let file = load_config(cli)?;
    let adapter_config = file.adapter_config(cli.simulate);
    let session_config = file.session_config().context("Invalid session configuration")?;
    debug!("Adapter {:?}, session {:?}", adapter_config, session_config);

    let interval = session_config.keepalive_interval;
    let controller = SessionController::new(session_config, Arc::new(StdoutSink));

    info!(
        "Press Ctrl+C to stop. Tester Present every {:.1}s",
        interval.as_secs_f64()
    );

    controller
        .run(&adapter_config, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Session failed")
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.debug {
                eprintln!("Error: {:?}", e);
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}
