//! mailstep - Run Graph mailbox actions as a pipeline step
//!
//! Reads connector settings from a JSON config file, then either processes a
//! JSON-lines action stream (`--input`) or performs the single read described
//! by the config. Results are written as JSON lines to `--output` or stdout;
//! logs go to stderr.

use anyhow::Result;
use clap::Parser;
use graph_mail::{ConnectorConfig, HttpTransport, RunSummary, UreqTransport};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

mod output;
mod runner;

use output::JsonLinesWriter;

#[derive(Parser, Debug)]
#[command(name = "mailstep")]
#[command(about = "Read, move and flag Microsoft 365 mail through the Graph API", long_about = None)]
struct Cli {
    /// Connector config file (defaults to ~/.config/mailstep/config.json)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JSON-lines file of actions; without it the config's folder/top/filter are read
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Where to write JSON-lines results (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Per-request timeout in seconds, overriding the config
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match run(Cli::parse()) {
        Ok(summary) => {
            info!(
                "Finished: {} actions, {} output emails",
                summary.actions, summary.emails
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<RunSummary> {
    let mut cfg = ConnectorConfig::load(cli.config.as_deref())?;
    if let Some(timeout) = cli.timeout_secs {
        cfg.timeout_secs = Some(timeout);
    }

    let transport: Arc<dyn HttpTransport> = Arc::new(UreqTransport::new(cfg.timeout()));
    let mut writer = JsonLinesWriter::open(cli.output.as_deref())?;

    let summary = runner::execute(&cfg, cli.input.as_deref(), transport, &mut writer)?;
    info!("Wrote {} output lines", writer.lines());
    writer.finish()?;
    Ok(summary)
}
