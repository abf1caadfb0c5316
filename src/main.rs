//! rune-ledger: replays a Death Knight fight timeline through the rune
//! simulator and writes a scored, annotated report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use rune_ledger_lib::{config, report, specs};

#[derive(Parser, Debug)]
#[command(name = "rune-ledger")]
#[command(about = "Score Death Knight rune usage from a normalized fight timeline")]
#[command(version)]
struct Args {
    /// Timeline file (JSON Lines), or a directory to take the newest *.jsonl from
    #[arg(required_unless_present = "list_specs")]
    timeline: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, default_value = config::CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Spec profile to use instead of detecting it (e.g. "Unholy")
    #[arg(short, long)]
    spec: Option<String>,

    /// List the embedded spec profiles and exit
    #[arg(long)]
    list_specs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_specs {
        for info in specs::list_all() {
            println!("{:<8} {}", info.spec, info.description);
        }
        return Ok(());
    }

    let mut cfg = config::load_or_default(&args.config)?;
    if args.spec.is_some() {
        cfg.spec = args.spec;
    }

    let _guard = rune_ledger_lib::init_logging(&cfg.log_dir)?;

    let timeline = args.timeline.context("a timeline path is required")?;
    let pretty = cfg.pretty;
    let fight = rune_ledger_lib::analyze(timeline, cfg).await?;

    report::write_report(&fight, args.out.as_deref(), pretty)
}
