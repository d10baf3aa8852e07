use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use stepwise::config::EngineOverrides;
use stepwise::logging::{self, LogOptions};

mod cmd;

#[derive(Parser)]
#[command(name = "stepwise")]
#[command(version, about = "Run command pipelines with confidence-tagged progress")]
pub struct Cli {
    /// Print per-update detail lines and debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute every step of a plan file
    Run {
        /// Path to the plan file (TOML)
        plan: PathBuf,

        /// Output mode: full, minimal, or json
        #[arg(long, default_value = "full")]
        ui: String,

        /// Interval between synthetic progress ticks, in milliseconds
        #[arg(long)]
        synthetic_tick_ms: Option<u64>,

        /// Upper bound on the minimum display time of fast steps, in milliseconds
        #[arg(long)]
        immediate_max_ms: Option<u64>,

        /// Directory to run commands in
        #[arg(short = 'C', long)]
        working_dir: Option<PathBuf>,
    },
    /// Check a plan file without running it
    Validate {
        plan: PathBuf,
    },
    /// Print the resolved steps and engine settings of a plan
    Show {
        plan: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(&LogOptions {
        verbose: cli.verbose,
        json: cli.log_json,
        file: cli.log_file.clone(),
    })?;

    match &cli.command {
        Commands::Run {
            plan,
            ui,
            synthetic_tick_ms,
            immediate_max_ms,
            working_dir,
        } => {
            let overrides = EngineOverrides {
                synthetic_tick_ms: *synthetic_tick_ms,
                immediate_max_duration_ms: *immediate_max_ms,
            };
            cmd::cmd_run(&cli, plan, ui, &overrides, working_dir.as_deref()).await?;
        }
        Commands::Validate { plan } => cmd::cmd_validate(plan)?,
        Commands::Show { plan } => cmd::cmd_show(plan)?,
    }

    Ok(())
}
