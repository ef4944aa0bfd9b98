//! CLI for calltap
//!
//! Commands:
//! - demo: trace a built-in workload through the full publisher/observer pipeline
//! - summarize: print the call tree and totals of a recorded trace

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "calltap")]
#[command(about = "calltap - call/return tracer with an out-of-process observer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace a built-in workload and write the events to a file
    Demo(commands::demo::DemoArgs),

    /// Summarize a line-format trace file
    Summarize(commands::summarize::SummarizeArgs),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Demo(args) => {
            init_tracing(args.verbose);
            commands::demo::run(args)
        }
        Commands::Summarize(args) => {
            init_tracing(args.verbose);
            commands::summarize::run(args)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
