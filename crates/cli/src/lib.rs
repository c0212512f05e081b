mod commands;
mod util;

use clap::{Parser, Subcommand, ValueEnum};
use commands::dump::DumpArgs;
use commands::events::EventsArgs;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "treebind", version, about = "Inspect treebind model adapters from the command line")]
struct Cli {
    /// Raise log verbosity (repeatable); `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a mock tree definition and print the adapted rows.
    Dump(DumpArgs),
    /// Replay a mutation script and print the row events the adapter emits.
    Events(EventsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = match &cli.command {
        Command::Dump(args) => commands::dump::run(args)?,
        Command::Events(args) => commands::events::run(args)?,
    };
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
