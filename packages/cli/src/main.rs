mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{convert, inspect, ConvertArgs, InspectArgs};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Luthor - convert and inspect rich-text documents
#[derive(Parser, Debug)]
#[command(name = "luthor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output from the editor runtime
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a document between HTML and Markdown
    Convert(ConvertArgs),

    /// Show what the editor composition contains
    Inspect(InspectArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match std::env::current_dir() {
        Ok(cwd) => match cli.command {
            Command::Convert(args) => convert(args, &cwd).await,
            Command::Inspect(args) => inspect(args, &cwd),
        },
        Err(e) => Err(anyhow::anyhow!("Cannot read current directory: {}", e)),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
