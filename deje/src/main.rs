//! DEJE Interactive Node
//!
//! Launches the REPL, either interactively or over a command script.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use deje::Repl;

#[derive(Parser)]
#[command(name = "deje", about = "DEJE interactive document node", version)]
struct Cli {
    /// Run commands from a script file instead of an interactive prompt
    #[arg(long)]
    script: Option<std::path::PathBuf>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("DEJE node v{}", env!("CARGO_PKG_VERSION"));

    let mut repl = Repl::new();
    match cli.script {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            repl.run_script(&text);
        }
        None => repl.run_interactive()?,
    }
    Ok(())
}
