use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ribbon_wm::common::config::Config;
use ribbon_wm::common::log;

#[derive(Parser)]
#[command(name = "ribbon", about = "A scrolling tiling window manager with virtual workspaces")]
struct Cli {
    /// Configuration file; defaults to ~/.config/ribbon/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the window manager (the default).
    Run,
    /// Apply a JSON batch of window moves from FILE or stdin and report
    /// saved frames on stdout.
    Mover { file: Option<PathBuf> },
}

fn run_manager(config: Config) -> anyhow::Result<()> {
    #[cfg(target_os = "macos")]
    return ribbon_wm::actor::run(config);

    #[cfg(not(target_os = "macos"))]
    {
        let _ = config;
        anyhow::bail!("ribbon manages macOS windows only");
    }
}

fn run_mover(file: Option<PathBuf>) -> anyhow::Result<()> {
    #[cfg(target_os = "macos")]
    std::process::exit(ribbon_wm::sys::transport::wire::run(file.as_deref()));

    #[cfg(not(target_os = "macos"))]
    {
        let _ = file;
        anyhow::bail!("the mover runs only on macOS");
    }
}

fn main() -> anyhow::Result<()> {
    log::init();
    let cli = Cli::parse();
    match cli.command.unwrap_or(CliCommand::Run) {
        CliCommand::Run => {
            let config = Config::load_or_default(cli.config.as_deref())?;
            run_manager(config)
        }
        CliCommand::Mover { file } => run_mover(file),
    }
}
