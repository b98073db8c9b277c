//! dockside - open a shell in a development container bound to a directory.
//!
//! ## Usage
//!
//! ```bash
//! # Mount the current directory into cs50/cli:latest
//! dockside
//!
//! # Mount another directory, skip the image update
//! dockside --fast ~/projects/pset1
//!
//! # Use a different tag and bring git config and ssh keys along
//! dockside -t 2024 --git --ssh
//! ```

use std::env;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dockside::config::{APP_NAME, AppConfig};
use dockside::{
    BindingResolver, InterruptController, Session, SessionOutcome, SessionRequest,
    SessionSettings, TerminalPrompt,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match try_main(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&cli, &config);

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    let engine = config.engine_runtime()?;
    if !engine.is_installed() {
        bail!("{} not installed", engine.binary());
    }
    debug!("using {} ({})", engine.binary(), engine.runtime_type());

    let directory = match cli.directory {
        Some(dir) => dir,
        None => env::current_dir().context("determining current directory")?,
    };
    let home = dirs::home_dir().ok_or_else(|| anyhow!("unable to determine home directory"))?;

    let request = SessionRequest {
        directory,
        image: config.image_reference(cli.tag.as_deref())?,
        pull: config.image.pull && !cli.fast,
        mount_gitconfig: cli.git,
        mount_ssh: cli.ssh,
    };
    let resolver = BindingResolver::new(
        home,
        config.container.home.clone(),
        config.container.workspace.clone(),
    );
    let settings = SessionSettings::from(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    let result = runtime.block_on(async {
        let interrupt = InterruptController::install().context("installing interrupt handler")?;
        let session = Session::new(&engine, &resolver, &settings, interrupt.token());
        let mut prompt = TerminalPrompt::new();
        session
            .run(&request, &mut prompt)
            .await
            .map_err(anyhow::Error::from)
    });
    // A pending stdin read cannot be cancelled, so don't wait for it.
    runtime.shutdown_background();

    Ok(dispatch(&result?))
}

/// Map a finished session to the process exit status.
fn dispatch(outcome: &SessionOutcome) -> ExitCode {
    if let SessionOutcome::Interrupted { .. } = outcome {
        // Leave the shell prompt on a fresh line after ^C.
        println!();
    }
    debug!("session finished: {:?}", outcome);
    ExitCode::from(outcome.exit_code())
}

fn init_logging(cli: &Cli, config: &AppConfig) {
    let level = if cli.quiet {
        "off"
    } else {
        match cli.verbose {
            0 => config.logging.level.as_str(),
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{APP_NAME}={level}")));
    let disable_color = env::var_os("NO_COLOR").is_some() || !io::stderr().is_terminal();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_ansi(!disable_color)
        .with_target(cli.verbose > 1)
        .try_init()
        .ok();
}

#[derive(Parser, Debug)]
#[command(
    name = "dockside",
    author,
    version,
    about = "Open a shell in a development container with DIRECTORY mounted",
    after_help = "Examples:\n  \
        dockside\n  \
        dockside --fast ~/projects/pset1\n  \
        dockside -t 2024 --git --ssh"
)]
struct Cli {
    /// Skip the image update
    #[arg(short, long)]
    fast: bool,

    /// Mount ~/.gitconfig read-only
    #[arg(short, long)]
    git: bool,

    /// Mount ~/.ssh read-only
    #[arg(short, long)]
    ssh: bool,

    /// Start <repository>:TAG instead of the configured tag
    #[arg(short, long, value_name = "TAG")]
    tag: Option<String>,

    /// Directory to mount, else the current directory
    #[arg(value_name = "DIRECTORY")]
    directory: Option<PathBuf>,

    /// Override the config file path
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Suppress log output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from(["dockside", "-f", "-g", "-s", "-t", "2024", "/work"]);
        assert!(cli.fast && cli.git && cli.ssh);
        assert_eq!(cli.tag.as_deref(), Some("2024"));
        assert_eq!(cli.directory, Some(PathBuf::from("/work")));
    }

    #[test]
    fn test_directory_is_optional() {
        let cli = Cli::parse_from(["dockside"]);
        assert!(cli.directory.is_none());
        assert!(!cli.fast);
    }

    #[test]
    fn test_dispatch_maps_outcome() {
        let outcome = SessionOutcome::Interrupted {
            container: None,
            stopped: false,
        };
        assert_eq!(dispatch(&outcome), ExitCode::SUCCESS);
    }
}
