//! Command-line interface implementation
//!
//! `sitepipe [TASK...]` runs each named task in order, `default` when none
//! is given. Task output goes through a progress reporter; diagnostics go
//! through `tracing`.

mod tasks;

use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::build::progress::{ConsoleProgress, JsonProgress, ProgressReporter};
use crate::build::BuildContext;
use crate::config::loader::{find_config, load_config, merge_cli_overrides, CliOverrides};
use crate::tasks::standard_registry;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Environment variable holding the tracing filter.
pub const LOG_ENV: &str = "SITEPIPE_LOG";

/// Sitepipe - front-end asset pipeline
#[derive(Parser, Debug)]
#[command(name = "sitepipe")]
#[command(about = "Compile Sass, bundle and minify assets, optimize images and serve with live reload")]
#[command(version)]
pub struct Cli {
    /// Tasks to run, in order (default: `default`)
    pub tasks: Vec<String>,

    /// Path to sitepipe.toml (default: searched upwards from the current directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// List the available tasks and exit
    #[arg(long)]
    pub list: bool,

    /// Show per-task details and debug diagnostics
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Report progress as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Dev server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Dev server host
    #[arg(long)]
    pub host: Option<String>,

    /// Production output directory
    #[arg(long, value_name = "DIR")]
    pub dist: Option<PathBuf>,

    /// Maximum number of tasks run concurrently in a fan-out step
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    ExitCode::from(execute(cli))
}

/// Run with already parsed arguments, returning the process exit code.
pub fn execute(cli: Cli) -> u8 {
    let (config_path, project_root) = match locate_project(cli.config.as_deref()) {
        Ok(found) => found,
        Err(message) => {
            eprintln!("Error: {}", message);
            return EXIT_INVALID_ARGS;
        }
    };

    let mut config = match load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return EXIT_INVALID_ARGS;
        }
    };
    match &config_path {
        Some(path) => tracing::debug!(config = %path.display(), "using config"),
        None => tracing::debug!("no sitepipe.toml found, using defaults"),
    }

    let overrides = CliOverrides { dist: cli.dist.clone(), host: cli.host.clone(), port: cli.port };
    merge_cli_overrides(&mut config, &overrides);

    let registry = standard_registry();
    if cli.list {
        tasks::list_tasks(&registry, &project_root);
        return EXIT_SUCCESS;
    }

    let reporter: Arc<dyn ProgressReporter> = if cli.json {
        Arc::new(JsonProgress::new())
    } else {
        Arc::new(
            ConsoleProgress::new()
                .with_colors(std::io::stderr().is_terminal())
                .with_verbose(cli.verbose)
                .with_quiet(cli.quiet),
        )
    };

    let context = BuildContext::new(config, project_root)
        .with_jobs(cli.jobs)
        .with_reporter(reporter);

    let names = if cli.tasks.is_empty() { vec!["default".to_string()] } else { cli.tasks };
    tasks::run_tasks(&registry, &context, &names)
}

/// Find the config file and the project root it defines.
///
/// Without a config file the project root is the current directory.
fn locate_project(explicit: Option<&Path>) -> Result<(Option<PathBuf>, PathBuf), String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("cannot read the current directory: {}", e))?;

    let config_path = match explicit {
        Some(path) if !path.is_file() => {
            return Err(format!("config file not found: {}", path.display()));
        }
        Some(path) => Some(path.to_path_buf()),
        None => find_config(),
    };

    let root = config_path
        .as_deref()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or(cwd);
    // Watch events carry canonical paths
    let root = root.canonicalize().unwrap_or(root);
    Ok((config_path, root))
}

/// Install the tracing subscriber.
///
/// `SITEPIPE_LOG` takes precedence over the level implied by the flags.
fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_tasks_and_flags() {
        let cli = Cli::try_parse_from([
            "sitepipe", "clean:dist", "build", "--port", "4000", "--dist", "public", "-j", "2",
        ])
        .unwrap();
        assert_eq!(cli.tasks, vec!["clean:dist", "build"]);
        assert_eq!(cli.port, Some(4000));
        assert_eq!(cli.dist, Some(PathBuf::from("public")));
        assert_eq!(cli.jobs, Some(2));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["sitepipe", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_missing_explicit_config() {
        let err = locate_project(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.contains("config file not found"));
    }
}
