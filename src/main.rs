use crate::{
    config::{Overrides, Settings, TOKEN_HELP},
    discovery::{Repository, discover_forks},
    github::{GitHubClient, GitHubConfig, GitHubError},
    orchestrator::{Orchestrator, OrchestratorOptions, SyncMode},
    retry::RetryPolicy,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod discovery;
mod drift;
mod error;
mod executor;
#[cfg(test)]
mod fake_gateway;
mod github;
mod orchestrator;
mod render;
mod retry;
mod summary;

#[derive(Parser)]
#[command(author, version, about, arg_required_else_help = true)]
struct Args {
    #[arg(long, short, global = true, help = "Enable verbose output")]
    verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize your forked repositories with their upstream sources.
    Sync {
        /// Preview which repositories would be synced without making changes.
        #[arg(long, env = "DRY_RUN")]
        dry_run: bool,
        /// Output results in JSON format.
        #[arg(long, env = "JSON_OUTPUT")]
        json: bool,
        /// Maximum number of retry attempts for API operations [default: 2].
        #[arg(long, env = "MAX_RETRIES")]
        max_retries: Option<u32>,
        /// Delay in seconds between retry attempts [default: 3].
        #[arg(long, env = "RETRY_DELAY")]
        retry_delay: Option<u64>,
        /// Cap on forks processed at once. Unbounded unless set.
        #[arg(long, env = "MAX_CONCURRENCY")]
        max_concurrency: Option<usize>,
        /// Stop starting new work once any repository fails.
        #[arg(long)]
        abort_on_error: bool,
    },
    /// Check if any forks are behind upstream, without syncing (for CI).
    CiCheck {
        /// Exit with a non-zero status code if any repository is behind upstream.
        #[arg(long, env = "CI_FAIL_ON_OUTDATED")]
        fail_on_outdated: bool,
        /// Output results in JSON format.
        #[arg(long, env = "JSON_OUTPUT")]
        json: bool,
    },
    /// Print version, commit and build date.
    Version,
}

fn main() {
    match inner_main() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = ?e);
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        std::env::var("LOG_LEVEL")
            .ok()
            .and_then(|level| EnvFilter::try_new(level.to_lowercase()).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn inner_main() -> Result<i32> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    match args.command {
        Commands::Version => {
            print_version();
            Ok(0)
        }
        Commands::Sync {
            dry_run,
            json,
            max_retries,
            retry_delay,
            max_concurrency,
            abort_on_error,
        } => {
            let overrides = Overrides {
                max_retries,
                retry_delay,
                max_concurrency,
            };
            let Some((settings, client)) = connect(&overrides)? else {
                return Ok(1);
            };
            let forks = fetch_forks(&client, json)?;
            if forks.is_empty() && !json {
                tracing::info!("No forked repositories found with parent information.");
                return Ok(0);
            }

            if let Some(cap) = settings.max_concurrency {
                tracing::info!("Processing at most {} repositories at once", cap);
            }
            let options = OrchestratorOptions {
                mode: if dry_run {
                    SyncMode::DryRun
                } else {
                    SyncMode::Normal
                },
                retry: settings.retry,
                max_concurrency: settings.max_concurrency,
                abort_on_error,
            };
            let summary = Orchestrator::new(&client, options).run(&forks, |report| {
                if !json {
                    render::print_outcome(report, dry_run);
                }
            });

            if json {
                render::print_json(&summary)?;
            } else {
                render::print_run_summary(&summary);
            }
            Ok(0)
        }
        Commands::CiCheck {
            fail_on_outdated,
            json,
        } => {
            let Some((settings, client)) = connect(&Overrides::default())? else {
                return Ok(1);
            };
            let forks = fetch_forks(&client, json)?;
            if forks.is_empty() && !json {
                tracing::info!("No forked repositories found with parent information.");
                return Ok(0);
            }

            let options = OrchestratorOptions {
                mode: SyncMode::DryRun,
                retry: RetryPolicy::none(),
                max_concurrency: settings.max_concurrency,
                abort_on_error: false,
            };
            let check = Orchestrator::new(&client, options).check(&forks, |report| {
                if !json {
                    render::print_check_line(report);
                }
            });

            if json {
                render::print_json(&check)?;
            } else {
                render::print_check_summary(&check, fail_on_outdated);
            }
            Ok(if fail_on_outdated && check.outdated_status { 1 } else { 0 })
        }
    }
}

/// Resolve settings and authenticate. `None` means no token was found and
/// the user has already been told how to provide one.
fn connect(overrides: &Overrides) -> Result<Option<(Settings, GitHubClient)>> {
    let file = config::load_config_file();
    let settings = match Settings::resolve(overrides, file, |key| std::env::var(key).ok()) {
        Ok(settings) => settings,
        Err(GitHubError::NoToken) => {
            eprintln!("ERROR: GitHub token not found\n\n{}", TOKEN_HELP);
            return Ok(None);
        }
        Err(error) => return Err(error.into()),
    };

    let client = GitHubClient::authenticate(GitHubConfig {
        token: settings.token.clone(),
        api_base: settings.api_base.clone(),
        timeout: settings.request_timeout,
    })
    .context("Failed to create GitHub client")?;
    tracing::debug!("Running as {}", client.login());

    Ok(Some((settings, client)))
}

fn fetch_forks(client: &GitHubClient, json: bool) -> Result<Vec<Repository>> {
    tracing::info!("Fetching forked repositories...");
    let spinner = (!json).then(render::discovery_spinner);
    let forks = discover_forks(client);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let forks = forks.context("Failed to fetch forked repositories")?;
    tracing::info!(
        "Found {} forked repositories with parent information",
        forks.len()
    );
    Ok(forks)
}

fn print_version() {
    println!("fork-sync version {}", env!("CARGO_PKG_VERSION"));
    println!("Commit: {}", option_env!("FORK_SYNC_GIT_SHA").unwrap_or("none"));
    println!("Built: {}", option_env!("FORK_SYNC_BUILD_DATE").unwrap_or("unknown"));
}
