use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use apibundle::bundle::{load_bundle, Bundle};
use apibundle::config::{available_environments, load_config, EnvironmentBuilder, LoadedConfig};
use apibundle::executor::{print_bundle_report, PrintOptions, ReqwestClient};
use apibundle::request::merge_request;
use apibundle::runner::{run_bundle, RequestReport, RunObserver};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "apibundle",
    version,
    about = "Run bundles of HTTP requests and check their responses",
    disable_help_subcommand = true
)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every request in a bundle, or the ones named with -r
    Run {
        #[arg(value_name = "BUNDLE")]
        bundle: PathBuf,
        /// Request to run; may be repeated
        #[arg(short, long = "request", value_name = "NAME")]
        requests: Vec<String>,
        /// Environment from the config file, or a varset of the bundle
        #[arg(short = 'E', long = "env")]
        environment: Option<String>,
        /// Directory or file containing apibundle.json
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Extra dotenv file applied last
        #[arg(long)]
        env_file: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the requests of a bundle in run order
    List {
        #[arg(value_name = "BUNDLE")]
        bundle: PathBuf,
    },
    /// List the environments available to a run
    Envs {
        #[arg(value_name = "BUNDLE")]
        bundle: Option<PathBuf>,
        /// Directory or file containing apibundle.json
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let base_dir = std::env::current_dir()?;

    match cli.command {
        Commands::Run {
            bundle,
            requests,
            environment,
            config,
            env_file,
            json,
        } => {
            let bundle_path = resolve_relative(&base_dir, &bundle);
            let bundle = load_bundle(&bundle_path).await?;
            let cfg = load_config_for(&base_dir, config.as_deref(), &bundle_path)?;

            let environment = EnvironmentBuilder::new(
                cfg,
                environment,
                env_file.map(|p| resolve_relative(&base_dir, &p)),
            )
            .build(&bundle)
            .await
            .context("preparing environment")?;

            let mut store = environment.store();
            let client = ReqwestClient::new();
            let run_cancel = CancellationToken::new();
            let mut observer = SpinnerObserver::new(!json);
            spawn_interrupt_handler(run_cancel.clone(), observer.current.clone());

            let report = run_bundle(
                &bundle,
                &requests,
                &mut store,
                &client,
                &run_cancel,
                &mut observer,
            )
            .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_bundle_report(
                    &report,
                    &PrintOptions {
                        verbose: cli.verbose,
                    },
                );
            }

            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::List { bundle } => {
            let bundle = load_bundle(&resolve_relative(&base_dir, &bundle)).await?;
            list_requests(&bundle);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Envs { bundle, config } => {
            let bundle = match bundle {
                Some(path) => load_bundle(&resolve_relative(&base_dir, &path)).await?,
                None => Bundle::default(),
            };
            let config_target = config
                .map(|p| resolve_relative(&base_dir, &p))
                .unwrap_or_else(|| base_dir.clone());
            let cfg = load_config(&config_target).context("loading configuration")?;

            let default = cfg
                .as_ref()
                .and_then(|c| c.config.default_environment.clone());
            for name in available_environments(cfg.as_ref(), &bundle) {
                if default.as_deref() == Some(name.as_str()) {
                    println!("{} {}", name.bold(), "(default)".dimmed());
                } else {
                    println!("{name}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("APIBUNDLE_LOG")
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// An explicit config wins; otherwise look next to the bundle, then in the
/// working directory.
fn load_config_for(
    base_dir: &Path,
    explicit: Option<&Path>,
    bundle_path: &Path,
) -> Result<Option<LoadedConfig>> {
    if let Some(explicit) = explicit {
        return load_config(&resolve_relative(base_dir, explicit)).context("loading configuration");
    }
    if let Some(bundle_dir) = bundle_path.parent() {
        if let Some(found) = load_config(bundle_dir).context("loading configuration")? {
            return Ok(Some(found));
        }
    }
    load_config(base_dir).context("loading configuration")
}

fn list_requests(bundle: &Bundle) {
    for (name, raw) in &bundle.requests {
        match merge_request(name, &bundle.common, raw) {
            Ok(spec) => println!(
                "{} {} {}",
                name.bold(),
                spec.http.method,
                spec.full_url().cyan()
            ),
            Err(err) => println!("{} {}", name.bold(), err.to_string().red()),
        }
    }
}

/// Ctrl-C cancels the request in flight. A second one while that request is
/// still winding down cancels the whole run.
fn spawn_interrupt_handler(
    run_cancel: CancellationToken,
    current: Arc<Mutex<Option<CancellationToken>>>,
) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            let request = current.lock().ok().and_then(|slot| slot.clone());
            match request {
                Some(token) if !token.is_cancelled() => token.cancel(),
                _ => {
                    run_cancel.cancel();
                    break;
                }
            }
        }
    });
}

struct SpinnerObserver {
    enabled: bool,
    current: Arc<Mutex<Option<CancellationToken>>>,
    spinner: Option<ProgressBar>,
}

impl SpinnerObserver {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            current: Arc::new(Mutex::new(None)),
            spinner: None,
        }
    }
}

impl RunObserver for SpinnerObserver {
    fn request_started(&mut self, name: &str, cancel: &CancellationToken) {
        if let Ok(mut slot) = self.current.lock() {
            *slot = Some(cancel.clone());
        }
        if !self.enabled {
            return;
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} {elapsed}") {
            spinner.set_style(style);
        }
        spinner.set_message(name.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn request_finished(&mut self, _report: &RequestReport) {
        if let Ok(mut slot) = self.current.lock() {
            *slot = None;
        }
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
