use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use depwatch::{
    cache::{self, Cache},
    config::Config,
    model::{split_spec, SeverityLevel, VulnerabilityResponse},
    output::{format_result_to_string, print_result, OutputFormat},
    resolver::{NpmResolver, VersionResolver},
    service::VulnerabilityService,
};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const CRITICAL_VULN: u8 = 2;
    pub const HIGH_VULN: u8 = 3;
    pub const MODERATE_VULN: u8 = 4;
    pub const LOW_VULN: u8 = 5;
}

#[derive(Parser)]
#[command(name = "depwatch")]
#[command(
    author,
    version,
    about = "Look up known vulnerabilities for npm packages via OSV"
)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check packages for known vulnerabilities
    Check {
        /// Packages as NAME@VERSION or NAME@RANGE (e.g. lodash@^4.17.0)
        packages: Vec<String>,

        /// Read a request body ({"packages": [{"name", "version"}]}) from a file
        #[arg(short, long, conflicts_with = "packages")]
        input: Option<PathBuf>,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Write output to file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Bypass the response cache
        #[arg(long)]
        no_cache: bool,

        /// Exit with error if vulnerabilities at or above this severity are found
        #[arg(long, value_enum)]
        fail_on: Option<FailLevel>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Clear the response cache
    ClearCache,
}

#[derive(Clone, Copy, ValueEnum)]
enum FailLevel {
    Critical,
    High,
    Moderate,
    Low,
}

impl FailLevel {
    fn threshold(self) -> SeverityLevel {
        match self {
            FailLevel::Critical => SeverityLevel::Critical,
            FailLevel::High => SeverityLevel::High,
            FailLevel::Moderate => SeverityLevel::Moderate,
            FailLevel::Low => SeverityLevel::Low,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "depwatch=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    let config = Config::load().unwrap_or_else(|e| {
        warn!("ignoring unreadable config file: {:#}", e);
        Config::default()
    });

    match cli.command {
        Commands::Check {
            packages,
            input,
            format,
            output,
            no_cache,
            fail_on,
        } => {
            let format = format.unwrap_or_else(|| config.default_format.clone());
            let format = OutputFormat::from_str(&format).map_err(|e| anyhow::anyhow!(e))?;

            let config = Config {
                cache_enabled: config.cache_enabled && !no_cache,
                ..config
            };

            let body = match input {
                Some(path) => read_request_body(&path)?,
                None if !packages.is_empty() => build_request_body(&config, &packages).await?,
                None => {
                    anyhow::bail!("No packages given. Pass NAME@VERSION arguments or --input FILE")
                }
            };

            run_check(&config, body, format, output, fail_on).await
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::ClearCache => {
            let cache = Cache::with_dir(
                cache::default_dir(),
                config.cache_max_age(),
                config.cache_stale_window(),
            );
            cache.clear()?;
            println!("Cache cleared: {}", cache.dir().display());
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn read_request_body(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Resolves every `NAME@SPEC` argument to a concrete version and builds a
/// request body. Specs that cannot be resolved are skipped with a warning.
async fn build_request_body(config: &Config, specs: &[String]) -> Result<Value> {
    let resolver = NpmResolver::new(&config.registry_url, config.request_timeout())?;

    let resolved = join_all(specs.iter().map(|spec| {
        let resolver = &resolver;
        async move {
            let (name, constraint) = split_spec(spec);
            let version = resolver.resolve(&name, &constraint).await;
            (spec, name, version)
        }
    }))
    .await;

    let packages: Vec<Value> = resolved
        .into_iter()
        .filter_map(|(spec, name, version)| match version {
            Some(version) => Some(json!({"name": name, "version": version})),
            None => {
                warn!("could not resolve {}, skipping", spec);
                None
            }
        })
        .collect();

    Ok(json!({ "packages": packages }))
}

async fn run_check(
    config: &Config,
    body: Value,
    format: OutputFormat,
    output_file: Option<PathBuf>,
    fail_on: Option<FailLevel>,
) -> Result<u8> {
    let is_interactive = format == OutputFormat::Table && output_file.is_none();
    let checked = VulnerabilityService::parse_request(Some(&body))?
        .iter()
        .filter(|q| q.is_valid())
        .count();

    let service = VulnerabilityService::from_config(config)?;

    let progress = if is_interactive {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Checking {} packages...", checked));
        Some(pb)
    } else {
        None
    };

    let response = service.handle(Some(&body)).await?;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if let Some(path) = output_file {
        std::fs::write(&path, format_result_to_string(&response, checked, format)?)?;
        if format == OutputFormat::Table {
            println!("Results written to: {}", path.display());
        }
    } else {
        print_result(&response, checked, format)?;
    }

    // Let background refreshes reach the cache before exiting.
    service.wait_for_refreshes().await;

    Ok(determine_exit_code(&response, fail_on))
}

/// Determine the exit code based on the worst severity found and --fail-on
fn determine_exit_code(response: &VulnerabilityResponse, fail_on: Option<FailLevel>) -> u8 {
    let Some(fail_on) = fail_on else {
        return exit_codes::SUCCESS;
    };

    match response.worst() {
        Some(worst) if worst <= fail_on.threshold() => match worst {
            SeverityLevel::Critical => exit_codes::CRITICAL_VULN,
            SeverityLevel::High => exit_codes::HIGH_VULN,
            SeverityLevel::Moderate => exit_codes::MODERATE_VULN,
            SeverityLevel::Low => exit_codes::LOW_VULN,
            SeverityLevel::Unknown => exit_codes::SUCCESS,
        },
        _ => exit_codes::SUCCESS,
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    // Show current config
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'depwatch config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
