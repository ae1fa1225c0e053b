//! `breakwater`: inspect and exercise circuit breaker manifests.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use breakwater_core::{BreakerRegistry, CircuitBreaker, Classifier, RegistryManifest};

mod simulate;

use simulate::SimulatedError;

#[derive(Parser, Debug)]
#[command(name = "breakwater", version, about = "Circuit breaker manifest tooling")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and validate a manifest
    Validate {
        /// Manifest file (.yaml, .yml or .json)
        manifest: PathBuf,
    },

    /// Print the stats snapshot of every declared breaker as JSON
    Stats {
        manifest: PathBuf,
    },

    /// Drive a synthetic dependency through one declared breaker
    Simulate {
        manifest: PathBuf,

        /// Breaker to exercise
        #[arg(short, long)]
        breaker: String,

        /// Steps: s = success, f = failure, i = unclassified error, . = wait one tick
        #[arg(short, long)]
        pattern: String,

        /// Length of one wait step in milliseconds
        #[arg(long, default_value_t = 100)]
        tick_ms: u64,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<RegistryManifest> {
    RegistryManifest::from_file(path)
        .with_context(|| format!("failed to load manifest {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Validate { manifest } => {
            let manifest = load(&manifest)?;
            for declaration in &manifest.breakers {
                println!(
                    "{}: failure_threshold={} success_threshold={} timeout={}",
                    declaration.name,
                    declaration.failure_threshold,
                    declaration.success_threshold,
                    humantime::format_duration(declaration.timeout),
                );
            }
            eprintln!("{} breaker(s) OK", manifest.breakers.len());
        }

        Command::Stats { manifest } => {
            let manifest = load(&manifest)?;
            let registry = BreakerRegistry::new();
            manifest.register_all(&registry)?;
            println!("{}", serde_json::to_string_pretty(&registry.all_stats())?);
        }

        Command::Simulate {
            manifest,
            breaker,
            pattern,
            tick_ms,
        } => {
            let manifest = load(&manifest)?;
            let Some(declaration) = manifest.get(&breaker) else {
                bail!(
                    "breaker '{}' is not declared (available: {})",
                    breaker,
                    manifest
                        .breakers
                        .iter()
                        .map(|b| b.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            };
            let steps = simulate::parse_pattern(&pattern).context("invalid --pattern")?;

            let registry = BreakerRegistry::new();
            let config = declaration.to_config().with_classifier(Classifier::when(
                |e: &SimulatedError| *e == SimulatedError::Down,
            ));
            let guarded = CircuitBreaker::builder(&declaration.name)
                .config(config)
                .register(&registry)?;

            let report = simulate::run(&guarded, &steps, Duration::from_millis(tick_ms)).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
