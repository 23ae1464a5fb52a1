mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{parse_interval, Cli};
use colored::Colorize;
use mirror::config::Config;
use mirror::sync::compare::DEFAULT_MAX_DEPTH;
use mirror::{
    DirectoryPolicy, FingerprintAlgorithm, Mirror, MirrorConfig, PollResult, ReconcileOptions,
    StopReason, TracingSink,
};
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, EnvFilter};

const TIME_FORMAT: &str = "%d-%b-%y %H:%M:%S";

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let config = Config::load()?;

    if cli.list_profiles {
        let profiles = config.list_profiles();
        if profiles.is_empty() {
            println!("No profiles configured");
            println!("\nCreate profiles in: {}", Config::config_path()?.display());
        } else {
            println!("Available profiles:");
            for name in profiles {
                println!("  {}", name);
            }
        }
        return Ok(());
    }

    if let Some(ref profile_name) = cli.show_profile {
        match config.show_profile(profile_name) {
            Some(output) => {
                println!("{}", output);
                return Ok(());
            }
            None => anyhow::bail!("Profile '{}' not found", profile_name),
        }
    }

    // CLI arguments take precedence over the profile
    if let Some(ref profile_name) = cli.profile {
        let profile = config
            .get_profile(profile_name)
            .ok_or_else(|| anyhow::anyhow!("Profile '{}' not found", profile_name))?
            .clone();

        if cli.source.is_none() {
            cli.source = profile.source;
        }
        if cli.replica.is_none() {
            cli.replica = profile.replica;
        }
        if cli.interval.is_none() {
            if let Some(ref interval) = profile.interval {
                cli.interval = Some(
                    parse_interval(interval)
                        .map_err(|e| anyhow::anyhow!("Profile '{}': {}", profile_name, e))?,
                );
            }
        }
        if cli.log_file.is_none() {
            cli.log_file = profile.log_file;
        }
        if let Some(fingerprint) = profile.fingerprint {
            if cli.fingerprint == FingerprintAlgorithm::default() {
                cli.fingerprint = fingerprint;
            }
        }
        if let Some(dirs) = profile.dirs {
            if cli.dirs == DirectoryPolicy::default() {
                cli.dirs = dirs;
            }
        }
        if let Some(max_depth) = profile.max_depth {
            if cli.max_depth == DEFAULT_MAX_DEPTH {
                cli.max_depth = max_depth;
            }
        }
        if let Some(preserve) = profile.preserve_metadata {
            if cli.preserve_metadata {
                cli.preserve_metadata = preserve;
            }
        }
    }

    init_logging(&cli)?;

    cli.validate()?;

    // After validation, these must be present
    let source = cli.source.clone().expect("source required after validation");
    let replica = cli.replica.clone().expect("replica required after validation");
    let interval = cli.interval.expect("interval required after validation");

    if !cli.quiet {
        eprintln!("mirror v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("Mirroring {} → {}", source.display(), replica.display());
        if !cli.once {
            eprintln!("Polling every {:?}", interval);
        }
        if let Some(ref log_file) = cli.log_file {
            eprintln!("Logging to {}", log_file.display());
        }
    }

    let mirror = Mirror::new(
        MirrorConfig {
            source,
            replica,
            interval,
            options: ReconcileOptions {
                algorithm: cli.fingerprint,
                policy: cli.dirs,
                max_depth: cli.max_depth,
                preserve_metadata: cli.preserve_metadata,
            },
        },
        Arc::new(TracingSink),
    );

    if cli.once {
        mirror.check_preconditions()?;
        let result = tokio::task::spawn_blocking(move || mirror.poll_once()).await??;
        if !cli.quiet {
            match result {
                PollResult::UpToDate => eprintln!("{}", "✓ Replica is up to date".green().bold()),
                PollResult::Reconciled(outcome) if outcome.failed > 0 => {
                    eprintln!("{} {}", "✗ Sync finished with failures:".red().bold(), outcome)
                }
                PollResult::Reconciled(outcome) => {
                    eprintln!("{} {}", "✓ Sync complete:".green().bold(), outcome)
                }
                PollResult::Stopped(_) => {}
            }
        }
        return Ok(());
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let reason = Arc::new(mirror).run(shutdown).await?;
    if !cli.quiet {
        let msg = match reason {
            StopReason::SourceMissing => "Source folder disappeared, stopping",
            StopReason::ReplicaMissing => "Replica folder disappeared, stopping",
            StopReason::Shutdown => "Stopped",
        };
        eprintln!("{}", msg.yellow());
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().as_str()));

    let builder = fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    match cli.log_file {
        Some(ref path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }

    Ok(())
}
