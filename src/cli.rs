use clap::Parser;
use mirror::sync::compare::DEFAULT_MAX_DEPTH;
use mirror::{DirectoryPolicy, FingerprintAlgorithm};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parse a polling interval: bare seconds ("30") or a suffixed value
/// ("500ms", "30s", "5m", "1h")
///
/// The number is plain decimal digits with an optional fraction; signs and
/// exponents are not accepted, so "1e3" reads as the unknown unit "e3".
pub fn parse_interval(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();

    let (num_str, unit) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => (s.as_str(), "s"),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|e| format!("Invalid interval '{}': {}", s, e))?;

    let millis_per_unit = match unit.trim() {
        "ms" => 1.0,
        "s" | "sec" => 1_000.0,
        "m" | "min" => 60_000.0,
        "h" => 3_600_000.0,
        _ => return Err(format!("Unknown unit '{}'. Use ms, s, m, or h", unit)),
    };

    Ok(Duration::from_millis((num * millis_per_unit) as u64))
}

#[derive(Parser, Debug)]
#[command(name = "mirror")]
#[command(about = "Keep a replica folder identical to a source folder", long_about = None)]
#[command(version)]
#[command(after_help = "EXAMPLES:
    # Mirror every 30 seconds, log to stderr
    mirror /data/source /data/replica 30

    # Mirror every 5 minutes, append log lines to a file
    mirror /data/source /data/replica 5m /var/log/mirror.log

    # Single pass and exit
    mirror /data/source /data/replica 0 --once

    # Only touch the entries that differ inside changed subdirectories
    mirror /data/source /data/replica 30 --dirs merge

    # Use a profile from ~/.config/mirror/config.toml
    mirror --profile photos")]
pub struct Cli {
    /// Source folder (read-only)
    pub source: Option<PathBuf>,

    /// Replica folder (kept identical to the source)
    pub replica: Option<PathBuf>,

    /// Polling interval: seconds, or suffixed with ms/s/m/h
    #[arg(value_parser = parse_interval)]
    pub interval: Option<Duration>,

    /// Append log lines to this file instead of stderr
    pub log_file: Option<PathBuf>,

    /// Content fingerprint used to compare files
    #[arg(long, value_enum, default_value_t = FingerprintAlgorithm::Blake3)]
    pub fingerprint: FingerprintAlgorithm,

    /// How to handle a subdirectory that differs
    #[arg(long, value_enum, default_value_t = DirectoryPolicy::Replace)]
    pub dirs: DirectoryPolicy,

    /// Maximum directory nesting to traverse
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Carry file permissions and modification times over to the replica
    #[arg(long, default_value = "true", action = clap::ArgAction::Set)]
    pub preserve_metadata: bool,

    /// Run a single poll and exit
    #[arg(long)]
    pub once: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only show warnings and errors)
    #[arg(short, long)]
    pub quiet: bool,

    /// Use a named profile from the config file
    #[arg(long, env = "MIRROR_PROFILE")]
    pub profile: Option<String>,

    /// List configured profiles
    #[arg(long)]
    pub list_profiles: bool,

    /// Show the settings of a profile
    #[arg(long)]
    pub show_profile: Option<String>,
}

impl Cli {
    pub fn validate(&self) -> anyhow::Result<()> {
        let source = self
            .source
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Source folder is required (or use --profile)"))?;
        let replica = self
            .replica
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Replica folder is required (or use --profile)"))?;
        let interval = self
            .interval
            .ok_or_else(|| anyhow::anyhow!("Polling interval is required (or use --profile)"))?;

        if interval.is_zero() && !self.once {
            anyhow::bail!("Polling interval must be greater than zero (use --once for a single pass)");
        }

        if self.max_depth == 0 {
            anyhow::bail!("--max-depth must be at least 1");
        }

        let source_abs = absolute(source);
        let replica_abs = absolute(replica);
        if source_abs == replica_abs {
            anyhow::bail!(
                "Source and replica are the same folder: {}",
                source.display()
            );
        }
        if replica_abs.starts_with(&source_abs) {
            anyhow::bail!(
                "Replica {} is inside source {}; it would be mirrored into itself",
                replica.display(),
                source.display()
            );
        }
        if source_abs.starts_with(&replica_abs) {
            anyhow::bail!(
                "Source {} is inside replica {}; it would be deleted as an extraneous entry",
                source.display(),
                replica.display()
            );
        }

        Ok(())
    }

    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::WARN;
        }

        match self.verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

/// Best-effort absolute form for overlap checks; missing paths are left to
/// the startup existence check
fn absolute(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
