//! CLI argument definitions for the actscript binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use actscript_core::config::QueueMode;
use clap::{Parser, Subcommand};

/// actscript - feed action scripts to a game through simulated input.
#[derive(Parser, Debug)]
#[command(name = "actscript", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read scripts from stdin, one per line, and execute them.
    Run {
        /// Record inputs with the mock driver instead of sending them.
        #[arg(long = "dry-run")]
        dry_run: bool,

        /// Print a JSON status snapshot this often; 0 disables it.
        #[arg(long = "status-interval-ms", default_value_t = 0)]
        status_interval_ms: u64,

        /// Override the configured queue mode (replace or merge).
        #[arg(long = "mode")]
        mode: Option<QueueMode>,
    },
    /// Parse and validate a script without running it.
    Check {
        /// The script, e.g. "w(2)&e,q".
        script: String,
    },
    /// Print the effective configuration as TOML.
    Config,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > ACTSCRIPT_CONFIG env var > ~/.actscript/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("ACTSCRIPT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".actscript").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".actscript").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let args = CliArgs::try_parse_from([
            "actscript",
            "run",
            "--dry-run",
            "--status-interval-ms",
            "250",
            "--mode",
            "merge",
        ])
        .unwrap();
        match args.command {
            Command::Run {
                dry_run,
                status_interval_ms,
                mode,
            } => {
                assert!(dry_run);
                assert_eq!(status_interval_ms, 250);
                assert_eq!(mode, Some(QueueMode::Merge));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_check_with_global_config() {
        let args =
            CliArgs::try_parse_from(["actscript", "check", "w(2)&e,q", "-c", "/tmp/a.toml"])
                .unwrap();
        assert!(matches!(args.command, Command::Check { ref script } if script == "w(2)&e,q"));
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/a.toml"));
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(CliArgs::try_parse_from(["actscript", "run", "--mode", "shuffle"]).is_err());
    }

    #[test]
    fn test_log_level_priority() {
        let args = CliArgs::try_parse_from(["actscript", "config"]).unwrap();
        assert_eq!(args.resolve_log_level("warn"), "warn");

        let args = CliArgs::try_parse_from(["actscript", "-l", "debug", "config"]).unwrap();
        assert_eq!(args.resolve_log_level("warn"), "debug");
    }

    #[test]
    fn test_default_config_path_file_name() {
        assert!(default_config_path().ends_with("config.toml"));
    }
}
