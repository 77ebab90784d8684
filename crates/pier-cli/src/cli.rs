//! Command-line definition and logging setup.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use pier_common::constants::{DEFAULT_CONFIG_PATH, DEFAULT_MOUNT_FILE};
use pier_runtime::orchestrator::Options;
use tracing_subscriber::EnvFilter;

/// Bootstrap a container, then exec the application.
#[derive(Parser, Debug)]
#[command(name = "pier", version, about, long_about = None)]
pub struct Cli {
    /// Path to the local JSON config file.
    #[arg(long, env = "PIER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Write the environment to this file instead of `env_file_path`.
    #[arg(long, env = "PIER_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// Merge an existing env file into the environment before rewriting it.
    #[arg(long)]
    pub reuse_env: bool,

    /// File name of the mount manifest.
    #[arg(long, default_value = DEFAULT_MOUNT_FILE)]
    pub mount_file: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Command to exec once the environment is prepared.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

impl Cli {
    /// Splits the arguments into orchestrator options and the command.
    pub fn into_parts(self) -> (Options, Vec<String>) {
        let options = Options {
            config_path: self.config,
            env_file: self.env_file,
            reuse_env: self.reuse_env,
            mount_file: self.mount_file,
        };
        (options, self.command)
    }
}

/// Installs the global subscriber, logging to stderr so the application's
/// stdout stays clean. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_after_options_is_captured_verbatim() {
        let cli = Cli::parse_from([
            "pier",
            "--config",
            "/etc/pier.json",
            "nginx",
            "-g",
            "daemon off;",
        ]);
        let (options, command) = cli.into_parts();
        assert_eq!(options.config_path, PathBuf::from("/etc/pier.json"));
        assert_eq!(command, vec!["nginx", "-g", "daemon off;"]);
    }

    #[test]
    fn defaults_apply_without_arguments() {
        let cli = Cli::parse_from(["pier"]);
        assert_eq!(cli.mount_file, "Mountfile");
        assert_eq!(cli.log_format, LogFormat::Text);
        assert!(!cli.reuse_env);
        assert!(cli.command.is_empty());
    }

    #[test]
    fn double_dash_separates_command() {
        let cli = Cli::parse_from(["pier", "--reuse-env", "--", "--weird-program", "x"]);
        assert!(cli.reuse_env);
        assert_eq!(cli.command, vec!["--weird-program", "x"]);
    }

    #[test]
    fn json_log_format_is_accepted() {
        let cli = Cli::parse_from(["pier", "--log-format", "json", "true"]);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.command, vec!["true"]);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
