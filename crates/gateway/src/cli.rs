//! Command-line interface and config file loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use cl_domain::config::Config;

/// Default config file looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "codeloom.toml";

#[derive(Debug, Parser)]
#[command(name = "codeloom", about = "Local agent service bridging a terminal client and an LLM")]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the service (the default).
    Serve,
    /// Validate the configuration and exit.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the version.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Validate,
}

/// Load the configuration.
///
/// An explicitly passed path must exist; otherwise `codeloom.toml` is
/// used when present and built-in defaults when not. Unknown keys fail
/// the parse.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        }
    };

    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            let config: Config = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
            tracing::debug!(path = %path.display(), "config loaded");
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/codeloom.toml")));
        assert!(err.is_err());
    }

    #[test]
    fn explicit_file_is_parsed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("codeloom.toml");
        std::fs::write(&path, "[agent]\nmax_turns = 2\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.agent.max_turns, 2);
    }

    #[test]
    fn unknown_keys_fail_the_parse() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("codeloom.toml");
        std::fs::write(&path, "[agent]\nmax_turn = 2\n").unwrap();

        assert!(load_config(Some(&path)).is_err());
    }
}
