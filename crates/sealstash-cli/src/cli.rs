use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "sealstash",
    about = "Encrypted single-file key-value store",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Directory holding `data.encrypted`; overrides the config file.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the value stored under a key.
    Get { key: String },
    /// Store a value (parsed as JSON, otherwise kept as a string).
    Set { key: String, value: String },
    /// Remove a key.
    Delete { key: String },
    /// Print every stored key and value.
    List,
    /// Discard all stored data.
    Reset,
    /// Check the store with a set/get/delete round trip.
    Health,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_subcommand() {
        let cli = Cli::try_parse_from(["sealstash", "get", "token"]).expect("parse should succeed");
        assert_eq!(
            cli.command,
            Command::Get {
                key: "token".into()
            }
        );
        assert_eq!(cli.data_dir, None);
    }

    #[test]
    fn parses_set_with_global_data_dir() {
        let cli = Cli::try_parse_from([
            "sealstash",
            "set",
            "token",
            "{\"a\":1}",
            "--data-dir",
            "/tmp/vault",
        ])
        .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Command::Set {
                key: "token".into(),
                value: "{\"a\":1}".into()
            }
        );
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/vault")));
    }

    #[test]
    fn parses_reset_subcommand() {
        let cli = Cli::try_parse_from(["sealstash", "reset"]).expect("parse should succeed");
        assert_eq!(cli.command, Command::Reset);
    }

    #[test]
    fn parses_config_init_subcommand() {
        let cli =
            Cli::try_parse_from(["sealstash", "config", "init"]).expect("parse should succeed");
        assert_eq!(cli.command, Command::Config(ConfigCommand::Init));
    }

    #[test]
    fn requires_a_subcommand() {
        assert!(Cli::try_parse_from(["sealstash"]).is_err());
    }
}
