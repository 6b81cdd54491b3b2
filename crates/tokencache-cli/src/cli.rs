use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "tokencache",
    about = "Inspect and manage the encrypted local token cache",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to `show` when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the cache location and the keys it holds (never values).
    Show,
    /// Store a value under a key.
    Set { key: String, value: String },
    /// Remove a key.
    Remove { key: String },
    /// Empty the cache and delete its file.
    Clear,
    /// Round-trip a probe blob through encryption and the file system.
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
    fn defaults_to_show_when_missing_subcommand() {
        let cli = Cli::try_parse_from(["tokencache"]).expect("parse should succeed");
        assert_eq!(cli.command, None);
    }

    #[test]
    fn parses_set_subcommand() {
        let cli = Cli::try_parse_from(["tokencache", "set", "account/alice", "rt-1"])
            .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Some(Command::Set {
                key: "account/alice".into(),
                value: "rt-1".into(),
            })
        );
    }

    #[test]
    fn parses_clear_subcommand() {
        let cli = Cli::try_parse_from(["tokencache", "clear"]).expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Clear));
    }

    #[test]
    fn parses_config_init_subcommand() {
        let cli =
            Cli::try_parse_from(["tokencache", "config", "init"]).expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Config(ConfigCommand::Init)));
    }

    #[test]
    fn set_requires_a_value() {
        assert!(Cli::try_parse_from(["tokencache", "set", "only-key"]).is_err());
    }
}
