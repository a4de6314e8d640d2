use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use config::CliConfig;

mod commands;
mod config;

/// Sign, assemble and inspect RedStone oracle payloads
#[derive(Parser, Debug)]
#[command(name = "redstone")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Display detailed diagnostic information
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Config file (defaults to <config dir>/redstone/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the checksummed address of a private key
    Address {
        /// secp256k1 private key as hex
        #[arg(long)]
        private_key: String,
    },
    /// Build and sign a data package, printing its hex
    Sign {
        /// secp256k1 private key as hex
        #[arg(long)]
        private_key: String,

        /// Data point as FEED=VALUE (repeatable)
        #[arg(long = "point", value_name = "FEED=VALUE", required = true)]
        points: Vec<String>,

        /// Timestamp in milliseconds (defaults to now)
        #[arg(long)]
        timestamp: Option<u64>,

        /// Treat values as strings instead of numbers
        #[arg(long)]
        string: bool,

        /// Decimals for numeric values
        #[arg(long)]
        decimals: Option<u8>,

        /// Byte width of numeric values
        #[arg(long)]
        byte_size: Option<usize>,
    },
    /// Concatenate signed packages into a payload, printing its hex
    Prepare {
        /// Signed data packages as hex, in payload order
        #[arg(required = true)]
        packages: Vec<String>,

        /// Unsigned metadata (defaults to "<version>#<client>" from config)
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Parse a payload from the tail of a hex blob
    Parse {
        /// Hex blob ending with a RedStone payload
        payload: String,

        /// Recover and print each package's signer
        #[arg(long)]
        verify: bool,

        /// Decimals for displaying numeric values
        #[arg(long)]
        decimals: Option<u8>,
    },
    /// Sign canonical JSON, printing the signature
    SignData {
        /// secp256k1 private key as hex
        #[arg(long)]
        private_key: String,

        /// JSON document to sign
        json: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Display current configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show configuration file path
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let Some(command) = cli.command else {
        // No subcommand provided, print help
        Cli::command().print_help()?;
        std::process::exit(0);
    };

    let explicit = cli.config.as_deref();

    match command {
        Commands::Address { private_key } => commands::address(&private_key)?,
        Commands::Sign {
            private_key,
            points,
            timestamp,
            string,
            decimals,
            byte_size,
        } => {
            let config = CliConfig::load(explicit)?;
            commands::sign(&commands::SignOptions {
                private_key: &private_key,
                points: &points,
                timestamp,
                strings: string,
                decimals: decimals.unwrap_or(config.decimals),
                byte_size: byte_size.unwrap_or(config.data_point_byte_size),
            })?;
        }
        Commands::Prepare { packages, metadata } => {
            let config = CliConfig::load(explicit)?;
            let metadata =
                metadata.map_or_else(|| config.unsigned_metadata(), String::into_bytes);
            commands::prepare(&packages, &metadata)?;
        }
        Commands::Parse {
            payload,
            verify,
            decimals,
        } => {
            let config = CliConfig::load(explicit)?;
            commands::parse(&payload, verify, decimals.unwrap_or(config.decimals))?;
        }
        Commands::SignData { private_key, json } => commands::sign_data(&private_key, &json)?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = CliConfig::load(explicit)?;
                config::show(&config, explicit)?;
            }
            ConfigCommands::Init { force } => config::init(explicit, force)?,
            ConfigCommands::Path => {
                let path = match explicit {
                    Some(path) => path.to_path_buf(),
                    None => CliConfig::config_path()?,
                };
                println!("{}", path.display());
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sign_requires_points() {
        let result = Cli::try_parse_from(["redstone", "sign", "--private-key", "0x01"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sign_collects_repeated_points() {
        let cli = Cli::try_parse_from([
            "redstone",
            "sign",
            "--private-key",
            "0x01",
            "--point",
            "ETH=2000",
            "--point",
            "BTC=42000",
            "--timestamp",
            "1654353400000",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Sign {
                points, timestamp, ..
            }) => {
                assert_eq!(points, vec!["ETH=2000", "BTC=42000"]);
                assert_eq!(timestamp, Some(1_654_353_400_000));
            }
            other => panic!("Expected sign command, got {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["redstone", "parse", "00", "--verify", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Parse { verify: true, .. })));
    }
}
