// Configuration management for the redstone command-line tool
//
// Defaults for numeric encoding and payload metadata, stored as JSON in the
// XDG config directory. Every value can be overridden on the command line.

use anyhow::{Context, Result};
use colored::Colorize;
use redstone_protocol::UnsignedMetadata;
use redstone_protocol::constants::{DEFAULT_NUM_VALUE_BS, DEFAULT_NUM_VALUE_DECIMALS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_VERSION: u32 = 1;
const MAX_DECIMALS: u8 = 36;
const MAX_DATA_POINT_BYTE_SIZE: usize = 32;
const DEFAULT_METADATA_VERSION: &str = "1";
const DEFAULT_METADATA_CLIENT: &str = "redstone-cli";

/// redstone configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Configuration schema version for future migrations
    pub version: u32,

    /// Decimals used to encode and decode numeric values
    pub decimals: u8,

    /// Byte width of numeric values
    pub data_point_byte_size: usize,

    /// Version written into payload metadata
    pub metadata_version: String,

    /// Client name written into payload metadata
    pub metadata_client: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            decimals: DEFAULT_NUM_VALUE_DECIMALS,
            data_point_byte_size: DEFAULT_NUM_VALUE_BS,
            metadata_version: DEFAULT_METADATA_VERSION.to_string(),
            metadata_client: DEFAULT_METADATA_CLIENT.to_string(),
        }
    }
}

impl CliConfig {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the file in the XDG config
    /// directory is used if present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let path = Self::config_path()?;
                if path.exists() {
                    Self::load_from_file(&path)?
                } else {
                    log::debug!("No config file at {}, using defaults", path.display());
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Default config file location
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory (XDG_CONFIG_HOME or ~/.config)")?;

        Ok(config_dir.join("redstone").join("config.json"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.decimals > MAX_DECIMALS {
            anyhow::bail!(
                "Invalid decimals {}: must be at most {MAX_DECIMALS}",
                self.decimals
            );
        }

        if self.data_point_byte_size == 0 || self.data_point_byte_size > MAX_DATA_POINT_BYTE_SIZE {
            anyhow::bail!(
                "Invalid data_point_byte_size {}: must be between 1 and {MAX_DATA_POINT_BYTE_SIZE}",
                self.data_point_byte_size
            );
        }

        Ok(())
    }

    /// Metadata bytes appended to prepared payloads
    pub fn unsigned_metadata(&self) -> Vec<u8> {
        UnsignedMetadata::versioned(&self.metadata_version, &self.metadata_client)
    }
}

/// Show the effective configuration
pub fn show(config: &CliConfig, explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => CliConfig::config_path()?,
    };

    println!();
    println!("{}", "Current configuration:".bold());
    println!("  Decimals:             {}", config.decimals);
    println!("  Data point byte size: {}", config.data_point_byte_size);
    println!("  Metadata version:     {}", config.metadata_version);
    println!("  Metadata client:      {}", config.metadata_client);
    println!();
    if path.exists() {
        println!("Config file: {}", path.display().to_string().dimmed());
    } else {
        println!(
            "Config file: {} {}",
            path.display().to_string().dimmed(),
            "(not present, using defaults)".dimmed()
        );
    }
    println!();

    Ok(())
}

/// Write the defaults to the config file
pub fn init(explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => CliConfig::config_path()?,
    };

    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }

    CliConfig::default().save_to(&path)?;
    println!("{} Configuration saved to {}", "✓".green(), path.display());
    Ok(())
}
