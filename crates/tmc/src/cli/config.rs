//! Configuration for tmc
//!
//! Optional TOML file at `$TMC_HOME/config.toml` (or `--config`). Command
//! line flags always win over file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tmc_features::TransformOptions;
use tmc_logging::{logs_dir, tmc_home};

/// Default infix for transformed output files
pub const DEFAULT_SUFFIX: &str = "transformed";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TmcConfig {
    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub transform: TransformConfig,
}

/// Labels encoded as 0 and 1; both unset means declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positive: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Continuous features with |correlation| at or below this are ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_below: Option<f64>,

    /// Output files are named `<stem>.<suffix>.<ext>`
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            ignore_below: None,
            suffix: default_suffix(),
        }
    }
}

impl TransformConfig {
    pub fn options(&self) -> TransformOptions {
        TransformOptions {
            ignore_below: self.ignore_below,
        }
    }
}

/// Configuration together with the file it came from
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: TmcConfig,
    /// `None` when no file was found and defaults apply
    pub source: Option<PathBuf>,
}

/// Get the default config path: <home>/config.toml
pub fn default_config_path() -> PathBuf {
    tmc_home().join("config.toml")
}

impl TmcConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: TmcConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.check()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    #[cfg(test)]
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// An explicit path must exist; the default path is optional.
    pub fn resolve(explicit: Option<&Path>) -> Result<ResolvedConfig> {
        if let Some(path) = explicit {
            return Ok(ResolvedConfig {
                config: Self::load(path)?,
                source: Some(path.to_path_buf()),
            });
        }
        let path = default_config_path();
        if path.is_file() {
            Ok(ResolvedConfig {
                config: Self::load(&path)?,
                source: Some(path),
            })
        } else {
            Ok(ResolvedConfig {
                config: Self::default(),
                source: None,
            })
        }
    }

    fn check(&self) -> Result<()> {
        if let Some(threshold) = self.transform.ignore_below {
            anyhow::ensure!(
                threshold.is_finite() && threshold >= 0.0,
                "transform.ignore_below must be a non-negative number, got {}",
                threshold
            );
        }
        check_suffix(&self.transform.suffix).context("Invalid transform.suffix")?;
        Ok(())
    }
}

/// An output-name infix must be a non-empty file name fragment.
pub fn check_suffix(suffix: &str) -> Result<()> {
    anyhow::ensure!(
        !suffix.is_empty() && !suffix.contains(['/', '\\']),
        "suffix must be a non-empty file name fragment without path separators, got '{}'",
        suffix
    );
    Ok(())
}

/// Arguments for the config command
#[derive(Debug)]
pub struct ConfigArgs {
    pub json: bool,
}

/// Run the config command - shows resolved paths and effective settings
pub fn run(args: ConfigArgs, resolved: &ResolvedConfig) -> Result<()> {
    let home = tmc_home();
    let logs = logs_dir();
    let config_path = resolved.source.clone().unwrap_or_else(default_config_path);

    if args.json {
        let report = serde_json::json!({
            "home": home.to_string_lossy(),
            "logs": {
                "path": logs.to_string_lossy(),
                "exists": logs.exists(),
            },
            "config_file": {
                "path": config_path.to_string_lossy(),
                "exists": config_path.exists(),
            },
            "effective": resolved.config,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("TMC CONFIGURATION");
        println!("=================");
        println!();
        println!("Home:        {}", home.display());
        println!("Logs:        {}", logs.display());
        println!(
            "Config file: {}{}",
            config_path.display(),
            if config_path.exists() { "" } else { " (not found, using defaults)" }
        );
        println!();
        println!("Effective settings:");
        print!("{}", toml::to_string_pretty(&resolved.config)?);
    }

    Ok(())
}
