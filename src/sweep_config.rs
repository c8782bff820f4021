//! Configuration for photosweep, read from `.photosweep/sweep.toml`.
//!
//! Layered: file → environment → CLI. Every field has a default, so an empty
//! or missing file is a valid configuration.
//!
//! # Configuration File Format
//!
//! ```toml
//! [workflow]
//! classification_on_swipe = false
//! daily_task_target = 0
//! filter = { mode = "unfiled" }
//!
//! [ledger]
//! capacity = 1
//!
//! [classify]
//! transfer = "copy"
//! album_root = "Pictures"
//!
//! [logging]
//! level = "info"
//! json = false
//! dir = "/var/log/photosweep"
//! ```
//!
//! Environment overrides: `PHOTOSWEEP_TRANSFER`, `PHOTOSWEEP_LEDGER_CAPACITY`,
//! `PHOTOSWEEP_LOG`.

use anyhow::{Context, Result};
use photosweep_common::FilterMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::classify::TransferKind;
use crate::engine::EngineOptions;
use crate::ledger::DEFAULT_CAPACITY;

pub const CONFIG_DIR: &str = ".photosweep";
pub const CONFIG_FILE: &str = "sweep.toml";

/// Initial workflow preferences, used until a preference source says
/// otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowSection {
    /// Assign albums while swiping (drops the CLASSIFY stage)
    #[serde(default)]
    pub classification_on_swipe: bool,
    /// Daily quota for daily-task sessions; 0 disables the cap
    #[serde(default)]
    pub daily_task_target: u32,
    /// Which unsorted photos the swipe stage offers
    #[serde(default)]
    pub filter: FilterMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSection {
    /// Number of undoable steps
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifySection {
    #[serde(default)]
    pub transfer: TransferKind,
    /// Prefix of album paths derived from album names
    #[serde(default = "default_album_root")]
    pub album_root: String,
}

fn default_album_root() -> String {
    "Pictures".to_string()
}

impl Default for ClassifySection {
    fn default() -> Self {
        Self {
            transfer: TransferKind::default(),
            album_root: default_album_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
    /// Also write daily-rolling log files here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            dir: None,
        }
    }
}

/// The complete sweep.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepToml {
    #[serde(default)]
    pub workflow: WorkflowSection,
    #[serde(default)]
    pub ledger: LedgerSection,
    #[serde(default)]
    pub classify: ClassifySection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl SweepToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse sweep.toml")
    }

    /// Load `sweep.toml` from `config_dir`, falling back to the per-user
    /// file and then to defaults.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Self::load(&config_path);
        }
        match user_config_file() {
            Some(user_path) if user_path.exists() => Self::load(&user_path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize sweep.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Transfer kind, with `PHOTOSWEEP_TRANSFER` taking precedence.
    pub fn transfer(&self) -> TransferKind {
        if let Ok(value) = std::env::var("PHOTOSWEEP_TRANSFER") {
            match value.parse() {
                Ok(kind) => return kind,
                Err(e) => warn!(error = %e, "ignoring PHOTOSWEEP_TRANSFER"),
            }
        }
        self.classify.transfer
    }

    /// Undo capacity, with `PHOTOSWEEP_LEDGER_CAPACITY` taking precedence.
    pub fn ledger_capacity(&self) -> usize {
        if let Ok(value) = std::env::var("PHOTOSWEEP_LEDGER_CAPACITY") {
            match value.parse::<usize>() {
                Ok(capacity) => return capacity.max(1),
                Err(e) => warn!(value = %value, error = %e, "ignoring PHOTOSWEEP_LEDGER_CAPACITY"),
            }
        }
        self.ledger.capacity.max(1)
    }

    /// Log filter, with `PHOTOSWEEP_LOG` taking precedence.
    pub fn log_level(&self) -> String {
        std::env::var("PHOTOSWEEP_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.ledger.capacity == 0 {
            warnings.push("ledger.capacity is 0; at least one undo step is always kept".to_string());
        }
        if self.classify.album_root.trim().is_empty() {
            warnings.push(
                "classify.album_root is empty; fallback album paths will be relative".to_string(),
            );
        }
        if self.logging.level.trim().is_empty() {
            warnings.push("logging.level is empty; 'info' will be used".to_string());
        }
        if let Some(dir) = &self.logging.dir
            && dir.as_os_str().is_empty()
        {
            warnings.push("logging.dir is set but empty".to_string());
        }

        warnings
    }
}

/// Per-user configuration file (`~/.config/photosweep/sweep.toml` on Linux).
pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("photosweep").join(CONFIG_FILE))
}

/// Configuration combining the file with runtime overrides.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub project_dir: PathBuf,
    /// Path to the .photosweep directory
    pub config_dir: PathBuf,
    pub toml: SweepToml,
    /// CLI override for the transfer kind
    pub cli_transfer: Option<TransferKind>,
    /// CLI override for the log filter
    pub cli_log_level: Option<String>,
}

impl SweepConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR);
        let toml = SweepToml::load_or_default(&config_dir)?;

        Ok(Self {
            project_dir,
            config_dir,
            toml,
            cli_transfer: None,
            cli_log_level: None,
        })
    }

    pub fn with_cli_args(
        project_dir: PathBuf,
        transfer: Option<TransferKind>,
        log_level: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.cli_transfer = transfer;
        config.cli_log_level = log_level;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Transfer kind (CLI → env → file).
    pub fn transfer(&self) -> TransferKind {
        self.cli_transfer.unwrap_or_else(|| self.toml.transfer())
    }

    pub fn ledger_capacity(&self) -> usize {
        self.toml.ledger_capacity()
    }

    /// Log filter (CLI → env → file).
    pub fn log_level(&self) -> String {
        self.cli_log_level
            .clone()
            .unwrap_or_else(|| self.toml.log_level())
    }

    /// Logging section with overrides applied.
    pub fn logging(&self) -> LoggingSection {
        LoggingSection {
            level: self.log_level(),
            ..self.toml.logging.clone()
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            ledger_capacity: self.ledger_capacity(),
            transfer: self.transfer(),
            album_root: self.toml.classify.album_root.clone(),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
