//! Settings management
//!
//! Configuration file: ~/.config/seedkeep/config.yaml
//!
//! Every setting has a default, so a missing file is a valid configuration
//! (one with no account files, which seed-dependent commands reject).

use crate::error::SeedkeepError;
use anyhow::{bail, Context, Result};
use seedkeep_core::Paths;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Global seedkeep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory that relative account file names are resolved against
    #[serde(default = "default_settings_dir")]
    pub settings_dir: String,

    /// Account files, in load order. The first one is the default for new accounts.
    #[serde(default)]
    pub accounts_files: Vec<String>,

    /// age identity used to open encrypted account files
    #[serde(default)]
    pub identity_file: Option<String>,

    /// age recipients that new encrypted files are written to
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Archive whose age is compared against the account files
    #[serde(default)]
    pub archive_file: Option<String>,

    /// Days an archive may lag behind the account files before it is stale
    #[serde(default = "default_archive_stale")]
    pub archive_stale: u32,

    /// Field produced by recognition rules that do not give a script
    #[serde(default = "default_field")]
    pub default_field: String,

    /// Log every account tried during discovery
    #[serde(default)]
    pub verbose: bool,
}

fn default_settings_dir() -> String {
    Paths::new().config.to_string_lossy().to_string()
}

fn default_archive_stale() -> u32 {
    1
}

fn default_field() -> String {
    "passcode".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            settings_dir: default_settings_dir(),
            accounts_files: Vec::new(),
            identity_file: None,
            recipients: Vec::new(),
            archive_file: None,
            archive_stale: default_archive_stale(),
            default_field: default_field(),
            verbose: false,
        }
    }
}

impl Settings {
    /// Load settings from the default location
    pub fn load() -> Result<Self> {
        let paths = Paths::new();
        Self::load_from(&paths.config_file())
    }

    /// Load settings from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings from {:?}", path))?;
            let settings: Self = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse settings from {:?}", path))?;
            settings
        } else {
            Self::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Settings rooted in a directory, used by `init` and tests
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            settings_dir: dir.to_string_lossy().to_string(),
            ..Self::default()
        }
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that cannot describe a usable set of account files
    pub fn validate(&self) -> Result<()> {
        if self.default_field.trim().is_empty() {
            bail!(SeedkeepError::Config("default_field may not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for name in &self.accounts_files {
            if name.trim().is_empty() {
                bail!(SeedkeepError::Config(
                    "accounts_files contains an empty entry".to_string()
                ));
            }
            if !seen.insert(name.as_str()) {
                bail!(SeedkeepError::Config(format!(
                    "{}: listed more than once in accounts_files",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Expanded settings directory
    pub fn settings_dir(&self) -> PathBuf {
        PathBuf::from(expand_path(&self.settings_dir))
    }

    /// Resolve a file name against the settings directory
    pub fn resolve(&self, name: &str) -> PathBuf {
        let expanded = PathBuf::from(expand_path(name));
        if expanded.is_absolute() {
            expanded
        } else {
            self.settings_dir().join(expanded)
        }
    }

    /// Account files as absolute paths, in load order
    pub fn accounts_paths(&self) -> Vec<PathBuf> {
        self.accounts_files.iter().map(|f| self.resolve(f)).collect()
    }

    /// Identity file, falling back to the standard location
    pub fn identity_path(&self) -> PathBuf {
        match &self.identity_file {
            Some(file) => self.resolve(file),
            None => self.settings_dir().join("keys").join("identity.key"),
        }
    }

    pub fn archive_path(&self) -> Option<PathBuf> {
        self.archive_file.as_deref().map(|f| self.resolve(f))
    }
}

/// Expand ~ and environment variables in path
fn expand_path(path: &str) -> String {
    shellexpand::tilde(path).to_string()
}
