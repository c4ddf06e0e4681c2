//! Standard paths used by seedkeep

use std::path::PathBuf;

/// Name of the settings file inside the config directory
pub const CONFIG_FILE: &str = "config.yaml";

/// Standard seedkeep paths
pub struct Paths {
    /// Config directory (~/.config/seedkeep), also the default settings dir
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("seedkeep");

        Self { config }
    }

    /// Location of the settings file
    pub fn config_file(&self) -> PathBuf {
        self.config.join(CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_end_in_tool_name() {
        let paths = Paths::new();
        assert!(paths.config.ends_with("seedkeep"));
        assert_eq!(paths.config_file(), paths.config.join(CONFIG_FILE));
    }
}
