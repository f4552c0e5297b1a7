use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Browser-automation knobs for session acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Chrome/Chromium binary. Auto-detected when unset.
    pub chrome_executable: Option<String>,

    /// Headless runs are possible but the portal's token step is easier to
    /// follow with a visible window.
    pub headless: bool,

    /// Pause after each click, mimicking a human pace.
    pub slow_motion_ms: u64,

    /// How long each UI step may wait for its target element.
    pub step_timeout_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            headless: false,
            slow_motion_ms: 220,
            step_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserSettings,

    /// Override for the session cache directory.
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    /// Load the config file, or fall back to defaults when it is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_portal_friendly_pace() {
        let settings = BrowserSettings::default();
        assert!(!settings.headless);
        assert_eq!(settings.slow_motion_ms, 220);
        assert_eq!(settings.step_timeout_secs, 30);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: Config = toml::from_str("[browser]\nheadless = true\n").unwrap();
        assert!(config.browser.headless);
        assert_eq!(config.browser.slow_motion_ms, 220);
        assert!(config.cache_dir.is_none());
    }
}
