use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for the filesystem collaborators, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Path fragments that exclude a file from versioning.
    pub ignore_patterns: Vec<String>,
    /// Files larger than this get their content marked unavailable.
    pub max_content_length: u64,
    /// Debounce window for filesystem events.
    pub debounce_millis: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        WatchSettings {
            ignore_patterns: vec![
                ".git".to_string(),
                "target".to_string(),
                "node_modules".to_string(),
                ".histree".to_string(),
            ],
            max_content_length: 1024 * 1024,
            debounce_millis: 500,
        }
    }
}

impl WatchSettings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_millis)
    }

    pub fn should_ignore(&self, relative_path: &str) -> bool {
        for pattern in &self.ignore_patterns {
            if relative_path.contains(pattern) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = WatchSettings::default();
        assert!(!settings.ignore_patterns.is_empty());
        assert_eq!(settings.max_content_length, 1024 * 1024);
        assert_eq!(settings.debounce(), Duration::from_millis(500));
    }

    #[test]
    fn test_should_ignore() {
        let settings = WatchSettings::default();

        assert!(settings.should_ignore("target/debug"));
        assert!(settings.should_ignore(".git/config"));
        assert!(!settings.should_ignore("src/main.rs"));
    }

    #[test]
    fn test_parse_toml() {
        let settings: WatchSettings = toml::from_str(
            r#"
            ignore_patterns = ["build"]
            max_content_length = 2048
            "#,
        )
        .unwrap();

        assert_eq!(settings.ignore_patterns, vec!["build"]);
        assert_eq!(settings.max_content_length, 2048);
        assert_eq!(settings.debounce_millis, 500);
    }
}
