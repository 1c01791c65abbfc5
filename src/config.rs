use anyhow::{Context, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const API_URL_ENV: &str = "TASKCAL_API_URL";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    /// Any chrono weekday name, e.g. `monday` or `Sun`.
    pub first_weekday: Weekday,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: "http://localhost:8000".into(),
            first_weekday: Weekday::Mon,
            log_level: "info".into(),
        }
    }
}

impl Config {
    /// Reads `path` if present, otherwise defaults, then applies the
    /// `TASKCAL_API_URL` override.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
            serde_yaml::from_str(&data).with_context(|| format!("parsing {:?}", path))?
        } else {
            Config::default()
        };
        Ok(config.with_api_url_override(std::env::var(API_URL_ENV).ok()))
    }

    pub fn with_api_url_override(mut self, api_url: Option<String>) -> Self {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_url = url;
        }
        self.api_url = self.api_url.trim().trim_end_matches('/').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.yml")).unwrap();
        assert_eq!(config.first_weekday, Weekday::Mon);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "first_weekday: sunday\n").unwrap();
        let config: Config = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.first_weekday, Weekday::Sun);
        assert_eq!(config.api_url, Config::default().api_url);
    }

    #[test]
    fn override_wins_and_trailing_slash_is_dropped() {
        let config = Config::default().with_api_url_override(Some("https://cal.example/api/".into()));
        assert_eq!(config.api_url, "https://cal.example/api");
    }

    #[test]
    fn blank_override_is_ignored() {
        let config = Config::default().with_api_url_override(Some("  ".into()));
        assert_eq!(config.api_url, "http://localhost:8000");
    }
}
