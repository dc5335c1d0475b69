use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.organizze.com.br/rest/v2";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// The API asks clients to identify themselves with a contact address.
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_data_dir_string")]
    pub data_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_data_dir_string() -> String {
    default_data_dir().to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            email: String::new(),
            api_token: None,
            base_url: default_base_url(),
            user_agent: None,
            data_dir: default_data_dir_string(),
            rules_path: None,
        }
    }
}

impl Settings {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir().join("exports")
    }

    pub fn rules_path(&self) -> PathBuf {
        self.rules_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir().join("rules.toml"))
    }

    /// `User-Agent` header value. Falls back to the crate name plus the
    /// account email.
    pub fn user_agent(&self) -> String {
        match &self.user_agent {
            Some(ua) if !ua.is_empty() => ua.clone(),
            _ => format!("{} ({})", env!("CARGO_PKG_NAME"), self.email),
        }
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tidyspend")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("tidyspend")
}

pub fn load_settings() -> Settings {
    load_settings_from(&settings_path())
}

pub fn load_settings_from(path: &Path) -> Settings {
    if !path.exists() {
        return Settings::default();
    }
    let content = std::fs::read_to_string(path).unwrap_or_default();
    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("ignoring unreadable settings at {}: {e}", path.display());
            Settings::default()
        }
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(settings, &settings_path())
}

pub fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| AppError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            email: "alice@example.com".to_string(),
            api_token: Some("secret".to_string()),
            data_dir: "/tmp/test".to_string(),
            ..Settings::default()
        };
        save_settings_to(&settings, &path).unwrap();
        let loaded = load_settings_from(&path);
        assert_eq!(loaded.email, "alice@example.com");
        assert_eq!(loaded.api_token.as_deref(), Some("secret"));
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_load_returns_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings_from(&dir.path().join("nope.json"));
        assert!(s.email.is_empty());
        assert!(s.api_token.is_none());
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"email": "bob@example.com"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.email, "bob@example.com");
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert!(s.rules_path.is_none());
    }

    #[test]
    fn test_load_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let s = load_settings_from(&path);
        assert!(s.email.is_empty());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("nested").join("settings.json");
        save_settings_to(&Settings::default(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_token_not_written_when_absent() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(!json.contains("api_token"));
    }

    #[test]
    fn test_user_agent_and_paths() {
        let s = Settings {
            email: "me@example.com".to_string(),
            data_dir: "/data".to_string(),
            rules_path: Some("/etc/rules.toml".to_string()),
            ..Settings::default()
        };
        assert_eq!(s.user_agent(), "tidyspend (me@example.com)");
        assert_eq!(s.logs_dir(), PathBuf::from("/data/logs"));
        assert_eq!(s.rules_path(), PathBuf::from("/etc/rules.toml"));
        let custom = Settings {
            user_agent: Some("my-script (ops@example.com)".to_string()),
            ..s
        };
        assert_eq!(custom.user_agent(), "my-script (ops@example.com)");
    }
}
