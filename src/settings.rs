use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::detector::MatchConfig;
use crate::error::LibraryError;

pub const DEFAULT_WEBDAV_URL: &str = "https://dav.jianguoyun.com/dav/";
pub const DEFAULT_REMOTE_FILENAME: &str = "my_library.bib";

/// Connection details for the WebDAV-hosted library file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebDavConfig {
    /// Collection URL the library file lives in
    pub url: String,

    pub username: String,

    /// Application password, sent as HTTP basic auth
    #[serde(default)]
    pub app_password: String,

    /// Name of the remote `.bib` file
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Request timeout in seconds (HTTP client default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_filename() -> String {
    DEFAULT_REMOTE_FILENAME.to_string()
}

impl Default for WebDavConfig {
    fn default() -> Self {
        WebDavConfig {
            url: DEFAULT_WEBDAV_URL.to_string(),
            username: String::new(),
            app_password: String::new(),
            filename: default_filename(),
            timeout_secs: None,
        }
    }
}

impl WebDavConfig {
    /// Check the record is complete enough to talk to a server
    pub fn validate(&self) -> std::result::Result<(), LibraryError> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(LibraryError::InvalidConfig(format!(
                "WebDAV URL must start with http:// or https:// (got '{}')",
                self.url
            )));
        }
        if self.username.trim().is_empty() || self.app_password.is_empty() {
            return Err(LibraryError::InvalidConfig(
                "WebDAV username and app password must be set".to_string(),
            ));
        }
        if self.filename.trim().is_empty() {
            return Err(LibraryError::InvalidConfig(
                "remote filename must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Password replaced by asterisks, for display
    pub fn masked_password(&self) -> String {
        "*".repeat(self.app_password.chars().count().min(12))
    }
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webdav: Option<WebDavConfig>,

    #[serde(default)]
    pub matching: MatchConfig,
}

impl Settings {
    /// Load configuration; a missing file yields defaults
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let settings: Settings =
            toml::from_str(&content).context("Failed to parse config file")?;
        settings.validate_matching()?;

        Ok(settings)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    fn validate_matching(&self) -> std::result::Result<(), LibraryError> {
        let t = self.matching.title_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(LibraryError::InvalidConfig(format!(
                "matching.title_threshold must be in (0, 1], got {t}"
            )));
        }
        Ok(())
    }

    /// WebDAV record, validated, or an error naming what is missing
    pub fn require_webdav(&self) -> std::result::Result<&WebDavConfig, LibraryError> {
        let config = self.webdav.as_ref().ok_or_else(|| {
            LibraryError::InvalidConfig(
                "WebDAV is not configured. Run 'paperref config --url ... --username ... --password ...' first."
                    .to_string(),
            )
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.matching.title_threshold, 0.85);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        let settings = Settings {
            webdav: Some(WebDavConfig {
                url: "https://dav.example.com/dav/".to_string(),
                username: "me@example.com".to_string(),
                app_password: "secret".to_string(),
                filename: "refs.bib".to_string(),
                timeout_secs: Some(20),
            }),
            matching: MatchConfig {
                title_threshold: 0.9,
            },
        };

        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_uses_field_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[webdav]\nurl = \"https://dav.example.com/\"\nusername = \"u\"\n",
        )
        .unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        let webdav = loaded.webdav.unwrap();
        assert_eq!(webdav.filename, "my_library.bib");
        assert_eq!(webdav.app_password, "");
        assert_eq!(loaded.matching, MatchConfig::default());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[matching]\ntitle_threshold = 1.5\n").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_require_webdav() {
        let mut settings = Settings::default();
        assert!(settings.require_webdav().is_err());

        settings.webdav = Some(WebDavConfig {
            username: "u".to_string(),
            app_password: "p".to_string(),
            ..Default::default()
        });
        assert!(settings.require_webdav().is_ok());

        settings.webdav.as_mut().unwrap().url = "ftp://nope".to_string();
        assert!(settings.require_webdav().is_err());
    }
}
