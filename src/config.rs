use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "paperref";

/// Cross-platform data directory manager
pub struct ConfigManager;

impl ConfigManager {
    /// Default workspace root (settings, saved session, cached libraries, log):
    /// - Linux: $XDG_CONFIG_HOME/paperref or ~/.config/paperref
    /// - macOS: ~/Library/Application Support/paperref
    /// - Windows: %APPDATA%\paperref
    ///
    /// `PAPERREF_HOME` overrides all of the above.
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(home) = std::env::var("PAPERREF_HOME") {
            if !home.is_empty() {
                return Ok(PathBuf::from(home));
            }
        }

        #[cfg(target_os = "linux")]
        {
            if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
                Ok(PathBuf::from(xdg_config).join(APP_DIR))
            } else {
                let home = dirs::home_dir().context("Failed to get home directory")?;
                Ok(home.join(".config").join(APP_DIR))
            }
        }

        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join("Library").join("Application Support").join(APP_DIR))
        }

        #[cfg(target_os = "windows")]
        {
            Ok(dirs::config_dir()
                .context("Failed to get Windows config directory")?
                .join(APP_DIR))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join(".paperref"))
        }
    }

    /// File log (paperref.log)
    pub fn log_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("paperref.log"))
    }

    /// Ensure the configuration directory exists
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir).with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;
        Ok(config_dir)
    }
}
