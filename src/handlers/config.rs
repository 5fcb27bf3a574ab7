//! Configuration command handlers
//!
//! Shows and edits `config.toml`, either from flags or through a short
//! interactive wizard.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use inquire::{Confirm, Password, Text};

use super::AppContext;
use crate::interactive_conflict;
use crate::settings::{Settings, WebDavConfig};

/// Flag values for `config`; `None` leaves a setting untouched
#[derive(Debug, Default, Clone)]
pub struct ConfigUpdate {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub filename: Option<String>,
    pub timeout_secs: Option<u64>,
    pub title_threshold: Option<f64>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.filename.is_none()
            && self.timeout_secs.is_none()
            && self.title_threshold.is_none()
    }

    /// Apply the flags on top of `settings`
    pub fn apply(&self, settings: &mut Settings) -> Result<()> {
        let touches_webdav = self.url.is_some()
            || self.username.is_some()
            || self.password.is_some()
            || self.filename.is_some()
            || self.timeout_secs.is_some();

        if touches_webdav {
            let webdav = settings.webdav.get_or_insert_with(WebDavConfig::default);
            if let Some(url) = &self.url {
                webdav.url = url.trim().to_string();
            }
            if let Some(username) = &self.username {
                webdav.username = username.trim().to_string();
            }
            if let Some(password) = &self.password {
                webdav.app_password = password.clone();
            }
            if let Some(filename) = &self.filename {
                webdav.filename = filename.trim().to_string();
            }
            if let Some(timeout) = self.timeout_secs {
                webdav.timeout_secs = (timeout > 0).then_some(timeout);
            }
        }

        if let Some(threshold) = self.title_threshold {
            if !(threshold > 0.0 && threshold <= 1.0) {
                bail!("Title threshold must be in (0, 1], got {threshold}");
            }
            settings.matching.title_threshold = threshold;
        }

        Ok(())
    }
}

fn display_config_summary(settings: &Settings) {
    match &settings.webdav {
        Some(webdav) => {
            println!("  {}: {}", "WebDAV URL".bold(), webdav.url);
            println!("  {}: {}", "Username".bold(), webdav.username);
            println!("  {}: {}", "App password".bold(), webdav.masked_password());
            println!("  {}: {}", "Remote file".bold(), webdav.filename);
            let timeout = webdav
                .timeout_secs
                .map(|s| format!("{s}s"))
                .unwrap_or_else(|| "client default".to_string());
            println!("  {}: {}", "Timeout".bold(), timeout);
        }
        None => println!("  {}: {}", "WebDAV".bold(), "not configured".dimmed()),
    }
    println!(
        "  {}: {:.2}",
        "Title threshold".bold(),
        settings.matching.title_threshold
    );
}

/// Handle `config --show`
pub fn handle_config_show(ctx: &AppContext) -> Result<()> {
    println!("{}", "Current Configuration:".bold());
    println!("  {}: {}", "File".bold(), ctx.workspace.settings_path().display());
    display_config_summary(&ctx.settings);
    Ok(())
}

/// Handle `config --url ... --username ...`
pub fn handle_config_update(ctx: &mut AppContext, update: &ConfigUpdate) -> Result<()> {
    if update.is_empty() {
        return handle_config_show(ctx);
    }

    let mut settings = ctx.settings.clone();
    update.apply(&mut settings)?;
    ctx.workspace
        .save_settings(&settings)
        .context("Failed to save configuration")?;
    ctx.settings = settings;

    println!("{} Configuration saved", "✓".green());
    display_config_summary(&ctx.settings);

    if let Some(webdav) = &ctx.settings.webdav {
        if let Err(e) = webdav.validate() {
            println!("{} {}", "!".yellow().bold(), e);
        }
    }
    Ok(())
}

/// Handle `config --wizard`
pub fn handle_config_wizard(ctx: &mut AppContext) -> Result<()> {
    if !interactive_conflict::is_interactive() {
        bail!("The configuration wizard needs a terminal; use the config flags instead");
    }

    println!("{}", "Configuration Wizard".cyan().bold());
    println!("{}", "=".repeat(72).cyan());
    println!("{}", "Press Enter to keep the current value.".dimmed());
    println!();

    let current = ctx.settings.webdav.clone().unwrap_or_default();

    let url = Text::new("WebDAV URL:")
        .with_default(&current.url)
        .prompt()
        .context("Failed to read URL")?;
    let username = Text::new("Username:")
        .with_default(&current.username)
        .prompt()
        .context("Failed to read username")?;
    let password = Password::new("App password:")
        .without_confirmation()
        .with_help_message("Leave empty to keep the current password")
        .prompt()
        .context("Failed to read password")?;
    let filename = Text::new("Remote file name:")
        .with_default(&current.filename)
        .prompt()
        .context("Failed to read file name")?;

    let update = ConfigUpdate {
        url: Some(url),
        username: Some(username),
        password: (!password.is_empty()).then_some(password),
        filename: Some(filename),
        ..Default::default()
    };

    let mut settings = ctx.settings.clone();
    update.apply(&mut settings)?;

    println!();
    println!("{}", "New Configuration:".cyan().bold());
    display_config_summary(&settings);

    let save = Confirm::new("Save this configuration?")
        .with_default(true)
        .prompt()
        .context("Failed to get confirmation")?;

    if save {
        ctx.workspace.save_settings(&settings)?;
        ctx.settings = settings;
        println!("\n{} Configuration saved successfully!", "✓".green().bold());
    } else {
        println!("\n{}", "Configuration not saved.".yellow());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_creates_webdav_record() {
        let mut settings = Settings::default();
        let update = ConfigUpdate {
            username: Some(" me ".to_string()),
            password: Some("pw".to_string()),
            ..Default::default()
        };
        update.apply(&mut settings).unwrap();

        let webdav = settings.webdav.unwrap();
        assert_eq!(webdav.username, "me");
        assert_eq!(webdav.app_password, "pw");
        assert_eq!(webdav.filename, "my_library.bib");
    }

    #[test]
    fn test_apply_threshold_bounds() {
        let mut settings = Settings::default();
        let bad = ConfigUpdate {
            title_threshold: Some(0.0),
            ..Default::default()
        };
        assert!(bad.apply(&mut settings).is_err());

        let good = ConfigUpdate {
            title_threshold: Some(0.7),
            ..Default::default()
        };
        good.apply(&mut settings).unwrap();
        assert_eq!(settings.matching.title_threshold, 0.7);
        assert!(settings.webdav.is_none());
    }

    #[test]
    fn test_zero_timeout_clears() {
        let mut settings = Settings::default();
        ConfigUpdate {
            timeout_secs: Some(0),
            ..Default::default()
        }
        .apply(&mut settings)
        .unwrap();
        assert_eq!(settings.webdav.unwrap().timeout_secs, None);
    }
}
