use anyhow::{Context, Result};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;

use crate::config::ConfigManager;

const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;

/// Initialize console logging and make sure the log file location exists
///
/// Console verbosity follows `RUST_LOG` (`info` when unset); `verbose` bumps
/// the default to `debug`. Console logs go to stderr so command output can be
/// piped.
///
/// ```bash
/// RUST_LOG=debug paperref import refs.bib
/// ```
///
/// Every session operation is also appended to `paperref.log` in the config
/// directory via [`log_to_file`].
pub fn init_logger(verbose: bool) -> Result<()> {
    ConfigManager::ensure_config_dir()?;

    let fallback = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(fallback);

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{:5}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(level)
        .target(env_logger::Target::Stderr)
        .try_init()
        .ok();

    rotate_log_if_needed()?;
    log_to_file(&format!("Logger initialized with level: {level:?}"))?;

    Ok(())
}

/// Append a timestamped line to the log file
pub fn log_to_file(message: &str) -> Result<()> {
    let log_path = ConfigManager::log_file_path()?;
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    writeln!(
        file,
        "[{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    )?;

    Ok(())
}

/// Move the log aside to `paperref.log.old` once it grows past 5MB
pub fn rotate_log_if_needed() -> Result<()> {
    let log_path = ConfigManager::log_file_path()?;

    if log_path.exists() && std::fs::metadata(&log_path)?.len() > MAX_LOG_SIZE {
        let old_log_path = log_path.with_extension("log.old");
        if old_log_path.exists() {
            std::fs::remove_file(&old_log_path)?;
        }
        std::fs::rename(&log_path, &old_log_path)?;
        log::info!("Log file rotated to {}", old_log_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs::File;
    use tempfile::TempDir;

    fn with_home<F: FnOnce() -> Result<()>>(f: F) -> Result<()> {
        let dir = TempDir::new()?;
        std::env::set_var("PAPERREF_HOME", dir.path());
        let result = f();
        std::env::remove_var("PAPERREF_HOME");
        result
    }

    #[test]
    #[serial]
    fn test_log_to_file() -> Result<()> {
        with_home(|| {
            log_to_file("imported 3 entries")?;
            let contents = std::fs::read_to_string(ConfigManager::log_file_path()?)?;
            assert!(contents.contains("imported 3 entries"));
            Ok(())
        })
    }

    #[test]
    #[serial]
    fn test_rotate_log_creates_backup() -> Result<()> {
        with_home(|| {
            let log_path = ConfigManager::log_file_path()?;
            let mut file = File::create(&log_path)?;
            file.write_all(&vec![b'a'; (MAX_LOG_SIZE + 1) as usize])?;
            drop(file);

            rotate_log_if_needed()?;

            assert!(log_path.with_extension("log.old").exists());
            assert!(!log_path.exists());
            Ok(())
        })
    }
}
