use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::codec;
use crate::config::ConfigManager;
use crate::detector::MatchConfig;
use crate::entry::Entry;
use crate::session::LibrarySession;
use crate::settings::Settings;

const SESSION_FILE: &str = "session.json";
const SETTINGS_FILE: &str = "config.toml";
const LIBRARIES_DIR: &str = "libraries";
const SHARE_DIR: &str = "share";

/// A cached library file under `libraries/`
#[derive(Debug, Clone)]
pub struct CachedLibrary {
    /// File name without the `.bib` extension
    pub name: String,
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

/// On-disk home of the session state, cached libraries and share copies
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Workspace { root: root.into() }
    }

    /// Workspace rooted at the platform config directory
    pub fn open_default() -> Result<Self> {
        Ok(Workspace::new(ConfigManager::config_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    /// Read `config.toml`, defaults when it does not exist
    pub fn load_settings(&self) -> Result<Settings> {
        Settings::load_from(&self.settings_path())
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        settings.save_to(&self.settings_path())
    }

    pub fn session_path(&self) -> PathBuf {
        self.root.join(SESSION_FILE)
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join(LIBRARIES_DIR)
    }

    pub fn share_dir(&self) -> PathBuf {
        self.root.join(SHARE_DIR)
    }

    /// Load the persisted session, or start an empty one
    pub fn load_session(&self, match_config: MatchConfig) -> Result<LibrarySession> {
        let path = self.session_path();
        if !path.exists() {
            log::debug!("No saved session at {}, starting empty", path.display());
            return Ok(LibrarySession::new(match_config));
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session state: {}", path.display()))?;
        let mut session: LibrarySession =
            serde_json::from_str(&content).context("Failed to parse session state")?;
        session.set_match_config(match_config);

        Ok(session)
    }

    /// Persist the session, replacing the previous state file atomically
    pub fn save_session(&self, session: &LibrarySession) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create directory: {}", self.root.display()))?;

        let content =
            serde_json::to_string_pretty(session).context("Failed to serialize session state")?;

        let path = self.session_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).context("Failed to write session state")?;
        fs::rename(&tmp, &path).context("Failed to replace session state")?;

        Ok(())
    }

    /// Path of the cached library called `name`
    pub fn library_path(&self, name: &str) -> Result<PathBuf> {
        let name = name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(anyhow!("Invalid library name: '{}'", name));
        }

        let file_name = if name.ends_with(".bib") {
            name.to_string()
        } else {
            format!("{name}.bib")
        };
        Ok(self.libraries_dir().join(file_name))
    }

    /// Store `entries` as the cached library `name`, overwriting any previous copy
    pub fn save_library(&self, name: &str, entries: &[Entry]) -> Result<PathBuf> {
        let path = self.library_path(name)?;
        codec::write_file(&path, entries)
            .with_context(|| format!("Failed to save library to {}", path.display()))?;
        Ok(path)
    }

    pub fn load_library(&self, name: &str) -> Result<Vec<Entry>> {
        let path = self.library_path(name)?;
        if !path.exists() {
            return Err(anyhow!("No saved library named '{}'", name));
        }
        codec::read_file(&path)
            .with_context(|| format!("Failed to load library from {}", path.display()))
    }

    /// Cached libraries, sorted by name
    pub fn list_libraries(&self) -> Result<Vec<CachedLibrary>> {
        let dir = self.libraries_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut libraries = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("bib") {
                continue;
            }

            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let modified = entry.metadata().ok().and_then(|m| m.modified().ok());

            libraries.push(CachedLibrary {
                name,
                path: path.to_path_buf(),
                modified,
            });
        }

        libraries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(libraries)
    }

    /// Timestamped share copy of the session's library
    pub fn share(&self, session: &LibrarySession, base_name: &str) -> Result<PathBuf> {
        session
            .share(&self.share_dir(), base_name)
            .context("Failed to write share copy")
    }
}
