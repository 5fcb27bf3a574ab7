//! Command handler modules
//!
//! Each CLI command loads the saved session, runs one operation and writes
//! the session back. Handlers print colored progress and wrap library errors
//! with `anyhow` context.

pub mod config;
pub mod files;
pub mod library;
pub mod remote;

pub use config::{handle_config_show, handle_config_update, handle_config_wizard, ConfigUpdate};
pub use files::{handle_libraries, handle_load, handle_save, handle_share};
pub use library::{
    handle_conflicts, handle_discard, handle_edit, handle_export, handle_import, handle_list,
    handle_report, handle_resolve, handle_search, handle_status,
};
pub use remote::{handle_pull, handle_push};

use anyhow::{Context, Result};

use crate::logger;
use crate::session::LibrarySession;
use crate::settings::Settings;
use crate::workspace::Workspace;

/// Everything a command needs: where things live, settings and the session
pub struct AppContext {
    pub workspace: Workspace,
    pub settings: Settings,
    pub session: LibrarySession,
}

impl AppContext {
    pub fn open(workspace: Workspace) -> Result<Self> {
        let settings = workspace
            .load_settings()
            .context("Failed to load configuration")?;
        let session = workspace
            .load_session(settings.matching)
            .context("Failed to load saved session")?;

        Ok(AppContext {
            workspace,
            settings,
            session,
        })
    }

    /// Write the session back and record `action` in the log file
    pub fn persist(&self, action: &str) -> Result<()> {
        self.workspace
            .save_session(&self.session)
            .context("Failed to save session")?;

        if let Err(e) = logger::log_to_file(action) {
            log::warn!("Failed to write log file: {}", e);
        }
        Ok(())
    }
}
