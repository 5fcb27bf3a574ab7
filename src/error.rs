use thiserror::Error;

/// Errors surfaced by library, codec and sync operations.
///
/// Every variant is recoverable: a failed operation leaves the session as it
/// was before the call, and the caller decides how to report it.
#[derive(Error, Debug)]
pub enum LibraryError {
    /// Malformed BibTeX input (reported per file during a batch import)
    #[error("Failed to parse BibTeX from {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// Network, authentication or server failure talking to the remote store
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// The configured remote file does not exist yet
    #[error("Remote file not found: {0}")]
    RemoteNotFound(String),

    /// An operation that finalizes an import was attempted while pairs are pending
    #[error("{0} conflict(s) are still pending resolution")]
    ConflictPending(usize),

    #[error("Library is empty")]
    EmptyLibrary,

    #[error("No pending conflict with id {0}")]
    UnknownPair(u64),

    #[error("Conflict {pair_id} has unresolved fields: {}", fields.join(", "))]
    UnresolvedFields { pair_id: u64, fields: Vec<String> },

    #[error("No entry with citation key '{0}'")]
    EntryNotFound(String),

    #[error("Citation key '{0}' already exists in the library")]
    DuplicateKey(String),

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    /// Unrecognised side or resolution typed by the user
    #[error("Invalid choice: {0}")]
    InvalidChoice(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LibraryError {
    pub(crate) fn parse(source_name: impl Into<String>, message: impl ToString) -> Self {
        LibraryError::Parse {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LibraryError::parse("refs.bib", "unexpected end of file");
        assert_eq!(
            err.to_string(),
            "Failed to parse BibTeX from refs.bib: unexpected end of file"
        );

        let err = LibraryError::UnresolvedFields {
            pair_id: 3,
            fields: vec!["author".to_string(), "title".to_string()],
        };
        assert_eq!(err.to_string(), "Conflict 3 has unresolved fields: author, title");

        assert_eq!(LibraryError::EmptyLibrary.to_string(), "Library is empty");

        let err = LibraryError::InvalidChoice("unknown side 'c'".to_string());
        assert_eq!(err.to_string(), "Invalid choice: unknown side 'c'");
    }
}
