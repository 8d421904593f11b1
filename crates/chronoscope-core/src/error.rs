use std::path::PathBuf;

/// Errors that can occur across the Chronoscope crates.
///
/// Library crates return this type directly; the binary converts it into a
/// `miette` diagnostic at the boundary.
///
/// # Examples
///
/// ```
/// use chronoscope_core::ChronoscopeError;
///
/// let err = ChronoscopeError::Config("min-coupling can't be negative".into());
/// assert!(err.to_string().contains("min-coupling"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ChronoscopeError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A threshold or option outside its documented domain.
    #[error("configuration error: {0}")]
    Config(String),

    /// A qualified source node id that does not follow the id grammar.
    #[error("invalid qualified id '{0}'")]
    InvalidId(String),

    /// A malformed record in a persisted history.
    #[error("history error at line {line}: {message}")]
    History {
        /// 1-based line number of the offending record.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ChronoscopeError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = ChronoscopeError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn history_error_shows_line() {
        let err = ChronoscopeError::History {
            line: 7,
            message: "expected value".into(),
        };
        assert_eq!(err.to_string(), "history error at line 7: expected value");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = ChronoscopeError::FileNotFound(PathBuf::from("/tmp/history.jsonl"));
        assert!(err.to_string().contains("/tmp/history.jsonl"));
    }
}
