//! Persisted revision history in JSON Lines form.
//!
//! Each non-blank line holds one [`Revision`]. The reader is lazy, so a long
//! history is never buffered in memory as a whole.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::ChronoscopeError;
use crate::revision::{is_valid_revision_id, Revision};

/// Lazily yields the revisions of a JSON Lines history.
///
/// # Examples
///
/// ```
/// use chronoscope_core::HistoryReader;
///
/// let input = r#"{"id":"r1","date":"2024-01-01T00:00:00Z","author":"alice","edits":[]}
///
/// {"id":"r2","date":"2024-01-02T00:00:00Z","author":"bob","edits":[]}
/// "#;
/// let revisions: Vec<_> = HistoryReader::new(input.as_bytes())
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(revisions.len(), 2);
/// assert_eq!(revisions[1].author, "bob");
/// ```
pub struct HistoryReader<R> {
    lines: std::io::Lines<R>,
    line: usize,
}

impl<R: BufRead> HistoryReader<R> {
    /// Read revisions from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for HistoryReader<R> {
    type Item = Result<Revision, ChronoscopeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = match self.lines.next()? {
                Ok(raw) => raw,
                Err(e) => return Some(Err(ChronoscopeError::Io(e))),
            };
            self.line += 1;
            if raw.trim().is_empty() {
                continue;
            }
            return Some(parse_revision(&raw, self.line));
        }
    }
}

fn parse_revision(raw: &str, line: usize) -> Result<Revision, ChronoscopeError> {
    let revision: Revision =
        serde_json::from_str(raw).map_err(|e| ChronoscopeError::History {
            line,
            message: e.to_string(),
        })?;
    if !is_valid_revision_id(&revision.id) {
        return Err(ChronoscopeError::History {
            line,
            message: format!("invalid revision id '{}'", revision.id),
        });
    }
    Ok(revision)
}

/// Open the history file at `path`.
///
/// # Errors
///
/// Returns [`ChronoscopeError::FileNotFound`] if `path` does not exist, or
/// [`ChronoscopeError::Io`] if it cannot be opened.
pub fn load_history(path: &Path) -> Result<HistoryReader<BufReader<File>>, ChronoscopeError> {
    if !path.exists() {
        return Err(ChronoscopeError::FileNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    Ok(HistoryReader::new(BufReader::new(file)))
}

/// Write `revisions` as JSON Lines.
///
/// # Errors
///
/// Returns [`ChronoscopeError::Serialization`] or [`ChronoscopeError::Io`] on
/// failure.
pub fn write_history<'a, W: Write>(
    mut writer: W,
    revisions: impl IntoIterator<Item = &'a Revision>,
) -> Result<(), ChronoscopeError> {
    for revision in revisions {
        serde_json::to_writer(&mut writer, revision)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
