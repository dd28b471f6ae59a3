//! Corruption check: recordings that cannot be decoded are deleted.

use std::fmt;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::{Error, Result};
use crate::reader::EdfReader;
use crate::scanner::Outcome;

#[derive(Debug, Clone, PartialEq)]
pub enum Integrity {
    Valid,
    /// Deleted because it failed to decode; carries the decoding error.
    Deleted(String),
}

impl fmt::Display for Integrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Integrity::Valid => f.write_str("valid"),
            Integrity::Deleted(reason) => write!(f, "corrupted, deleted ({})", reason),
        }
    }
}

/// Opens and validates one file, deleting it when its content is damaged.
///
/// Errors that say nothing about the content, such as a denied permission,
/// are returned and the file is kept.
pub fn check_file(path: &Path) -> Result<Outcome<Integrity>> {
    let reason = match EdfReader::open(path) {
        Ok(_) => return Ok(Outcome::Done(Integrity::Valid)),
        Err(e) if e.is_corruption() => e.to_string(),
        Err(e) => return Err(Error::parse(path, e)),
    };

    warn!(file = %path.display(), %reason, "corrupted recording, deleting");
    fs::remove_file(path).map_err(|e| Error::io(path, e))?;
    Ok(Outcome::Done(Integrity::Deleted(reason)))
}
