//! Capture input sources.
//!
//! Sources isolate all file I/O from the decode pipeline. Two stream
//! shapes exist: raw edge timestamps and pre-classified bit records;
//! both are line-oriented text files (see `text`).

mod text;

pub use text::{BitFileSource, EdgeFileSource};

use thiserror::Error;

use crate::protocol::BitEvent;

/// Producer of raw edge timestamps (strictly increasing sample indices).
pub trait EdgeSource {
    fn next_edge(&mut self) -> Result<Option<u64>, SourceError>;
}

/// Producer of pre-classified bit events.
pub trait BitSource {
    fn next_event(&mut self) -> Result<Option<BitEvent>, SourceError>;
}

impl EdgeSource for std::vec::IntoIter<u64> {
    fn next_edge(&mut self) -> Result<Option<u64>, SourceError> {
        Ok(self.next())
    }
}

impl BitSource for std::vec::IntoIter<BitEvent> {
    fn next_event(&mut self) -> Result<Option<BitEvent>, SourceError> {
        Ok(self.next())
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("input format error (line {line}): {message}")]
    Format { line: usize, message: String },
}
