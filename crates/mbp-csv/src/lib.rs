//! CSV wire codec: MBO event input and MBP-10 snapshot output.
//!
//! Only open/header failures are fatal. Malformed data lines are skipped and
//! counted; the stream keeps going.

pub mod reader;
pub mod writer;

pub use reader::{MboReader, ReaderStats};
pub use writer::{mbp_header, SnapshotFormatter, SnapshotWriter};

use thiserror::Error;

/// Fatal codec errors.
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("input is missing a header line")]
    MissingHeader,
}
