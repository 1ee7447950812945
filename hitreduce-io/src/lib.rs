//! hitreduce-io: Event file I/O for hitreduce.
//!
//! Event files are read through memory-mapped JSON lines via memmap2 and
//! written back in the same format; reduction summaries are written as CSV.
//!

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{EventFileReader, EventIter, MappedFileReader};
pub use writer::{EventFileWriter, SummaryRecord, SummaryWriter};
