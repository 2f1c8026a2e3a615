//! gridscan-io: Trip record loading and run reporting for gridscan.
//!
//! This crate reads point data from memory-mapped CSV files via memmap2 and
//! writes plain-text or JSON run reports.
//!

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{parse_records, MappedFileReader, PointSet, RecordLayout, TripRecordReader};
pub use writer::{ReportWriter, RunSummary};
