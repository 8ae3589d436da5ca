//! xraypix-io: Event file reading and histogram output for xraypix.
//!
//! Event files are read through memory maps (memmap2). Histograms are
//! written as JSON, CSV or, with the `hdf5` feature, HDF5.
//!

mod error;
pub mod format;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use format::EventFileWriter;
#[cfg(feature = "hdf5")]
pub use hdf5::Hdf5HistogramWriter;
pub use reader::{EventFileReader, EventStream, FileSummary, MappedFileReader};
pub use writer::{
    create_sink, output_path, read_histograms_json, CsvHistogramWriter, HistogramSink,
    JsonHistogramWriter, OutputFormat,
};
