//! Binary layout of xraypix event files.
//!
//! All values are little-endian.
//!
//! ```text
//! file header (16 bytes)   magic "XRPX", version u16, reserved u16,
//!                          reference_count u32, reserved u32
//! reference histograms     name_len u16, name, title_len u16, title,
//!                          bins u32, low f64, high f64, entries u64,
//!                          contents (bins + 2) x f64
//! events until EOF         header u16, trailer u16, dac u16, npix u16,
//!                          chip u8, reserved u8
//!                          npix x (chip u8, col u8, row u8, reserved u8,
//!                                  value f64, charge f64)
//! ```

use crate::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use xraypix_core::{EventRecord, Histogram1D};

/// File magic.
pub const MAGIC: [u8; 4] = *b"XRPX";
/// Current format version.
pub const VERSION: u16 = 1;
/// Size of the file header in bytes.
pub const FILE_HEADER_SIZE: usize = 16;
/// Size of an event header in bytes.
pub const EVENT_HEADER_SIZE: usize = 10;
/// Size of one pixel record in bytes.
pub const PIXEL_RECORD_SIZE: usize = 20;

/// Writer for xraypix event files.
///
/// Reference histograms are fixed when the file is created; events are
/// appended one at a time.
pub struct EventFileWriter<W: Write = BufWriter<File>> {
    writer: W,
    events_written: u64,
}

impl EventFileWriter<BufWriter<File>> {
    /// Creates a new event file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn create<P: AsRef<Path>>(path: P, references: &[Histogram1D]) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), references)
    }
}

impl<W: Write> EventFileWriter<W> {
    /// Writes the file header and reference table to `writer`.
    ///
    /// # Errors
    /// Returns an error if writing fails or a reference does not fit the format.
    pub fn new(mut writer: W, references: &[Histogram1D]) -> Result<Self> {
        let count = u32::try_from(references.len())
            .map_err(|_| Error::InvalidFormat("too many reference histograms".to_string()))?;

        writer.write_all(&MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u16.to_le_bytes())?;
        writer.write_all(&count.to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?;

        for histogram in references {
            write_reference(&mut writer, histogram)?;
        }

        Ok(Self {
            writer,
            events_written: 0,
        })
    }

    /// Appends one event.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_event(&mut self, event: &EventRecord) -> Result<()> {
        // EventRecord guarantees hit_count <= MAX_PIXELS, which fits in u16.
        let npix = event.hit_count() as u16;

        self.writer.write_all(&event.header.to_le_bytes())?;
        self.writer.write_all(&event.trailer.to_le_bytes())?;
        self.writer.write_all(&event.dac.to_le_bytes())?;
        self.writer.write_all(&npix.to_le_bytes())?;
        self.writer.write_all(&[event.chip_id(), 0])?;

        for pixel in event.pixels() {
            self.writer
                .write_all(&[pixel.chip_id, pixel.column, pixel.row, 0])?;
            self.writer.write_all(&pixel.value.to_le_bytes())?;
            self.writer.write_all(&pixel.charge.to_le_bytes())?;
        }

        self.events_written += 1;
        Ok(())
    }

    /// Number of events written so far.
    #[must_use]
    pub fn events_written(&self) -> u64 {
        self.events_written
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

fn write_str<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let len = u16::try_from(value.len())
        .map_err(|_| Error::InvalidFormat(format!("string too long: {} bytes", value.len())))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn write_reference<W: Write>(writer: &mut W, histogram: &Histogram1D) -> Result<()> {
    let config = histogram.config();
    let bins = u32::try_from(config.bins)
        .map_err(|_| Error::InvalidFormat(format!("too many bins: {}", config.bins)))?;

    write_str(writer, histogram.name())?;
    write_str(writer, histogram.title())?;
    writer.write_all(&bins.to_le_bytes())?;
    writer.write_all(&config.low.to_le_bytes())?;
    writer.write_all(&config.high.to_le_bytes())?;
    writer.write_all(&histogram.entries().to_le_bytes())?;
    for value in histogram.contents() {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}
