//! Memory-mapped event file readers.
//!

use crate::format::{FILE_HEADER_SIZE, MAGIC, PIXEL_RECORD_SIZE, VERSION};
use crate::{Error, Result};
use memmap2::Mmap;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use xraypix_core::{EventRecord, Histogram1D, HistogramConfig, PixelHit, MAX_PIXELS};

/// A memory-mapped file reader.
///
/// Uses memmap2 to efficiently access file contents without
/// loading the entire file into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Little-endian cursor over a byte slice.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::InvalidFormat(format!(
                "truncated {what} at byte {} (need {len}, have {})",
                self.pos,
                self.remaining()
            )));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        self.array(what).map(u16::from_le_bytes)
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        self.array(what).map(u32::from_le_bytes)
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        self.array(what).map(u64::from_le_bytes)
    }

    fn f64(&mut self, what: &str) -> Result<f64> {
        self.array(what).map(f64::from_le_bytes)
    }

    fn string(&mut self, what: &str) -> Result<String> {
        let len = usize::from(self.u16(what)?);
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::InvalidFormat(format!("{what} is not utf-8: {e}")))
    }
}

/// Event and pixel totals of a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSummary {
    /// Number of events.
    pub events: u64,
    /// Number of hit pixels over all events.
    pub pixels: u64,
    /// Events per chip.
    pub events_per_chip: BTreeMap<u8, u64>,
    /// Largest hit count of a single event.
    pub max_hits: usize,
}

/// Reader for xraypix event files.
pub struct EventFileReader {
    reader: MappedFileReader,
    references: Vec<Histogram1D>,
    events_offset: usize,
}

impl EventFileReader {
    /// Opens an event file and parses its header and reference table.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped, is not an xraypix
    /// event file, or has an unsupported version.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        let mut cursor = Cursor::new(reader.as_bytes(), 0);

        let magic: [u8; 4] = cursor.array("file header")?;
        if magic != MAGIC {
            return Err(Error::InvalidFormat(format!(
                "not an event file (magic {magic:02x?}, file: {})",
                reader.path.display()
            )));
        }
        let version = cursor.u16("file header")?;
        if version != VERSION {
            return Err(Error::InvalidFormat(format!(
                "unsupported event file version {version} (file: {})",
                reader.path.display()
            )));
        }
        cursor.take(2, "file header")?;
        let reference_count = cursor.u32("file header")?;
        cursor.take(4, "file header")?;
        debug_assert_eq!(cursor.pos, FILE_HEADER_SIZE);

        let references = (0..reference_count)
            .map(|_| read_reference(&mut cursor))
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "opened {} ({} bytes, {} reference histograms)",
            reader.path.display(),
            reader.len(),
            references.len()
        );

        Ok(Self {
            events_offset: cursor.pos,
            reader,
            references,
        })
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Reference histograms stored in the file.
    #[must_use]
    pub fn references(&self) -> &[Histogram1D] {
        &self.references
    }

    /// Looks up a stored reference histogram by name.
    #[must_use]
    pub fn reference_histogram(&self, name: &str) -> Option<&Histogram1D> {
        self.references.iter().find(|h| h.name() == name)
    }

    /// Streams all events in file order.
    #[must_use]
    pub fn events(&self) -> EventStream<'_> {
        EventStream {
            cursor: Cursor::new(self.reader.as_bytes(), self.events_offset),
            failed: false,
        }
    }

    /// Streams the events recorded on `chip`. Errors are passed through.
    pub fn events_for_chip(&self, chip: u8) -> impl Iterator<Item = Result<EventRecord>> + '_ {
        self.events()
            .filter(move |event| event.as_ref().map_or(true, |e| e.chip_id() == chip))
    }

    /// Scans the whole file and counts events and pixels.
    ///
    /// # Errors
    /// Returns the first event decoding error.
    pub fn summarize(&self) -> Result<FileSummary> {
        let mut summary = FileSummary::default();
        for event in self.events() {
            let event = event?;
            summary.events += 1;
            summary.pixels += event.hit_count() as u64;
            summary.max_hits = summary.max_hits.max(event.hit_count());
            *summary.events_per_chip.entry(event.chip_id()).or_default() += 1;
        }
        Ok(summary)
    }
}

fn read_reference(cursor: &mut Cursor<'_>) -> Result<Histogram1D> {
    let name = cursor.string("reference name")?;
    let title = cursor.string("reference title")?;
    let bins = cursor.u32("reference binning")? as usize;
    let low = cursor.f64("reference binning")?;
    let high = cursor.f64("reference binning")?;
    let entries = cursor.u64("reference entries")?;

    let slots = bins
        .checked_add(2)
        .filter(|slots| slots.saturating_mul(8) <= cursor.remaining())
        .ok_or_else(|| Error::InvalidFormat(format!("truncated contents of {name}")))?;
    let contents = (0..slots)
        .map(|_| cursor.f64("reference contents"))
        .collect::<Result<Vec<_>>>()?;

    let config = HistogramConfig { bins, low, high };
    Ok(Histogram1D::from_parts(
        name, title, &config, contents, entries,
    )?)
}

/// Lazy, forward-only stream of events.
///
/// Stops after the first error.
pub struct EventStream<'a> {
    cursor: Cursor<'a>,
    failed: bool,
}

impl EventStream<'_> {
    fn read_event(&mut self) -> Result<EventRecord> {
        let cursor = &mut self.cursor;
        let header = cursor.u16("event header")?;
        let trailer = cursor.u16("event header")?;
        let dac = cursor.u16("event header")?;
        let npix = usize::from(cursor.u16("event header")?);
        let [chip, _] = cursor.array::<2>("event header")?;

        if npix > MAX_PIXELS {
            return Err(xraypix_core::Error::CapacityExceeded {
                hits: npix,
                max: MAX_PIXELS,
            }
            .into());
        }

        let payload = cursor.take(npix * PIXEL_RECORD_SIZE, "pixel records")?;
        let pixels = payload
            .chunks_exact(PIXEL_RECORD_SIZE)
            .map(|record| -> Result<PixelHit> {
                let mut pixel = Cursor::new(record, 4);
                Ok(PixelHit {
                    chip_id: record[0],
                    column: record[1],
                    row: record[2],
                    value: pixel.f64("pixel value")?,
                    charge: pixel.f64("pixel charge")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(EventRecord::new(chip, pixels)?.with_readout(header, trailer, dac))
    }
}

impl Iterator for EventStream<'_> {
    type Item = Result<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.remaining() == 0 {
            return None;
        }
        let event = self.read_event();
        if event.is_err() {
            self.failed = true;
        }
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::EventFileWriter;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn append(path: &Path, bytes: &[u8]) {
        let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(bytes).unwrap();
    }

    fn sample_events() -> Vec<EventRecord> {
        vec![
            EventRecord::empty(0).with_readout(1, 2, 3),
            EventRecord::new(0, vec![PixelHit::new(0, 5, 6, 44.0).with_value(-3.5)]).unwrap(),
            EventRecord::new(
                1,
                vec![PixelHit::new(1, 0, 0, 5.0), PixelHit::new(1, 0, 1, 6.0)],
            )
            .unwrap(),
            EventRecord::empty(1),
        ]
    }

    fn write_file(events: &[EventRecord], references: &[Histogram1D]) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        let mut writer = EventFileWriter::create(file.path(), references).unwrap();
        for event in events {
            writer.write_event(event).unwrap();
        }
        writer.finish().unwrap();
        file
    }

    #[test]
    fn test_read_back_events() {
        let events = sample_events();
        let file = write_file(&events, &[]);

        let reader = EventFileReader::open(file.path()).unwrap();
        let read: Vec<EventRecord> = reader.events().collect::<Result<_>>().unwrap();
        assert_eq!(read, events);
        assert_relative_eq!(read[1].pixels()[0].value, -3.5);
    }

    #[test]
    fn test_events_for_chip() {
        let file = write_file(&sample_events(), &[]);
        let reader = EventFileReader::open(file.path()).unwrap();

        let chip0: Vec<_> = reader.events_for_chip(0).collect::<Result<_>>().unwrap();
        let chip1: Vec<_> = reader.events_for_chip(1).collect::<Result<_>>().unwrap();
        let chip7: Vec<_> = reader.events_for_chip(7).collect::<Result<_>>().unwrap();
        assert_eq!(chip0.len(), 2);
        assert_eq!(chip1.len(), 2);
        assert!(chip7.is_empty());
        assert_eq!(chip1[0].hit_count(), 2);
    }

    #[test]
    fn test_reference_lookup() {
        let config = HistogramConfig::default();
        let mut reference = Histogram1D::new("q_Sr90_C0_V0", &config)
            .unwrap()
            .with_title("q Sr90 C0");
        reference.fill(120.0);
        reference.fill(130.0);

        let file = write_file(&sample_events(), &[reference.clone()]);
        let reader = EventFileReader::open(file.path()).unwrap();

        assert_eq!(reader.references().len(), 1);
        assert_eq!(reader.reference_histogram("q_Sr90_C0_V0"), Some(&reference));
        assert!(reader.reference_histogram("q_Mo_C0_V0").is_none());
        assert_eq!(reader.events().count(), 4);
    }

    #[test]
    fn test_summary() {
        let file = write_file(&sample_events(), &[]);
        let reader = EventFileReader::open(file.path()).unwrap();
        let summary = reader.summarize().unwrap();
        assert_eq!(summary.events, 4);
        assert_eq!(summary.pixels, 3);
        assert_eq!(summary.max_hits, 2);
        assert_eq!(summary.events_per_chip.get(&0), Some(&2));
        assert_eq!(summary.events_per_chip.get(&1), Some(&2));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = EventFileReader::open(dir.path().join("missing.xrp"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_bad_magic() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"ROOT\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00")
            .unwrap();
        file.flush().unwrap();
        let result = EventFileReader::open(file.path());
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_capacity_violation_stops_stream() {
        let file = write_file(&sample_events()[..1], &[]);
        // Event claiming 201 pixels, followed by nothing.
        let mut header = Vec::new();
        header.extend_from_slice(&0u16.to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes());
        header.extend_from_slice(&201u16.to_le_bytes());
        header.extend_from_slice(&[0, 0]);
        append(file.path(), &header);

        let reader = EventFileReader::open(file.path()).unwrap();
        let mut events = reader.events();
        assert!(events.next().unwrap().is_ok());
        let err = events.next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            Error::CoreError(xraypix_core::Error::CapacityExceeded { hits: 201, .. })
        ));
        assert!(events.next().is_none());
    }

    #[test]
    fn test_truncated_event() {
        let file = write_file(&[], &[]);
        append(file.path(), &[1, 0, 2, 0]);

        let reader = EventFileReader::open(file.path()).unwrap();
        let results: Vec<_> = reader.events().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(Error::InvalidFormat(_))));
    }
}
