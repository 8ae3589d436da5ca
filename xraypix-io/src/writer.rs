//! Histogram output sinks.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use xraypix_core::Histogram1D;

const FORMAT_VERSION: &str = "0.1";

/// Destination for finished histograms.
///
/// `persist` is called once per histogram after its chip is fully
/// processed; `finish` closes the output.
pub trait HistogramSink {
    /// Writes one histogram.
    ///
    /// # Errors
    /// Returns an error if the histogram cannot be written.
    fn persist(&mut self, histogram: &Histogram1D) -> Result<()>;

    /// Flushes and closes the output.
    ///
    /// # Errors
    /// Returns an error if the output cannot be completed.
    fn finish(&mut self) -> Result<()>;
}

/// Output file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// A single JSON document.
    Json,
    /// One CSV row per bin.
    Csv,
    /// One HDF5 group per histogram (requires the `hdf5` feature).
    Hdf5,
}

impl OutputFormat {
    /// File extension for this format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Hdf5 => "h5",
        }
    }
}

/// Derives the output file path for `input`.
///
/// `run_01.xrp` becomes `run_01_clustered.json`, placed next to the
/// input or inside `output_dir` when one is given.
#[must_use]
pub fn output_path(input: &Path, output_dir: Option<&Path>, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "events".into(), |s| s.to_string_lossy());
    let file_name = format!("{stem}_clustered.{}", format.extension());
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

/// Creates the sink for `format` at `path`.
///
/// # Errors
/// Returns an error if the file cannot be created or the format is not
/// available in this build.
pub fn create_sink(
    path: &Path,
    format: OutputFormat,
    target: &str,
) -> Result<Box<dyn HistogramSink + Send>> {
    log::debug!("writing {:?} output to {}", format, path.display());
    match format {
        OutputFormat::Json => Ok(Box::new(JsonHistogramWriter::create(path, target)?)),
        OutputFormat::Csv => Ok(Box::new(CsvHistogramWriter::create(path)?)),
        #[cfg(feature = "hdf5")]
        OutputFormat::Hdf5 => Ok(Box::new(crate::hdf5::Hdf5HistogramWriter::create(
            path, target,
        )?)),
        #[cfg(not(feature = "hdf5"))]
        OutputFormat::Hdf5 => Err(Error::UnsupportedFormat(
            "HDF5 output requires the `hdf5` feature".to_string(),
        )),
    }
}

/// Writer for histograms as CSV rows.
///
/// Columns: `name,bin,low_edge,high_edge,content`. Bin 0 is underflow and
/// bin `N + 1` overflow.
pub struct CsvHistogramWriter<W: Write = BufWriter<File>> {
    writer: W,
}

impl CsvHistogramWriter<BufWriter<File>> {
    /// Creates a new CSV file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CsvHistogramWriter<W> {
    /// Wraps a writer and emits the header row.
    ///
    /// # Errors
    /// Returns an error if the header cannot be written.
    pub fn new(mut writer: W) -> Result<Self> {
        writeln!(writer, "name,bin,low_edge,high_edge,content")?;
        Ok(Self { writer })
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> HistogramSink for CsvHistogramWriter<W> {
    fn persist(&mut self, histogram: &Histogram1D) -> Result<()> {
        for (bin, content) in histogram.contents().iter().enumerate() {
            writeln!(
                self.writer,
                "{},{},{},{},{}",
                histogram.name(),
                bin,
                histogram.bin_low_edge(bin),
                histogram.bin_high_edge(bin),
                content
            )?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonDocumentRef<'a> {
    format_version: &'a str,
    target: &'a str,
    histograms: &'a [Histogram1D],
}

#[derive(Deserialize)]
struct JsonDocument {
    histograms: Vec<Histogram1D>,
}

/// Writer for all histograms of a run as one JSON document.
///
/// Histograms are buffered and written by [`HistogramSink::finish`].
pub struct JsonHistogramWriter {
    writer: Option<BufWriter<File>>,
    target: String,
    histograms: Vec<Histogram1D>,
}

impl JsonHistogramWriter {
    /// Creates the output file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, target: &str) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            target: target.to_string(),
            histograms: Vec::new(),
        })
    }
}

impl HistogramSink for JsonHistogramWriter {
    fn persist(&mut self, histogram: &Histogram1D) -> Result<()> {
        self.histograms.push(histogram.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        let document = JsonDocumentRef {
            format_version: FORMAT_VERSION,
            target: &self.target,
            histograms: &self.histograms,
        };
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writer.flush()?;
        Ok(())
    }
}

/// Reads the histograms of a JSON output file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a histogram document.
pub fn read_histograms_json<P: AsRef<Path>>(path: P) -> Result<Vec<Histogram1D>> {
    let file = File::open(path)?;
    let document: JsonDocument = serde_json::from_reader(BufReader::new(file))?;
    Ok(document.histograms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use xraypix_core::HistogramConfig;

    fn sample(name: &str) -> Histogram1D {
        let config = HistogramConfig::new().with_bins(4).with_range(0.0, 40.0);
        let mut h = Histogram1D::new(name, &config).unwrap();
        h.fill(5.0);
        h.fill(15.0);
        h.fill(15.0);
        h.fill(-1.0);
        h
    }

    #[test]
    fn test_output_path_next_to_input() {
        let path = output_path(Path::new("/data/run_07.xrp"), None, OutputFormat::Json);
        assert_eq!(path, PathBuf::from("/data/run_07_clustered.json"));

        let path = output_path(Path::new("scan"), None, OutputFormat::Csv);
        assert_eq!(path, PathBuf::from("scan_clustered.csv"));
    }

    #[test]
    fn test_output_path_in_directory() {
        let path = output_path(
            Path::new("/data/x/module.xrp"),
            Some(Path::new("/results")),
            OutputFormat::Hdf5,
        );
        assert_eq!(path, PathBuf::from("/results/module_clustered.h5"));
    }

    #[test]
    fn test_write_csv() {
        let mut writer = CsvHistogramWriter::new(Vec::new()).unwrap();
        writer.persist(&sample("OnePixelEvents_C0")).unwrap();
        writer.finish().unwrap();

        let content = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "name,bin,low_edge,high_edge,content");
        // header + underflow + 4 bins + overflow
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[1], "OnePixelEvents_C0,0,-inf,0,1");
        assert_eq!(lines[2], "OnePixelEvents_C0,1,0,10,1");
        assert_eq!(lines[3], "OnePixelEvents_C0,2,10,20,2");
        assert_eq!(lines[6], "OnePixelEvents_C0,5,40,inf,0");
    }

    #[test]
    fn test_write_json() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = JsonHistogramWriter::create(file.path(), "Sr90").unwrap();
        writer.persist(&sample("a")).unwrap();
        writer.persist(&sample("b")).unwrap();
        writer.finish().unwrap();
        // A second finish is a no-op.
        writer.finish().unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("\"target\": \"Sr90\""));

        let histograms = read_histograms_json(file.path()).unwrap();
        assert_eq!(histograms, vec![sample("a"), sample("b")]);
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_hdf5_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = create_sink(&dir.path().join("out.h5"), OutputFormat::Hdf5, "Sr90");
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }
}
