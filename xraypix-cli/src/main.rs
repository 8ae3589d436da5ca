//! xraypix command-line interface.
//!
//! Clusters the pixel hits of recorded x-ray events and writes per-chip
//! charge spectra.

mod driver;

use clap::{Parser, Subcommand, ValueEnum};
use driver::{RunConfig, DEFAULT_TARGET};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use xraypix_algorithms::{
    ClusterFinder, EventClassifier, EventCounts, FloodFillClustering, UnionFindClustering,
};
use xraypix_core::HistogramConfig;
use xraypix_io::{create_sink, output_path, EventFileReader, OutputFormat};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    XraypixIo(#[from] xraypix_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] xraypix_core::Error),
}

/// Cluster finder selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    /// Depth-first flood fill over 8-neighbour adjacency
    FloodFill,
    /// Disjoint-set merging of adjacent pairs
    UnionFind,
}

/// Output file format.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Single JSON document
    Json,
    /// One CSV row per histogram bin
    Csv,
    /// HDF5 groups (requires the `hdf5` feature)
    H5,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => OutputFormat::Json,
            Format::Csv => OutputFormat::Csv,
            Format::H5 => OutputFormat::Hdf5,
        }
    }
}

/// Cluster charge spectra for pixelated x-ray detectors.
#[derive(Parser)]
#[command(name = "xraypix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster events and fill per-chip charge histograms
    Cluster {
        /// Input event file
        #[arg(short = 'f', long)]
        input: PathBuf,

        /// Target label of the reference spectrum (case sensitive)
        #[arg(short, long, default_value = DEFAULT_TARGET)]
        target: String,

        /// Analyze a full 16-chip module instead of a single chip
        #[arg(short, long)]
        module: bool,

        /// Directory for the result file (default: next to the input)
        #[arg(short = 'r', long)]
        result_dir: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: Format,

        /// Cluster finding algorithm
        #[arg(short, long, value_enum, default_value = "flood-fill")]
        algorithm: Algorithm,

        /// Number of histogram bins
        #[arg(long, default_value = "200")]
        bins: usize,

        /// Lower edge of the histogram range
        #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
        low: f64,

        /// Upper edge of the histogram range
        #[arg(long, default_value = "2000.0", allow_negative_numbers = true)]
        high: f64,

        /// Process chips on worker threads
        #[arg(long)]
        parallel: bool,
    },

    /// Show information about an event file
    Info {
        /// Input event file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Cluster {
            input,
            target,
            module,
            result_dir,
            format,
            algorithm,
            bins,
            low,
            high,
            parallel,
        } => {
            let histogram = HistogramConfig::new()
                .with_bins(bins)
                .with_range(low, high);
            histogram.validate()?;

            let config = RunConfig::default()
                .with_module(module)
                .with_target(target)
                .with_histogram(histogram)
                .with_parallel(parallel);

            let finder: Box<dyn ClusterFinder> = match algorithm {
                Algorithm::FloodFill => Box::new(FloodFillClustering::new()),
                Algorithm::UnionFind => Box::new(UnionFindClustering::new()),
            };
            let classifier = EventClassifier::with_finder(finder);

            let summary = cluster(
                &input,
                result_dir.as_deref(),
                format.into(),
                &classifier,
                &config,
            )?;
            if let Some(summary) = summary {
                println!("{}", driver::format_report(&summary));
            }
        }

        Commands::Info { input } => {
            let reader = match EventFileReader::open(&input) {
                Ok(reader) => reader,
                Err(e) => {
                    log::error!("cannot open event file {}: {e}", input.display());
                    return Ok(());
                }
            };
            let summary = reader.summarize()?;

            println!("File: {}", input.display());
            println!("Size: {} bytes", reader.file_size());
            println!("Events: {}", summary.events);
            println!("Pixel hits: {}", summary.pixels);
            println!("Largest event: {} hits", summary.max_hits);
            for (chip, events) in &summary.events_per_chip {
                println!("  chip {chip:>2}: {events} events");
            }
            println!("Reference histograms: {}", reader.references().len());
            for reference in reader.references() {
                println!("  {} ({} entries)", reference.name(), reference.entries());
            }
        }
    }

    Ok(())
}

/// Runs the clustering pass for one input file and returns the per-chip counts.
///
/// An unreadable input is reported and skipped without creating output
/// (`Ok(None)`). Once the output exists, any failure removes it again.
fn cluster(
    input: &Path,
    result_dir: Option<&Path>,
    format: OutputFormat,
    classifier: &EventClassifier<Box<dyn ClusterFinder>>,
    config: &RunConfig,
) -> Result<Option<Vec<(u8, EventCounts)>>> {
    let reader = match EventFileReader::open(input) {
        Ok(reader) => reader,
        Err(e) => {
            log::error!("cannot open event file {}: {e}", input.display());
            return Ok(None);
        }
    };

    let output = output_path(input, result_dir, format);
    log::info!(
        "clustering {} ({} chip(s), target {}, {})",
        input.display(),
        config.chips,
        config.target,
        classifier.finder().name()
    );

    let start = Instant::now();
    let mut sink = create_sink(&output, format, &config.target)?;
    let outcome = driver::run(&reader, classifier, config, sink.as_mut());
    drop(sink);

    match outcome {
        Ok(summary) => {
            let events: u64 = summary.iter().map(|(_, counts)| counts.total()).sum();
            log::info!(
                "processed {events} events in {:.2}s, results in {}",
                start.elapsed().as_secs_f64(),
                output.display()
            );
            Ok(Some(summary))
        }
        Err(e) => {
            if let Err(remove) = std::fs::remove_file(&output) {
                log::warn!("cannot remove partial output {}: {remove}", output.display());
            }
            Err(e.into())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::TempDir;
    use xraypix_core::{EventRecord, PixelHit};
    use xraypix_io::EventFileWriter;

    fn classifier() -> EventClassifier<Box<dyn ClusterFinder>> {
        EventClassifier::with_finder(Box::new(FloodFillClustering::new()))
    }

    fn write_events(path: &Path) {
        let mut writer = EventFileWriter::create(path, &[]).unwrap();
        writer
            .write_event(&EventRecord::new(0, vec![PixelHit::new(0, 1, 1, 50.0)]).unwrap())
            .unwrap();
        writer
            .write_event(
                &EventRecord::new(
                    0,
                    vec![
                        PixelHit::new(0, 4, 4, 10.0),
                        PixelHit::new(0, 5, 5, 20.0),
                        PixelHit::new(0, 9, 9, 30.0),
                    ],
                )
                .unwrap(),
            )
            .unwrap();
        writer.finish().unwrap();
    }

    fn run_cluster(input: &Path, dir: &Path) -> Result<Option<Vec<(u8, EventCounts)>>> {
        cluster(
            input,
            Some(dir),
            OutputFormat::Json,
            &classifier(),
            &RunConfig::default(),
        )
    }

    #[test]
    fn test_cluster_writes_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("scan.xrp");
        write_events(&input);

        let summary = run_cluster(&input, dir.path()).unwrap().unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].1.single, 1);
        assert_eq!(summary[0].1.multi, 1);
        assert!(dir.path().join("scan_clustered.json").exists());
    }

    #[test]
    fn test_missing_input_creates_no_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("missing.xrp");

        let summary = run_cluster(&input, dir.path()).unwrap();
        assert!(summary.is_none());
        assert!(!dir.path().join("missing_clustered.json").exists());
    }

    #[test]
    fn test_invalid_input_creates_no_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("noise.xrp");
        std::fs::write(&input, b"definitely not an event file").unwrap();

        let summary = run_cluster(&input, dir.path()).unwrap();
        assert!(summary.is_none());
        assert!(!dir.path().join("noise_clustered.json").exists());
    }

    #[test]
    fn test_truncated_input_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("cut.xrp");
        write_events(&input);

        // Cut the last pixel record of the second event in half.
        let file = OpenOptions::new().write(true).open(&input).unwrap();
        let len = file.metadata().unwrap().len();
        file.set_len(len - 10).unwrap();
        drop(file);

        let result = run_cluster(&input, dir.path());
        assert!(matches!(result, Err(CliError::XraypixIo(_))));
        assert!(!dir.path().join("cut_clustered.json").exists());
    }
}
