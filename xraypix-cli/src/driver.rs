//! Run driver: per-chip event loop, reporting and persisting.

use rayon::prelude::*;
use xraypix_algorithms::{ChipAccumulators, ClusterFinder, EventClassifier, EventCounts};
use xraypix_core::{Histogram1D, HistogramConfig};
use xraypix_io::{EventFileReader, HistogramSink, Result};

/// Number of chips on a full detector module.
pub const MODULE_CHIP_COUNT: u8 = 16;

/// Default target (source) label.
pub const DEFAULT_TARGET: &str = "Sr90";

/// Settings for one clustering run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of chips to process, starting at chip 0.
    pub chips: u8,
    /// Target label used to find the reference spectrum.
    pub target: String,
    /// Binning of every output histogram.
    pub histogram: HistogramConfig,
    /// Process chips on worker threads.
    pub parallel: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            chips: 1,
            target: DEFAULT_TARGET.to_string(),
            histogram: HistogramConfig::default(),
            parallel: false,
        }
    }
}

impl RunConfig {
    /// Selects a full module (all chips) or chip 0 only.
    #[must_use]
    pub fn with_module(mut self, module: bool) -> Self {
        self.chips = if module { MODULE_CHIP_COUNT } else { 1 };
        self
    }

    /// Sets the target label.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Sets the histogram binning.
    #[must_use]
    pub fn with_histogram(mut self, histogram: HistogramConfig) -> Self {
        self.histogram = histogram;
        self
    }

    /// Enables per-chip parallel processing.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Everything produced for one chip.
#[derive(Debug, Clone)]
pub struct ChipResult {
    /// Chip number.
    pub chip: u8,
    /// Event counts per class.
    pub counts: EventCounts,
    /// Reference spectrum copied from the input, if present.
    pub reference: Option<Histogram1D>,
    /// Charge histograms in category order.
    pub histograms: Vec<Histogram1D>,
}

/// Name of the stored reference spectrum for `target` on `chip`.
#[must_use]
pub fn reference_name(target: &str, chip: u8) -> String {
    format!("q_{target}_C{chip}_V0")
}

/// Counts block printed for each chip.
#[must_use]
pub fn format_counts(counts: &EventCounts) -> String {
    format!(
        "Empty events:\t\t{}\nOne pixel events:\t{}\nTwo pixel events:\t{}\n >2 pixel events:\t{}\n-----------------------------------",
        counts.empty, counts.single, counts.double, counts.multi
    )
}

/// Per-chip report of a finished run: a chip header followed by its counts block.
#[must_use]
pub fn format_report(summary: &[(u8, EventCounts)]) -> String {
    summary
        .iter()
        .map(|(chip, counts)| {
            format!(
                "\n-------------- ROC {chip} --------------\n{}",
                format_counts(counts)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Processes every event recorded on `chip`.
///
/// # Errors
/// Returns an error if the binning is invalid or an event cannot be decoded.
pub fn process_chip<F: ClusterFinder>(
    reader: &EventFileReader,
    classifier: &EventClassifier<F>,
    chip: u8,
    config: &RunConfig,
) -> Result<ChipResult> {
    log::debug!("chip {chip}: scanning with {}", classifier.finder().name());

    let reference_name = reference_name(&config.target, chip);
    let reference = reader.reference_histogram(&reference_name).cloned();
    if reference.is_none() {
        log::warn!(
            "cannot find reference histogram {reference_name}; did you set the target accordingly (default: {DEFAULT_TARGET})? \
             Writing output without it"
        );
    }

    let mut accumulators = ChipAccumulators::new(chip, &config.histogram)?;
    for event in reader.events_for_chip(chip) {
        accumulators.process(classifier, &event?);
    }

    let (counts, histograms) = accumulators.into_histograms();
    log::debug!("chip {chip}: {} events", counts.total());
    Ok(ChipResult {
        chip,
        counts,
        reference,
        histograms,
    })
}

/// Runs all configured chips and persists their histograms into `sink`.
///
/// Chips are persisted in ascending order, also when they were processed
/// in parallel. The per-chip counts are returned only once the sink has
/// been finished, so a failed run reports none.
///
/// # Errors
/// Returns the first decoding or output error; nothing after it is persisted.
pub fn run<F: ClusterFinder>(
    reader: &EventFileReader,
    classifier: &EventClassifier<F>,
    config: &RunConfig,
    sink: &mut dyn HistogramSink,
) -> Result<Vec<(u8, EventCounts)>> {
    let chips: Vec<u8> = (0..config.chips).collect();
    let mut summary = Vec::with_capacity(chips.len());

    if config.parallel {
        let results = chips
            .par_iter()
            .map(|&chip| process_chip(reader, classifier, chip, config))
            .collect::<Result<Vec<_>>>()?;
        for result in results {
            summary.push(persist(result, sink)?);
        }
    } else {
        for chip in chips {
            let result = process_chip(reader, classifier, chip, config)?;
            summary.push(persist(result, sink)?);
        }
    }

    sink.finish()?;
    Ok(summary)
}

fn persist(result: ChipResult, sink: &mut dyn HistogramSink) -> Result<(u8, EventCounts)> {
    if let Some(reference) = &result.reference {
        sink.persist(reference)?;
    }
    for histogram in &result.histograms {
        sink.persist(histogram)?;
    }
    Ok((result.chip, result.counts))
}
