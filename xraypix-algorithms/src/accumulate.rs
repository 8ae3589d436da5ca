//! Per-chip histogram accumulators.

use crate::classify::{Category, ChargeSink, EventClass, EventClassifier, EventCounts};
use crate::labeling::ClusterFinder;
use xraypix_core::{EventRecord, Histogram1D, HistogramConfig, Result};

/// Event counts and one charge histogram per [`Category`] for a single chip.
///
/// Created once per chip by the run driver, filled event by event, then
/// released with [`ChipAccumulators::into_histograms`] for persisting.
#[derive(Debug, Clone)]
pub struct ChipAccumulators {
    chip: u8,
    counts: EventCounts,
    histograms: Vec<Histogram1D>,
}

impl ChipAccumulators {
    /// Creates empty accumulators for `chip`.
    ///
    /// # Errors
    /// Returns an error if `config` is not a valid binning.
    pub fn new(chip: u8, config: &HistogramConfig) -> Result<Self> {
        let histograms = Category::ALL
            .iter()
            .map(|category| Histogram1D::new(category.histogram_name(chip), config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            chip,
            counts: EventCounts::default(),
            histograms,
        })
    }

    /// Chip these accumulators belong to.
    #[must_use]
    pub fn chip(&self) -> u8 {
        self.chip
    }

    /// Event counts so far.
    #[must_use]
    pub fn counts(&self) -> &EventCounts {
        &self.counts
    }

    /// Histogram for `category`.
    #[must_use]
    pub fn histogram(&self, category: Category) -> &Histogram1D {
        &self.histograms[category.index()]
    }

    /// Classifies one event and fills the matching histograms.
    pub fn process<F: ClusterFinder>(
        &mut self,
        classifier: &EventClassifier<F>,
        event: &EventRecord,
    ) -> EventClass {
        let mut counts = self.counts;
        let class = classifier.process(event, &mut counts, self);
        self.counts = counts;
        class
    }

    /// Releases the histograms in [`Category::ALL`] order, with the final counts.
    #[must_use]
    pub fn into_histograms(self) -> (EventCounts, Vec<Histogram1D>) {
        (self.counts, self.histograms)
    }
}

impl ChargeSink for ChipAccumulators {
    fn insert(&mut self, category: Category, value: f64) {
        self.histograms[category.index()].fill(value);
    }
}
