//! Fixed-binning one-dimensional histograms.
//!
//! A [`Histogram1D`] stores `bins` equal-width bins between `low` and
//! `high` plus an underflow and an overflow slot, so that every filled
//! value is accounted for.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Binning shared by all charge histograms of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramConfig {
    /// Number of in-range bins.
    pub bins: usize,
    /// Lower edge of the first bin (inclusive).
    pub low: f64,
    /// Upper edge of the last bin (exclusive).
    pub high: f64,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bins: 200,
            low: 0.0,
            high: 2000.0,
        }
    }
}

impl HistogramConfig {
    /// Creates a histogram configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of bins.
    #[must_use]
    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins = bins;
        self
    }

    /// Sets the axis range.
    #[must_use]
    pub fn with_range(mut self, low: f64, high: f64) -> Self {
        self.low = low;
        self.high = high;
        self
    }

    /// Checks that the binning describes a usable axis.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] for zero bins or an empty or non-finite range.
    pub fn validate(&self) -> Result<()> {
        if self.bins == 0 {
            return Err(Error::ConfigError(
                "histogram needs at least one bin".to_string(),
            ));
        }
        if !self.low.is_finite() || !self.high.is_finite() || self.low >= self.high {
            return Err(Error::ConfigError(format!(
                "invalid histogram range [{}, {})",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

/// A named histogram with equal-width bins.
///
/// `contents[0]` is underflow, `contents[bins + 1]` is overflow.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "HistogramData"))]
pub struct Histogram1D {
    name: String,
    title: String,
    bins: usize,
    low: f64,
    high: f64,
    contents: Vec<f64>,
    entries: u64,
}

/// Unchecked wire form of [`Histogram1D`]; decoding goes through [`Histogram1D::from_parts`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct HistogramData {
    name: String,
    title: String,
    bins: usize,
    low: f64,
    high: f64,
    contents: Vec<f64>,
    entries: u64,
}

#[cfg(feature = "serde")]
impl TryFrom<HistogramData> for Histogram1D {
    type Error = Error;

    fn try_from(data: HistogramData) -> Result<Self> {
        let config = HistogramConfig {
            bins: data.bins,
            low: data.low,
            high: data.high,
        };
        Self::from_parts(data.name, data.title, &config, data.contents, data.entries)
    }
}

impl Histogram1D {
    /// Creates an empty histogram whose title equals its name.
    ///
    /// # Errors
    /// Returns an error if `config` fails [`HistogramConfig::validate`].
    pub fn new(name: impl Into<String>, config: &HistogramConfig) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        Ok(Self {
            title: name.clone(),
            name,
            bins: config.bins,
            low: config.low,
            high: config.high,
            contents: vec![0.0; config.bins + 2],
            entries: 0,
        })
    }

    /// Rebuilds a histogram from stored bin contents.
    ///
    /// # Errors
    /// Returns an error if the binning is invalid or `contents` does not
    /// hold exactly `bins + 2` values.
    pub fn from_parts(
        name: impl Into<String>,
        title: impl Into<String>,
        config: &HistogramConfig,
        contents: Vec<f64>,
        entries: u64,
    ) -> Result<Self> {
        config.validate()?;
        if contents.len() != config.bins + 2 {
            return Err(Error::ConfigError(format!(
                "expected {} bin contents, got {}",
                config.bins + 2,
                contents.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            title: title.into(),
            bins: config.bins,
            low: config.low,
            high: config.high,
            contents,
            entries,
        })
    }

    /// Sets the display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Histogram name (unique within an output file).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Number of in-range bins.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Binning of this histogram.
    #[must_use]
    pub fn config(&self) -> HistogramConfig {
        HistogramConfig {
            bins: self.bins,
            low: self.low,
            high: self.high,
        }
    }

    /// Width of every bin.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_width(&self) -> f64 {
        (self.high - self.low) / self.bins as f64
    }

    /// Returns the bin index `x` falls into (0 = underflow, `bins + 1` = overflow).
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn find_bin(&self, x: f64) -> usize {
        if x.is_nan() || x >= self.high {
            return self.bins + 1;
        }
        if x < self.low {
            return 0;
        }
        let bin = ((x - self.low) / self.bin_width()) as usize + 1;
        bin.min(self.bins)
    }

    /// Adds one observation.
    pub fn fill(&mut self, x: f64) {
        let bin = self.find_bin(x);
        self.contents[bin] += 1.0;
        self.entries += 1;
    }

    /// Content of bin `bin` (0 = underflow, `bins + 1` = overflow).
    ///
    /// Out-of-range indices read as zero.
    #[must_use]
    pub fn bin_content(&self, bin: usize) -> f64 {
        self.contents.get(bin).copied().unwrap_or(0.0)
    }

    /// Lower edge of bin `bin` (1-based for in-range bins).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_low_edge(&self, bin: usize) -> f64 {
        match bin {
            0 => f64::NEG_INFINITY,
            b if b > self.bins => self.high,
            b => self.low + (b - 1) as f64 * self.bin_width(),
        }
    }

    /// Upper edge of bin `bin`.
    #[must_use]
    pub fn bin_high_edge(&self, bin: usize) -> f64 {
        if bin > self.bins {
            f64::INFINITY
        } else {
            self.bin_low_edge(bin + 1)
        }
    }

    /// All bin contents including underflow and overflow.
    #[must_use]
    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    /// Values below the axis.
    #[must_use]
    pub fn underflow(&self) -> f64 {
        self.contents[0]
    }

    /// Values at or above the upper edge (and NaN).
    #[must_use]
    pub fn overflow(&self) -> f64 {
        self.contents[self.bins + 1]
    }

    /// Number of fills, in or out of range.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Sum of the in-range bins.
    #[must_use]
    pub fn integral(&self) -> f64 {
        self.contents[1..=self.bins].iter().sum()
    }

    /// Returns true if nothing was filled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}
