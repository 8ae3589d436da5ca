//! Pixel hits and per-event readout records.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of hit pixels a single readout event can carry.
pub const MAX_PIXELS: usize = 200;

/// A single hit pixel reported by the readout.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelHit {
    /// Chip (read-out chip) the pixel belongs to.
    pub chip_id: u8,
    /// Column on the chip.
    pub column: u8,
    /// Row on the chip.
    pub row: u8,
    /// Raw pulse height as recorded by the readout.
    pub value: f64,
    /// Calibrated charge. May be zero or negative.
    pub charge: f64,
}

impl PixelHit {
    /// Creates a new pixel hit with the raw value set to zero.
    #[inline]
    #[must_use]
    pub fn new(chip_id: u8, column: u8, row: u8, charge: f64) -> Self {
        Self {
            chip_id,
            column,
            row,
            value: 0.0,
            charge,
        }
    }

    /// Sets the raw pulse height.
    #[inline]
    #[must_use]
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    /// Checks if this pixel touches another (8-connectivity).
    ///
    /// Two pixels are adjacent when neither their column nor their row
    /// differs by more than one and they are not the same cell.
    #[inline]
    #[must_use]
    pub fn is_adjacent(&self, other: &Self) -> bool {
        let dc = self.column.abs_diff(other.column);
        let dr = self.row.abs_diff(other.row);
        dc <= 1 && dr <= 1 && (dc != 0 || dr != 0)
    }
}

/// One readout event: every pixel hit recorded for a single trigger on one chip.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "EventRecordData"))]
pub struct EventRecord {
    /// Readout header word.
    pub header: u16,
    /// Readout trailer word.
    pub trailer: u16,
    /// DAC setting the event was taken at.
    pub dac: u16,
    chip_id: u8,
    pixels: Vec<PixelHit>,
}

/// Unchecked wire form of [`EventRecord`]; decoding goes through [`EventRecord::new`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct EventRecordData {
    header: u16,
    trailer: u16,
    dac: u16,
    chip_id: u8,
    pixels: Vec<PixelHit>,
}

#[cfg(feature = "serde")]
impl TryFrom<EventRecordData> for EventRecord {
    type Error = Error;

    fn try_from(data: EventRecordData) -> Result<Self> {
        Ok(Self::new(data.chip_id, data.pixels)?.with_readout(data.header, data.trailer, data.dac))
    }
}

impl EventRecord {
    /// Creates an event from its hit pixels.
    ///
    /// `chip_id` is only consulted when `pixels` is empty; otherwise the
    /// first pixel's chip is authoritative for the whole event.
    ///
    /// # Errors
    /// Returns [`Error::CapacityExceeded`] if more than [`MAX_PIXELS`] pixels are given.
    pub fn new(chip_id: u8, pixels: Vec<PixelHit>) -> Result<Self> {
        if pixels.len() > MAX_PIXELS {
            return Err(Error::CapacityExceeded {
                hits: pixels.len(),
                max: MAX_PIXELS,
            });
        }
        Ok(Self {
            header: 0,
            trailer: 0,
            dac: 0,
            chip_id,
            pixels,
        })
    }

    /// Creates an event with no hit pixels.
    #[must_use]
    pub fn empty(chip_id: u8) -> Self {
        Self {
            chip_id,
            ..Self::default()
        }
    }

    /// Sets the readout metadata words.
    #[must_use]
    pub fn with_readout(mut self, header: u16, trailer: u16, dac: u16) -> Self {
        self.header = header;
        self.trailer = trailer;
        self.dac = dac;
        self
    }

    /// Returns the chip this event was recorded on.
    #[inline]
    #[must_use]
    pub fn chip_id(&self) -> u8 {
        self.pixels.first().map_or(self.chip_id, |p| p.chip_id)
    }

    /// Returns the number of hit pixels.
    #[inline]
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.pixels.len()
    }

    /// Returns true if the event has no hit pixels.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Returns the hit pixels in readout order.
    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[PixelHit] {
        &self.pixels
    }

    /// Sum of all pixel charges in the event.
    #[must_use]
    pub fn total_charge(&self) -> f64 {
        self.pixels.iter().map(|p| p.charge).sum()
    }
}
