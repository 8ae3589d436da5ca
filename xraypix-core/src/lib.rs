//! xraypix-core: Core types for pixel detector X-ray test processing.
//!
//! This crate provides the event record read from a detector readout,
//! the pixel hit type with its adjacency rule, and the fixed-binning
//! histogram that collects cluster charge spectra.
//!

pub mod error;
pub mod event;
pub mod histogram;

pub use error::{Error, Result};
pub use event::{EventRecord, PixelHit, MAX_PIXELS};
pub use histogram::{Histogram1D, HistogramConfig};
