//! xraypix-algorithms: Cluster finding for pixel detector events.
//!
//! This crate provides:
//! - **Flood fill** - explicit-stack depth-first connected components (default)
//! - **Union-find** - disjoint-set connected components with seed-order renumbering
//! - **Aggregation** - per-cluster charge sums
//! - **Classification** - routing of charge values into per-chip histograms
//!
#![warn(missing_docs)]

mod accumulate;
mod aggregate;
mod classify;
mod graph;
mod labeling;

pub use accumulate::ChipAccumulators;
pub use aggregate::{cluster_charges, ClusterCharges};
pub use classify::{Category, ChargeSink, EventClass, EventClassifier, EventCounts};
pub use graph::UnionFindClustering;
pub use labeling::{ClusterFinder, ClusterLabels, FloodFillClustering};
