//! Per-cluster charge aggregation.

use crate::labeling::{ClusterFinder, ClusterLabels};
use xraypix_core::{EventRecord, PixelHit};

/// Lazy sequence of nonzero cluster charge sums for one event.
///
/// Owns the event's transient labeling, so labels never outlive the
/// event they were computed for. Sums are produced in ascending cluster
/// id order; clusters whose charge adds up to exactly zero are skipped.
#[derive(Debug)]
pub struct ClusterCharges<'a> {
    pixels: &'a [PixelHit],
    labels: ClusterLabels,
    next_id: u32,
}

impl<'a> ClusterCharges<'a> {
    /// Pairs a labeling with the pixels it was computed from.
    pub(crate) fn new(pixels: &'a [PixelHit], labels: ClusterLabels) -> Self {
        debug_assert_eq!(
            pixels.len(),
            labels.labels().len(),
            "labels must be index-aligned with pixels"
        );
        Self {
            pixels,
            labels,
            next_id: 1,
        }
    }

    /// The labeling the sums are taken over.
    #[must_use]
    pub fn labels(&self) -> &ClusterLabels {
        &self.labels
    }

    fn sum_for(&self, id: u32) -> f64 {
        self.labels.members(id).map(|i| self.pixels[i].charge).sum()
    }
}

impl Iterator for ClusterCharges<'_> {
    type Item = f64;

    #[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
    fn next(&mut self) -> Option<Self::Item> {
        let last = self.labels.num_clusters() as u32;
        while self.next_id <= last {
            let id = self.next_id;
            self.next_id += 1;

            let sum = self.sum_for(id);
            if sum != 0.0 {
                return Some(sum);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.labels.num_clusters() + 1).saturating_sub(self.next_id as usize);
        (0, Some(remaining))
    }
}

/// Finds the clusters of `event` and returns their nonzero charge sums.
///
/// An event with no pixels has no clusters. A single pixel is already a
/// complete cluster and skips the finder entirely.
pub fn cluster_charges<'a, F>(event: &'a EventRecord, finder: &F) -> ClusterCharges<'a>
where
    F: ClusterFinder + ?Sized,
{
    let pixels = event.pixels();
    let labels = match pixels.len() {
        0 => ClusterLabels::default(),
        1 => ClusterLabels::singleton(),
        _ => finder.label(pixels),
    };
    ClusterCharges::new(pixels, labels)
}
