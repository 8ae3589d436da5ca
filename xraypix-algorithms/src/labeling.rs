//! Connected-component labeling of an event's hit pixels.

use xraypix_core::PixelHit;

/// Cluster assignment for every pixel of one event.
///
/// Ids run from 1 to `num_clusters` and are handed out in the order the
/// first (lowest-index) pixel of each cluster appears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterLabels {
    labels: Vec<u32>,
    num_clusters: usize,
}

impl ClusterLabels {
    /// Labels for a lone pixel that forms its own cluster.
    #[must_use]
    pub fn singleton() -> Self {
        Self {
            labels: vec![1],
            num_clusters: 1,
        }
    }

    /// Wraps a finished label vector.
    pub(crate) fn from_labels(labels: Vec<u32>, num_clusters: usize) -> Self {
        debug_assert!(labels.iter().all(|&l| l != 0));
        Self {
            labels,
            num_clusters,
        }
    }

    /// Label of every pixel, index-aligned with the event.
    #[must_use]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Cluster id of pixel `index`.
    #[must_use]
    pub fn label(&self, index: usize) -> u32 {
        self.labels[index]
    }

    /// Number of distinct clusters.
    #[must_use]
    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    /// Returns true if no pixel was labeled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Indices of the pixels in cluster `id`.
    pub fn members(&self, id: u32) -> impl Iterator<Item = usize> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(move |&(_, &l)| l == id)
            .map(|(i, _)| i)
    }

    /// Number of pixels in cluster `id`.
    #[must_use]
    pub fn cluster_size(&self, id: u32) -> usize {
        self.members(id).count()
    }

    /// Returns true if pixels `a` and `b` belong to the same cluster.
    #[must_use]
    pub fn same_cluster(&self, a: usize, b: usize) -> bool {
        self.labels[a] == self.labels[b]
    }

    /// Charge sum of every cluster, zero sums included, in id order.
    #[must_use]
    pub fn cluster_sums(&self, pixels: &[PixelHit]) -> Vec<f64> {
        let mut sums = vec![0.0; self.num_clusters];
        for (pixel, &label) in pixels.iter().zip(&self.labels) {
            sums[label as usize - 1] += pixel.charge;
        }
        sums
    }
}

/// Trait for cluster finding strategies.
///
/// Implementations partition the pixels of one event into 8-connected
/// components. All strategies must produce the same grouping and the same
/// seed-ordered ids for a given input.
pub trait ClusterFinder: Send + Sync {
    /// Algorithm name.
    fn name(&self) -> &'static str;

    /// Labels every pixel with its cluster id.
    fn label(&self, pixels: &[PixelHit]) -> ClusterLabels;
}

impl<T: ClusterFinder + ?Sized> ClusterFinder for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn label(&self, pixels: &[PixelHit]) -> ClusterLabels {
        (**self).label(pixels)
    }
}

/// Depth-first flood fill driven by an explicit stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloodFillClustering;

impl FloodFillClustering {
    /// Creates a new flood fill instance.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ClusterFinder for FloodFillClustering {
    fn name(&self) -> &'static str {
        "FloodFill"
    }

    #[allow(clippy::cast_possible_truncation)]
    fn label(&self, pixels: &[PixelHit]) -> ClusterLabels {
        let n = pixels.len();
        let mut labels = vec![0u32; n];
        let mut stack = Vec::with_capacity(n);
        let mut next_id = 0u32;

        for seed in 0..n {
            if labels[seed] != 0 {
                continue;
            }

            next_id += 1;
            labels[seed] = next_id;
            stack.push(seed);

            while let Some(current) = stack.pop() {
                let pixel = &pixels[current];
                for (j, other) in pixels.iter().enumerate() {
                    if labels[j] == 0 && pixel.is_adjacent(other) {
                        labels[j] = next_id;
                        stack.push(j);
                    }
                }
            }
        }

        ClusterLabels::from_labels(labels, next_id as usize)
    }
}
