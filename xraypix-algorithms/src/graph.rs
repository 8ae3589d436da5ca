//! Graph-based cluster finding.
//!
//! Uses a union-find data structure to join adjacent pixels, then
//! renumbers the resulting components in seed order.

use crate::labeling::{ClusterFinder, ClusterLabels};
use xraypix_core::PixelHit;

/// Graph-based clustering using union-find.
///
/// Every adjacent pixel pair is an edge; components are the connected
/// subgraphs. Produces the same labels as [`crate::FloodFillClustering`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnionFindClustering;

impl UnionFindClustering {
    /// Creates a new union-find clustering instance.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Union-Find data structure for connected component detection.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, x: usize, y: usize) {
        let px = self.find(x);
        let py = self.find(y);

        if px == py {
            return;
        }

        match self.rank[px].cmp(&self.rank[py]) {
            std::cmp::Ordering::Less => self.parent[px] = py,
            std::cmp::Ordering::Greater => self.parent[py] = px,
            std::cmp::Ordering::Equal => {
                self.parent[py] = px;
                self.rank[px] += 1;
            }
        }
    }
}

impl ClusterFinder for UnionFindClustering {
    fn name(&self) -> &'static str {
        "UnionFind"
    }

    #[allow(clippy::cast_possible_truncation)]
    fn label(&self, pixels: &[PixelHit]) -> ClusterLabels {
        let n = pixels.len();
        let mut uf = UnionFind::new(n);

        for i in 0..n {
            for j in (i + 1)..n {
                if pixels[i].is_adjacent(&pixels[j]) {
                    uf.union(i, j);
                }
            }
        }

        // Roots get ids in the order their first member shows up.
        let mut root_ids = vec![0u32; n];
        let mut labels = Vec::with_capacity(n);
        let mut next_id = 0u32;
        for i in 0..n {
            let root = uf.find(i);
            if root_ids[root] == 0 {
                next_id += 1;
                root_ids[root] = next_id;
            }
            labels.push(root_ids[root]);
        }

        ClusterLabels::from_labels(labels, next_id as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FloodFillClustering;

    #[test]
    fn test_union_find() {
        let mut uf = UnionFind::new(5);
        uf.union(0, 1);
        uf.union(2, 3);
        uf.union(1, 2);

        assert_eq!(uf.find(0), uf.find(3));
        assert_ne!(uf.find(0), uf.find(4));
    }

    #[test]
    fn test_graph_separate_clusters() {
        let pixels = vec![
            PixelHit::new(0, 0, 0, 10.0),
            PixelHit::new(0, 1, 0, 15.0),
            PixelHit::new(0, 100, 100, 20.0),
            PixelHit::new(0, 101, 101, 25.0),
        ];

        let labels = UnionFindClustering::new().label(&pixels);
        assert_eq!(labels.labels(), &[1, 1, 2, 2]);
    }

    #[test]
    fn test_graph_empty_input() {
        let labels = UnionFindClustering::new().label(&[]);
        assert!(labels.is_empty());
        assert_eq!(labels.num_clusters(), 0);
    }

    #[test]
    fn test_graph_matches_flood_fill_ids() {
        // Later pixels merge two earlier components; ids still follow seed order.
        let pixels = vec![
            PixelHit::new(0, 7, 7, 1.0),
            PixelHit::new(0, 0, 0, 1.0),
            PixelHit::new(0, 2, 0, 1.0),
            PixelHit::new(0, 20, 20, 1.0),
            PixelHit::new(0, 1, 1, 1.0),
        ];

        let graph = UnionFindClustering::new().label(&pixels);
        let flood = FloodFillClustering::new().label(&pixels);
        assert_eq!(graph, flood);
        assert_eq!(graph.labels(), &[1, 2, 2, 3, 2]);
    }
}
