//! Event classification and routing of charge values.
//!
//! Each event is classified by its hit count and its charges are routed
//! into categories:
//!
//! | hits | routed values |
//! |------|---------------|
//! | 0    | none |
//! | 1    | lone charge into `SingleHit` (if nonzero), cluster charge into `AllClustered` |
//! | 2    | raw pair sum into `TwoHitSum`; cluster charges into `AllClustered` and `TwoHitClustered` |
//! | >2   | cluster charges into `AllClustered` and `MultiHitClustered` |

use crate::aggregate::cluster_charges;
use crate::labeling::{ClusterFinder, FloodFillClustering};
use xraypix_core::EventRecord;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Event classes by number of hit pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    /// No hit pixels.
    Empty,
    /// Exactly one hit pixel.
    Single,
    /// Exactly two hit pixels.
    Double,
    /// More than two hit pixels.
    Multi,
}

impl EventClass {
    /// Classifies a hit count.
    #[must_use]
    pub fn from_hit_count(hits: usize) -> Self {
        match hits {
            0 => Self::Empty,
            1 => Self::Single,
            2 => Self::Double,
            _ => Self::Multi,
        }
    }
}

/// Histogram categories a charge value can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Category {
    /// Charge of single-pixel events.
    SingleHit,
    /// Raw summed charge of two-pixel events, before clustering.
    TwoHitSum,
    /// Every nonzero cluster charge of every event.
    AllClustered,
    /// Cluster charges from two-pixel events.
    TwoHitClustered,
    /// Cluster charges from events with more than two pixels.
    MultiHitClustered,
}

impl Category {
    /// All categories in output order.
    pub const ALL: [Category; 5] = [
        Category::SingleHit,
        Category::TwoHitSum,
        Category::AllClustered,
        Category::TwoHitClustered,
        Category::MultiHitClustered,
    ];

    /// Position of this category in [`Category::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stem of the histogram name, completed with the chip number.
    #[must_use]
    pub fn stem(self) -> &'static str {
        match self {
            Category::SingleHit => "OnePixelEvents",
            Category::TwoHitSum => "TwoPixelEvents",
            Category::AllClustered => "All_clustered",
            Category::TwoHitClustered => "TwoPixelEvents_clustered",
            Category::MultiHitClustered => "WithoutOnePixelEvents_clustered",
        }
    }

    /// Histogram name for this category on `chip`.
    #[must_use]
    pub fn histogram_name(self, chip: u8) -> String {
        format!("{}_C{chip}", self.stem())
    }
}

/// Number of events seen per class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventCounts {
    /// Events without hit pixels.
    pub empty: u64,
    /// Single-pixel events.
    pub single: u64,
    /// Two-pixel events.
    pub double: u64,
    /// Events with more than two pixels.
    pub multi: u64,
}

impl EventCounts {
    /// Counts one event of the given class.
    pub fn record(&mut self, class: EventClass) {
        match class {
            EventClass::Empty => self.empty += 1,
            EventClass::Single => self.single += 1,
            EventClass::Double => self.double += 1,
            EventClass::Multi => self.multi += 1,
        }
    }

    /// Total number of events counted.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.empty + self.single + self.double + self.multi
    }

    /// Adds the counts of another run.
    pub fn merge(&mut self, other: &EventCounts) {
        self.empty += other.empty;
        self.single += other.single;
        self.double += other.double;
        self.multi += other.multi;
    }
}

/// Receiver of routed charge values.
pub trait ChargeSink {
    /// Records `value` under `category`.
    fn insert(&mut self, category: Category, value: f64);
}

impl ChargeSink for Vec<(Category, f64)> {
    fn insert(&mut self, category: Category, value: f64) {
        self.push((category, value));
    }
}

/// Drives the per-event pipeline: classify, cluster, route.
#[derive(Debug, Clone, Default)]
pub struct EventClassifier<F = FloodFillClustering> {
    finder: F,
}

impl EventClassifier<FloodFillClustering> {
    /// Creates a classifier using flood fill cluster finding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F: ClusterFinder> EventClassifier<F> {
    /// Creates a classifier with a specific cluster finder.
    pub fn with_finder(finder: F) -> Self {
        Self { finder }
    }

    /// The cluster finder in use.
    pub fn finder(&self) -> &F {
        &self.finder
    }

    /// Classifies `event`, counts it, and routes its charges into `sink`.
    #[allow(clippy::float_cmp)]
    pub fn process<S: ChargeSink + ?Sized>(
        &self,
        event: &EventRecord,
        counts: &mut EventCounts,
        sink: &mut S,
    ) -> EventClass {
        let class = EventClass::from_hit_count(event.hit_count());
        counts.record(class);

        let pixels = event.pixels();
        let size_category = match class {
            EventClass::Empty => return class,
            EventClass::Single => {
                if pixels[0].charge != 0.0 {
                    sink.insert(Category::SingleHit, pixels[0].charge);
                }
                None
            }
            EventClass::Double => {
                sink.insert(Category::TwoHitSum, pixels[0].charge + pixels[1].charge);
                Some(Category::TwoHitClustered)
            }
            EventClass::Multi => Some(Category::MultiHitClustered),
        };

        for charge in cluster_charges(event, &self.finder) {
            sink.insert(Category::AllClustered, charge);
            if let Some(category) = size_category {
                sink.insert(category, charge);
            }
        }

        class
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::UnionFindClustering;
    use xraypix_core::PixelHit;

    fn event(coords: &[(u8, u8, f64)]) -> EventRecord {
        let pixels = coords
            .iter()
            .map(|&(c, r, q)| PixelHit::new(0, c, r, q))
            .collect();
        EventRecord::new(0, pixels).unwrap()
    }

    fn route(ev: &EventRecord) -> (EventClass, EventCounts, Vec<(Category, f64)>) {
        let mut counts = EventCounts::default();
        let mut sink = Vec::new();
        let class = EventClassifier::new().process(ev, &mut counts, &mut sink);
        (class, counts, sink)
    }

    #[test]
    fn test_event_class_from_hits() {
        assert_eq!(EventClass::from_hit_count(0), EventClass::Empty);
        assert_eq!(EventClass::from_hit_count(1), EventClass::Single);
        assert_eq!(EventClass::from_hit_count(2), EventClass::Double);
        assert_eq!(EventClass::from_hit_count(3), EventClass::Multi);
        assert_eq!(EventClass::from_hit_count(200), EventClass::Multi);
    }

    #[test]
    fn test_histogram_names() {
        assert_eq!(Category::SingleHit.histogram_name(0), "OnePixelEvents_C0");
        assert_eq!(Category::TwoHitSum.histogram_name(3), "TwoPixelEvents_C3");
        assert_eq!(Category::AllClustered.histogram_name(15), "All_clustered_C15");
        assert_eq!(
            Category::TwoHitClustered.histogram_name(1),
            "TwoPixelEvents_clustered_C1"
        );
        assert_eq!(
            Category::MultiHitClustered.histogram_name(2),
            "WithoutOnePixelEvents_clustered_C2"
        );
        for (i, category) in Category::ALL.iter().enumerate() {
            assert_eq!(category.index(), i);
        }
    }

    #[test]
    fn test_empty_event_only_counts() {
        let (class, counts, sink) = route(&EventRecord::empty(0));
        assert_eq!(class, EventClass::Empty);
        assert_eq!(counts.empty, 1);
        assert_eq!(counts.total(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_single_hit_routing() {
        let (_, counts, sink) = route(&event(&[(4, 4, 25.0)]));
        assert_eq!(counts.single, 1);
        assert_eq!(
            sink,
            vec![(Category::SingleHit, 25.0), (Category::AllClustered, 25.0)]
        );
    }

    #[test]
    fn test_single_zero_charge_routes_nothing() {
        let (class, counts, sink) = route(&event(&[(4, 4, 0.0)]));
        assert_eq!(class, EventClass::Single);
        assert_eq!(counts.single, 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_two_hit_separate_pixels() {
        let (_, counts, sink) = route(&event(&[(0, 0, 7.0), (9, 9, 8.0)]));
        assert_eq!(counts.double, 1);
        assert_eq!(
            sink,
            vec![
                (Category::TwoHitSum, 15.0),
                (Category::AllClustered, 7.0),
                (Category::TwoHitClustered, 7.0),
                (Category::AllClustered, 8.0),
                (Category::TwoHitClustered, 8.0),
            ]
        );
    }

    #[test]
    fn test_multi_hit_routing() {
        let (class, counts, sink) = route(&event(&[(0, 0, 10.0), (1, 0, 20.0), (5, 5, 30.0)]));
        assert_eq!(class, EventClass::Multi);
        assert_eq!(counts.multi, 1);
        assert_eq!(
            sink,
            vec![
                (Category::AllClustered, 30.0),
                (Category::MultiHitClustered, 30.0),
                (Category::AllClustered, 30.0),
                (Category::MultiHitClustered, 30.0),
            ]
        );
    }

    #[test]
    fn test_custom_finder() {
        let classifier = EventClassifier::with_finder(UnionFindClustering::new());
        assert_eq!(classifier.finder().name(), "UnionFind");

        let mut counts = EventCounts::default();
        let mut sink = Vec::new();
        classifier.process(
            &event(&[(0, 0, 1.0), (1, 1, 2.0), (2, 2, 3.0)]),
            &mut counts,
            &mut sink,
        );
        assert_eq!(
            sink,
            vec![
                (Category::AllClustered, 6.0),
                (Category::MultiHitClustered, 6.0)
            ]
        );
    }

    #[test]
    fn test_counts_merge() {
        let mut a = EventCounts {
            empty: 1,
            single: 2,
            double: 3,
            multi: 4,
        };
        let b = EventCounts {
            empty: 10,
            ..EventCounts::default()
        };
        a.merge(&b);
        assert_eq!(a.empty, 11);
        assert_eq!(a.total(), 20);
    }
}
