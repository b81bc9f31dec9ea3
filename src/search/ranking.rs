use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use crate::core::stats::{BandCounts, QualityMetrics, RatedEntry};
use crate::core::types::Record;

pub const TOP_RATED_LIMIT: usize = 10;
pub const HIGH_BAND: f64 = 0.8;
pub const MEDIUM_BAND: f64 = 0.5;

/// Candidate for the top-rated list.
#[derive(Debug, Clone)]
pub struct RankedRecord {
    pub seq: usize,  // insertion position, lower ranks higher on ties
    pub score: f64,
    pub id: String,
    pub kind: Option<String>,
}

// Greater = better: higher score, then earlier insertion.
impl Ord for RankedRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for RankedRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RankedRecord {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankedRecord {}

/// Top-K collector backed by a bounded min-heap
pub struct TopKCollector {
    pub heap: BinaryHeap<Reverse<RankedRecord>>,
    pub k: usize,
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        TopKCollector {
            heap: BinaryHeap::with_capacity(k + 1),
            k,
        }
    }

    pub fn collect(&mut self, candidate: RankedRecord) {
        if self.k == 0 {
            return;
        }

        if self.heap.len() < self.k {
            self.heap.push(Reverse(candidate));
            return;
        }

        let beats_worst = self
            .heap
            .peek()
            .map(|Reverse(worst)| candidate > *worst)
            .unwrap_or(true);
        if beats_worst {
            self.heap.pop();
            self.heap.push(Reverse(candidate));
        }
    }

    /// Best first.
    pub fn get_results(self) -> Vec<RankedRecord> {
        let mut results: Vec<_> = self.heap.into_iter().map(|Reverse(r)| r).collect();
        results.sort_by(|a, b| b.cmp(a));
        results
    }
}

/// Recomputes aggregate quality statistics from the record index.
#[derive(Debug, Clone, Copy)]
pub struct RankingEngine {
    pub top_k: usize,
}

impl Default for RankingEngine {
    fn default() -> Self {
        RankingEngine {
            top_k: TOP_RATED_LIMIT,
        }
    }
}

impl RankingEngine {
    pub fn new(top_k: usize) -> Self {
        RankingEngine { top_k }
    }

    /// Full rescan. `records` must be in insertion order.
    pub fn recompute<'a, I>(&self, records: I) -> QualityMetrics
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut bands = BandCounts::default();
        let mut histogram: BTreeMap<String, usize> = BTreeMap::new();
        let mut collector = TopKCollector::new(self.top_k);
        let mut sum = 0.0;
        let mut total = 0usize;

        for (seq, record) in records.into_iter().enumerate() {
            let score = record.quality_score;
            total += 1;
            sum += score;

            if score >= HIGH_BAND {
                bands.high += 1;
            } else if score >= MEDIUM_BAND {
                bands.medium += 1;
            } else {
                bands.low += 1;
            }

            *histogram.entry(histogram_bucket(score)).or_insert(0) += 1;

            collector.collect(RankedRecord {
                seq,
                score,
                id: record.id.clone(),
                kind: record.content.kind.clone(),
            });
        }

        let average_score = if total == 0 { 0.0 } else { sum / total as f64 };

        let top_rated = collector
            .get_results()
            .into_iter()
            .map(|r| RatedEntry {
                id: r.id,
                score: r.score,
                kind: r.kind,
            })
            .collect();

        QualityMetrics {
            total,
            band_counts: bands,
            average_score,
            histogram,
            top_rated,
        }
    }
}

/// Score rounded down to one decimal, e.g. 0.82 -> "0.8".
///
/// Compares against the same `k / 10.0` literals the bands use, so a score
/// counted as medium never lands in the "0.8" bucket.
pub fn histogram_bucket(score: f64) -> String {
    let tenths = (1..=10u32)
        .rev()
        .find(|&k| score >= k as f64 / 10.0)
        .unwrap_or(0);
    format!("{:.1}", tenths as f64 / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::core::types::RecordContent;

    fn record(id: &str, score: f64) -> Record {
        Record {
            id: id.to_string(),
            content: RecordContent::new().with_kind("artifact"),
            quality_score: score,
            source: "test".to_string(),
            metadata: Default::default(),
            stored_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_index() {
        let metrics = RankingEngine::default().recompute(&Vec::<Record>::new());
        assert_eq!(metrics.total, 0);
        assert_eq!(metrics.average_score, 0.0);
        assert!(metrics.top_rated.is_empty());
        assert!(metrics.histogram.is_empty());
    }

    #[test]
    fn test_bands_average_histogram() {
        let records = vec![
            record("a", 0.95),
            record("b", 0.8),
            record("c", 0.5),
            record("d", 0.49),
            record("e", 0.0),
        ];
        let metrics = RankingEngine::default().recompute(&records);

        assert_eq!(metrics.total, 5);
        assert_eq!(metrics.band_counts, BandCounts { high: 2, medium: 1, low: 2 });
        assert!((metrics.average_score - 2.74 / 5.0).abs() < 1e-12);
        assert_eq!(metrics.histogram.get("0.9"), Some(&1));
        assert_eq!(metrics.histogram.get("0.8"), Some(&1));
        assert_eq!(metrics.histogram.get("0.5"), Some(&1));
        assert_eq!(metrics.histogram.get("0.4"), Some(&1));
        assert_eq!(metrics.histogram.get("0.0"), Some(&1));
    }

    #[test]
    fn test_top_rated_bounded_and_sorted() {
        let records: Vec<_> = (0..25)
            .map(|i| record(&format!("r{}", i), (i % 13) as f64 / 13.0))
            .collect();
        let metrics = RankingEngine::default().recompute(&records);

        assert_eq!(metrics.top_rated.len(), TOP_RATED_LIMIT);
        for pair in metrics.top_rated.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(metrics.top_rated[0].kind.as_deref(), Some("artifact"));
    }

    #[test]
    fn test_ties_prefer_earlier_insertion() {
        let records = vec![
            record("first", 0.6),
            record("low", 0.1),
            record("second", 0.6),
            record("third", 0.6),
        ];
        let metrics = RankingEngine::new(2).recompute(&records);
        let ids: Vec<_> = metrics.top_rated.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_matches_stable_sort() {
        let scores = [0.3, 0.9, 0.3, 0.7, 0.9, 0.1, 0.7, 0.3, 0.9, 0.5, 0.7, 0.9, 0.2];
        let records: Vec<_> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| record(&format!("r{}", i), *s))
            .collect();

        let mut expected: Vec<_> = records.iter().collect();
        expected.sort_by(|a, b| b.quality_score.total_cmp(&a.quality_score));
        let expected: Vec<_> = expected.iter().take(10).map(|r| r.id.clone()).collect();

        let got: Vec<_> = RankingEngine::default()
            .recompute(&records)
            .top_rated
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_histogram_bucket_edges() {
        assert_eq!(histogram_bucket(0.0), "0.0");
        assert_eq!(histogram_bucket(0.09), "0.0");
        assert_eq!(histogram_bucket(0.7), "0.7");
        assert_eq!(histogram_bucket(0.82), "0.8");
        assert_eq!(histogram_bucket(0.999), "0.9");
        assert_eq!(histogram_bucket(1.0), "1.0");
        assert_eq!(histogram_bucket(0.1 + 0.2), "0.3");
        assert_eq!(histogram_bucket(-0.5), "0.0");
        assert_eq!(histogram_bucket(f64::NAN), "0.0");
    }

    #[test]
    fn test_bucket_agrees_with_band_near_threshold() {
        let just_below = [0.79999999995, 0.7999999999999999, 0.1 + 0.7];
        let records: Vec<_> = just_below
            .iter()
            .enumerate()
            .map(|(i, s)| record(&format!("r{}", i), *s))
            .collect();
        let metrics = RankingEngine::default().recompute(&records);

        assert_eq!(metrics.band_counts.medium, 3);
        assert_eq!(metrics.band_counts.high, 0);
        assert_eq!(metrics.histogram.get("0.7"), Some(&3));
        assert!(metrics.histogram.get("0.8").is_none());
        assert_eq!(histogram_bucket(HIGH_BAND), "0.8");
        assert_eq!(histogram_bucket(MEDIUM_BAND), "0.5");
    }
}
