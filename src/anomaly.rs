// 🤖 Anomaly Detector - Isolation Forest over past amounts
//
// Each amount is a single-feature observation. The forest is fitted from
// scratch on every call and dropped afterwards.
//
// Scoring follows Liu, Ting & Zhou (2008):
//   score(x)  = -2^(-E[h(x)] / c(psi))
//   offset    = percentile(score(training), 100 * contamination)
//   outlier  <=> score(x) < offset

use crate::config::AnomalySettings;
use crate::error::{Result, TrackerError};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Outcome of scoring one candidate amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum AnomalyVerdict {
    /// History too short to fit a model
    Skipped { history_len: usize },

    Normal { score: f64, offset: f64 },

    Anomalous { score: f64, offset: f64 },

    /// Model fitting failed; treated as not anomalous
    Unavailable { reason: String },
}

impl AnomalyVerdict {
    pub fn is_anomalous(&self) -> bool {
        matches!(self, AnomalyVerdict::Anomalous { .. })
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct AnomalyDetector {
    settings: AnomalySettings,
}

impl AnomalyDetector {
    pub fn new(settings: AnomalySettings) -> Self {
        AnomalyDetector { settings }
    }

    /// True when `candidate` is an outlier against `history`
    pub fn fit_and_score(&self, history: &[f64], candidate: f64) -> bool {
        self.assess(history, candidate).is_anomalous()
    }

    /// Fit a fresh forest on `history` and classify `candidate`.
    /// Never fails: fitting errors degrade to `Unavailable`.
    pub fn assess(&self, history: &[f64], candidate: f64) -> AnomalyVerdict {
        if history.len() <= self.settings.min_history {
            debug!(history_len = history.len(), "history too short, skipping anomaly check");
            return AnomalyVerdict::Skipped {
                history_len: history.len(),
            };
        }

        let forest = match IsolationForest::fit(history, &self.settings) {
            Ok(forest) => forest,
            Err(e) => {
                warn!(error = %e, "anomaly model unavailable, treating entry as normal");
                return AnomalyVerdict::Unavailable {
                    reason: e.to_string(),
                };
            }
        };

        let score = forest.score(candidate);
        let offset = forest.offset();

        if score < offset {
            debug!(candidate, score, offset, "amount flagged as anomalous");
            AnomalyVerdict::Anomalous { score, offset }
        } else {
            AnomalyVerdict::Normal { score, offset }
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(AnomalySettings::default())
    }
}

// ============================================================================
// ISOLATION FOREST
// ============================================================================

#[derive(Debug)]
enum Node {
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn build(values: &mut [f64], max_depth: usize, rng: &mut ChaCha8Rng) -> Self {
        IsolationTree {
            root: grow(values, 0, max_depth, rng),
        }
    }

    fn path_length(&self, x: f64) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;

        loop {
            match node {
                Node::Split {
                    threshold,
                    left,
                    right,
                } => {
                    node = if x < *threshold { left } else { right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

fn grow(values: &mut [f64], depth: usize, max_depth: usize, rng: &mut ChaCha8Rng) -> Node {
    let (min, max) = min_max(values);

    if values.len() <= 1 || depth >= max_depth || min >= max {
        return Node::Leaf { size: values.len() };
    }

    let threshold = rng.gen_range(min..max);

    // Partition in place: [< threshold | >= threshold]
    let mut split = 0;
    for i in 0..values.len() {
        if values[i] < threshold {
            values.swap(i, split);
            split += 1;
        }
    }

    let (left, right) = values.split_at_mut(split);
    Node::Split {
        threshold,
        left: Box::new(grow(left, depth + 1, max_depth, rng)),
        right: Box::new(grow(right, depth + 1, max_depth, rng)),
    }
}

/// Fitted model. Owned by the call that created it.
#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fit on `data`.
    ///
    /// Fails with `ModelFitting` on empty input, non-finite values, when
    /// every value is identical (nothing can be isolated), or when the
    /// settings are out of range (contamination outside (0, 0.5]).
    pub fn fit(data: &[f64], settings: &AnomalySettings) -> Result<Self> {
        if data.is_empty() {
            return Err(TrackerError::ModelFitting("no observations".to_string()));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(TrackerError::ModelFitting(
                "observations must be finite".to_string(),
            ));
        }
        let (min, max) = min_max(data);
        if min >= max {
            return Err(TrackerError::ModelFitting(format!(
                "all {} observations are identical ({})",
                data.len(),
                min
            )));
        }
        if !(settings.contamination > 0.0 && settings.contamination <= 0.5) {
            return Err(TrackerError::ModelFitting(format!(
                "contamination must be in (0, 0.5], got {}",
                settings.contamination
            )));
        }
        if settings.n_estimators == 0 || settings.max_samples == 0 {
            return Err(TrackerError::ModelFitting(
                "forest needs at least one tree and one sample".to_string(),
            ));
        }

        let sample_size = settings.max_samples.min(data.len());
        let max_depth = (sample_size as f64).log2().ceil().max(0.0) as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);

        let mut trees = Vec::with_capacity(settings.n_estimators);
        for _ in 0..settings.n_estimators {
            let mut sample: Vec<f64> = index::sample(&mut rng, data.len(), sample_size)
                .into_iter()
                .map(|i| data[i])
                .collect();
            trees.push(IsolationTree::build(&mut sample, max_depth, &mut rng));
        }

        let mut forest = IsolationForest {
            trees,
            sample_size,
            offset: 0.0,
        };

        let training_scores: Vec<f64> = data.iter().map(|&x| forest.score(x)).collect();
        forest.offset = percentile(&training_scores, 100.0 * settings.contamination);

        Ok(forest)
    }

    /// Opposite of the anomaly score: lower means more abnormal, range [-1, 0)
    pub fn score(&self, x: f64) -> f64 {
        let mean_depth = self
            .trees
            .iter()
            .map(|tree| tree.path_length(x))
            .sum::<f64>()
            / self.trees.len() as f64;

        let normalizer = average_path_length(self.sample_size);
        if normalizer == 0.0 {
            return -0.5;
        }

        -(2f64.powf(-mean_depth / normalizer))
    }

    /// Decision threshold fitted from the contamination fraction
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn is_outlier(&self, x: f64) -> bool {
        self.score(x) < self.offset
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile, `q` in [0, 100]
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn steady_history() -> Vec<f64> {
        [10.0, 10.5, 11.0, 11.5, 12.0]
            .iter()
            .cycle()
            .take(20)
            .copied()
            .collect()
    }

    #[test]
    fn test_short_history_is_never_scored() {
        let detector = AnomalyDetector::default();

        for len in 0..=5 {
            let history = vec![10.0; len];
            assert!(!detector.fit_and_score(&history, 1_000_000.0));
            assert_eq!(
                detector.assess(&history, 1_000_000.0),
                AnomalyVerdict::Skipped { history_len: len }
            );
        }
    }

    #[test]
    fn test_extreme_amount_is_flagged() {
        let detector = AnomalyDetector::default();
        let history = [10.0, 12.0, 11.0, 9.0, 13.0, 10.0, 500.0];

        assert!(detector.fit_and_score(&history, 500.0));
    }

    #[test]
    fn test_typical_amount_is_not_flagged() {
        let detector = AnomalyDetector::default();
        let mut history = steady_history();
        history.push(11.0);

        let verdict = detector.assess(&history, 11.0);
        assert!(
            matches!(verdict, AnomalyVerdict::Normal { .. }),
            "got {:?}",
            verdict
        );
    }

    #[test]
    fn test_identical_history_degrades_gracefully() {
        let detector = AnomalyDetector::default();
        let history = vec![25.0; 10];

        let verdict = detector.assess(&history, 25.0);

        assert!(matches!(verdict, AnomalyVerdict::Unavailable { .. }));
        assert!(!verdict.is_anomalous());
    }

    #[test]
    fn test_non_finite_history_degrades_gracefully() {
        let detector = AnomalyDetector::default();
        let history = [1.0, 2.0, 3.0, f64::NAN, 5.0, 6.0, 7.0];

        assert!(!detector.fit_and_score(&history, 7.0));
    }

    #[test]
    fn test_out_of_range_contamination_degrades_gracefully() {
        let history = [10.0, 12.0, 11.0, 9.0, 13.0, 10.0, 500.0];

        for contamination in [1.5, 0.0, -0.1, 0.75, f64::NAN] {
            let detector = AnomalyDetector::new(AnomalySettings {
                contamination,
                ..AnomalySettings::default()
            });

            let verdict = detector.assess(&history, 500.0);
            assert!(
                matches!(verdict, AnomalyVerdict::Unavailable { .. }),
                "contamination {} gave {:?}",
                contamination,
                verdict
            );
            assert!(!detector.fit_and_score(&history, 500.0));
        }
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let detector = AnomalyDetector::default();
        let history = [4.0, 18.5, 7.25, 9.0, 33.0, 12.0, 5.5, 8.0, 41.0, 6.0];

        let first = detector.assess(&history, 33.0);
        for _ in 0..5 {
            assert_eq!(detector.assess(&history, 33.0), first);
        }
    }

    #[test]
    fn test_fit_rejects_degenerate_input() {
        let settings = AnomalySettings::default();

        assert!(matches!(
            IsolationForest::fit(&[], &settings),
            Err(TrackerError::ModelFitting(_))
        ));
        assert!(matches!(
            IsolationForest::fit(&[3.0, 3.0, 3.0], &settings),
            Err(TrackerError::ModelFitting(_))
        ));
    }

    #[test]
    fn test_scores_rank_outliers_lower() {
        let mut data = steady_history();
        data.push(250.0);
        let forest = IsolationForest::fit(&data, &AnomalySettings::default()).unwrap();

        let typical = forest.score(11.0);
        let extreme = forest.score(250.0);

        assert!(extreme < typical);
        assert!((-1.0..0.0).contains(&typical));
        assert!(forest.is_outlier(250.0));
    }

    #[test]
    fn test_sample_size_is_capped() {
        let data: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let forest = IsolationForest::fit(&data, &AnomalySettings::default()).unwrap();

        assert_eq!(forest.sample_size, 256);
        assert_eq!(forest.trees.len(), 100);
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) is about 10.24
        assert!((average_path_length(256) - 10.244).abs() < 0.01);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];

        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert!((percentile(&values, 10.0) - 1.3).abs() < 1e-12);
    }
}
