//! Anomaly scores and the seed weights derived from them.
//!
//! Every point carries one real-valued anomaly score, lower meaning "more
//! normal". Scores come either from the caller or from an [`AnomalyScorer`].
//! Seeding turns them into a probability distribution so that anomalous
//! points are unlikely to become the first center.

use crate::covariance::{estimate_covariance, ShrinkageEstimator, DEFAULT_CONDITION_THRESHOLD};
use crate::dataset::Dataset;
use crate::distance::MahalanobisMetric;
use crate::error::{Error, Result};
use ndarray::Axis;

/// Produces one anomaly score per point.
pub trait AnomalyScorer {
    /// Score every row of `data`. Must return exactly `data.n_points()` values.
    fn score(&self, data: &Dataset) -> Result<Vec<f64>>;
}

/// Squared Mahalanobis distance of each point to the dataset mean.
///
/// An elliptic-envelope style score: the covariance is estimated the same
/// way as for clustering (sample covariance, shrinkage when ill-conditioned),
/// so points far outside the bulk of the data in covariance-aware terms get
/// high scores.
#[derive(Debug, Clone)]
pub struct EllipticScorer {
    condition_threshold: f64,
}

impl EllipticScorer {
    /// Scorer with the default condition threshold.
    pub fn new() -> Self {
        Self {
            condition_threshold: DEFAULT_CONDITION_THRESHOLD,
        }
    }

    /// Condition number above which shrinkage is used.
    pub fn with_condition_threshold(mut self, threshold: f64) -> Self {
        self.condition_threshold = threshold;
        self
    }
}

impl Default for EllipticScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyScorer for EllipticScorer {
    fn score(&self, data: &Dataset) -> Result<Vec<f64>> {
        let estimate =
            estimate_covariance(data, self.condition_threshold, &ShrinkageEstimator::new())?;
        let metric = MahalanobisMetric::from_covariance(&estimate.matrix)?;
        let mean = data.view().mean_axis(Axis(0)).ok_or(Error::EmptyInput)?;
        let mean = mean.view();

        Ok(data
            .view()
            .outer_iter()
            .map(|row| metric.squared_distance(&row, &mean))
            .collect())
    }
}

/// How anomaly scores become first-seed sampling weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedWeighting {
    /// `w ∝ exp(-score)`.
    #[default]
    Exponential,
    /// `w ∝ (max_score - score) + 1`.
    Linear,
}

/// Normalised seed weights for `scores`.
///
/// The result sums to 1. Equal scores give the uniform distribution under
/// either policy.
pub fn seed_weights(scores: &[f64], weighting: SeedWeighting) -> Result<Vec<f64>> {
    if scores.is_empty() {
        return Err(Error::EmptyInput);
    }
    if let Some(i) = scores.iter().position(|s| !s.is_finite()) {
        return Err(Error::NonFiniteValue { row: i, col: 0 });
    }

    let raw: Vec<f64> = match weighting {
        SeedWeighting::Exponential => {
            // exp(-(s - min)) is proportional to exp(-s) and cannot underflow
            // to all zeros.
            let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
            scores.iter().map(|s| (-(s - min)).exp()).collect()
        }
        SeedWeighting::Linear => {
            let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            scores.iter().map(|s| (max - s) + 1.0).collect()
        }
    };

    let total: f64 = raw.iter().sum();
    if !total.is_finite() {
        return Err(Error::InvalidParameter {
            name: "scores",
            message: "score range overflows the seed weights",
        });
    }
    if total <= 0.0 {
        return Err(Error::DegenerateWeights {
            stage: "anomaly weighting",
        });
    }
    Ok(raw.into_iter().map(|w| w / total).collect())
}
