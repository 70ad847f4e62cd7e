//! Anomaly-aware Mahalanobis K-means.
//!
//! Partitions data into k clusters by minimizing the **within-cluster
//! Mahalanobis dispersion**:
//!
//! ```text
//! S = Σₖ Σᵢ∈Cₖ (xᵢ - μₖ)ᵀ Σ⁻¹ (xᵢ - μₖ)
//! ```
//!
//! where Σ is one covariance matrix estimated from the whole dataset. Plain
//! k-means assumes isotropic clusters; scaling by Σ⁻¹ lets clusters follow
//! the correlation structure of the features instead.
//!
//! # Pipeline
//!
//! 1. Estimate Σ (sample covariance, shrinkage when ill-conditioned) and
//!    invert it once.
//! 2. Turn per-point anomaly scores into first-seed weights.
//! 3. Repeat `n_repeats` times: anomaly-aware k-means++ seeding, then Lloyd
//!    iteration under the Mahalanobis metric.
//! 4. Keep the restart with the lowest dispersion.
//!
//! # Failure Modes
//!
//! - **Singular covariance**: constant or duplicated features make Σ
//!   singular; the shrinkage fallback usually repairs this, otherwise the
//!   run fails with a numerical error
//! - **k too large**: fewer distinct points than k makes seeding degenerate
//! - **Local optima**: mitigated, not solved, by restarts

use super::lloyd::Convergence;
use super::restart::{run_restarts, RestartConfig, RunResult};
use super::traits::Clustering;
use crate::anomaly::{seed_weights, AnomalyScorer, EllipticScorer, SeedWeighting};
use crate::covariance::{
    condition_number, estimate_covariance, CovarianceEstimate, CovarianceShrinker,
    CovarianceSource, ShrinkageEstimator, DEFAULT_CONDITION_THRESHOLD,
};
use crate::dataset::Dataset;
use crate::distance::MahalanobisMetric;
use crate::error::{Error, Result};
use ndarray::Array2;
use rand::prelude::*;

/// Mahalanobis K-means with anomaly-aware seeding.
#[derive(Debug, Clone)]
pub struct MahalanobisKmeans {
    /// Number of clusters.
    k: usize,
    /// Maximum Lloyd iterations per restart.
    max_iter: usize,
    /// Number of restarts.
    n_repeats: usize,
    /// Center equality rule.
    convergence: Convergence,
    /// Score-to-weight policy for the first seed.
    weighting: SeedWeighting,
    /// Condition number that triggers shrinkage.
    condition_threshold: f64,
    /// Random seed.
    seed: Option<u64>,
    /// Caller-supplied covariance.
    covariance: Option<Array2<f64>>,
}

impl MahalanobisKmeans {
    /// Create a new clusterer.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 50,
            n_repeats: 100,
            convergence: Convergence::Exact,
            weighting: SeedWeighting::Exponential,
            condition_threshold: DEFAULT_CONDITION_THRESHOLD,
            seed: None,
            covariance: None,
        }
    }

    /// Set maximum iterations per restart.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the number of restarts.
    pub fn with_n_repeats(mut self, n_repeats: usize) -> Self {
        self.n_repeats = n_repeats;
        self
    }

    /// Set the convergence rule.
    pub fn with_convergence(mut self, convergence: Convergence) -> Self {
        self.convergence = convergence;
        self
    }

    /// Set the anomaly weighting policy.
    pub fn with_weighting(mut self, weighting: SeedWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Set the condition number above which shrinkage replaces the sample
    /// covariance.
    pub fn with_condition_threshold(mut self, threshold: f64) -> Self {
        self.condition_threshold = threshold;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Use this covariance instead of estimating one.
    pub fn with_covariance(mut self, covariance: Array2<f64>) -> Self {
        self.covariance = Some(covariance);
        self
    }

    /// Cluster `data` using caller-supplied anomaly `scores`.
    pub fn fit(&self, data: &Dataset, scores: &[f64]) -> Result<FittedModel> {
        self.fit_with_shrinker(data, scores, &ShrinkageEstimator::new())
    }

    /// Cluster `data`, computing anomaly scores with `scorer`.
    pub fn fit_with_scorer<S: AnomalyScorer + ?Sized>(
        &self,
        data: &Dataset,
        scorer: &S,
    ) -> Result<FittedModel> {
        self.validate(data)?;
        let scores = scorer.score(data)?;
        self.fit(data, &scores)
    }

    /// Cluster `data` with a custom shrinkage fallback.
    pub fn fit_with_shrinker(
        &self,
        data: &Dataset,
        scores: &[f64],
        shrinker: &dyn CovarianceShrinker,
    ) -> Result<FittedModel> {
        let mut rng: Box<dyn RngCore> = match self.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };
        self.fit_with_rng(data, scores, shrinker, &mut rng)
    }

    /// Cluster `data` drawing all randomness from `rng`.
    ///
    /// The configured seed is ignored.
    pub fn fit_with_rng<R: Rng>(
        &self,
        data: &Dataset,
        scores: &[f64],
        shrinker: &dyn CovarianceShrinker,
        rng: &mut R,
    ) -> Result<FittedModel> {
        self.validate(data)?;
        if scores.len() != data.n_points() {
            return Err(Error::ScoreCountMismatch {
                expected: data.n_points(),
                found: scores.len(),
            });
        }
        let weights = seed_weights(scores, self.weighting)?;

        let covariance = self.covariance_for(data, shrinker)?;
        let metric = MahalanobisMetric::from_covariance(&covariance.matrix)?;
        tracing::debug!(
            n = data.n_points(),
            p = data.n_features(),
            k = self.k,
            source = ?covariance.source,
            condition = covariance.condition,
            "metric ready"
        );

        let config = RestartConfig {
            k: self.k,
            max_iter: self.max_iter,
            n_repeats: self.n_repeats,
            convergence: self.convergence,
        };
        let result = run_restarts(data, &weights, &metric, &config, rng)?;

        Ok(FittedModel {
            result,
            metric,
            covariance,
        })
    }

    fn validate(&self, data: &Dataset) -> Result<()> {
        let n = data.n_points();
        if self.k == 0 || self.k > n {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items: n,
            });
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be > 0",
            });
        }
        if self.n_repeats == 0 {
            return Err(Error::InvalidParameter {
                name: "n_repeats",
                message: "must be > 0",
            });
        }
        if self.condition_threshold.is_nan() || self.condition_threshold <= 1.0 {
            return Err(Error::InvalidParameter {
                name: "condition_threshold",
                message: "must be > 1",
            });
        }
        if let Convergence::Tolerance(tol) = self.convergence {
            if !tol.is_finite() || tol < 0.0 {
                return Err(Error::InvalidParameter {
                    name: "convergence",
                    message: "tolerance must be finite and >= 0",
                });
            }
        }
        if let Some(cov) = &self.covariance {
            let p = data.n_features();
            if cov.dim() != (p, p) {
                return Err(Error::ShapeMismatch {
                    expected: format!("{p}x{p} covariance"),
                    actual: format!("{}x{} covariance", cov.nrows(), cov.ncols()),
                });
            }
        }
        Ok(())
    }

    fn covariance_for(
        &self,
        data: &Dataset,
        shrinker: &dyn CovarianceShrinker,
    ) -> Result<CovarianceEstimate> {
        match &self.covariance {
            Some(matrix) => Ok(CovarianceEstimate {
                matrix: matrix.clone(),
                source: CovarianceSource::Supplied,
                condition: condition_number(matrix)?,
            }),
            None => estimate_covariance(data, self.condition_threshold, shrinker),
        }
    }
}

impl Clustering for MahalanobisKmeans {
    fn fit_predict(&self, data: &[Vec<f64>]) -> Result<Vec<usize>> {
        let data = Dataset::from_rows(data)?;
        let model = self.fit_with_scorer(&data, &EllipticScorer::new())?;
        Ok(model.result.labels().to_vec())
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}

/// A finished clustering run together with the metric it used.
#[derive(Debug, Clone)]
pub struct FittedModel {
    /// Best restart.
    pub result: RunResult,
    /// Metric shared by every restart.
    pub metric: MahalanobisMetric,
    /// Covariance behind `metric`.
    pub covariance: CovarianceEstimate,
}

impl FittedModel {
    /// Assign new points to the nearest fitted center (1-based groups).
    pub fn predict(&self, data: &Dataset) -> Result<Vec<usize>> {
        if data.n_features() != self.metric.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.metric.dim(),
                found: data.n_features(),
            });
        }
        let centers = self.result.centers.view();
        Ok(data
            .view()
            .outer_iter()
            .map(|point| self.metric.nearest(&point, &centers).0 + 1)
            .collect())
    }
}
