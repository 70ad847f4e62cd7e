//! Best-of-n restarts.
//!
//! Lloyd's algorithm only finds a local optimum, so the seed → iterate
//! pipeline is repeated `n_repeats` times and the clustering with the lowest
//! within-cluster dispersion is kept:
//!
//! ```text
//! S = Σᵢ d²_M(xᵢ, μ_label(i))
//! ```
//!
//! Each restart draws from its own `StdRng` stream seeded from the caller's
//! generator, owns its centers and labels, and only reads the shared data,
//! metric and seed weights. A restart that trips an internal invariant
//! (degenerate sampling weights, an empty group) is logged and dropped;
//! configuration and numerical errors abort the whole run.

use super::centers::dispersion;
use super::lloyd::{self, Convergence, LloydOutcome};
use super::seeding::seed_centers;
use crate::dataset::Dataset;
use crate::distance::MahalanobisMetric;
use crate::error::{Error, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Parameters shared by every restart.
#[derive(Debug, Clone, Copy)]
pub struct RestartConfig {
    /// Number of clusters.
    pub k: usize,
    /// Lloyd iteration cap per restart.
    pub max_iter: usize,
    /// Number of restarts.
    pub n_repeats: usize,
    /// Center equality rule.
    pub convergence: Convergence,
}

/// Best clustering found across restarts.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// k×p centers; row `g` is the center of group `g + 1`.
    pub centers: Array2<f64>,
    labels: Vec<usize>,
    /// Within-cluster Mahalanobis dispersion of the best restart.
    pub dispersion: f64,
    /// Lloyd rounds used by the best restart.
    pub iterations: usize,
    /// Whether the best restart reached a fixed point.
    pub converged: bool,
    /// 0-based index of the winning restart.
    pub best_restart: usize,
    /// Dispersion of every restart, `None` for aborted ones.
    pub restart_dispersions: Vec<Option<f64>>,
}

impl RunResult {
    /// Group label per point, 1-based (`1..=k`).
    pub fn groups(&self) -> Vec<usize> {
        self.labels.iter().map(|&l| l + 1).collect()
    }

    /// Cluster index per point, 0-based (`0..k`).
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Number of clusters.
    pub fn k(&self) -> usize {
        self.centers.nrows()
    }

    /// Restarts that ran to completion.
    pub fn restarts_completed(&self) -> usize {
        self.restart_dispersions.iter().flatten().count()
    }
}

/// Run seeding and Lloyd iteration `config.n_repeats` times and keep the best.
///
/// `weights` is the first-seed distribution, one entry per point. Ties in
/// dispersion keep the earlier restart.
pub fn run_restarts<R: Rng>(
    data: &Dataset,
    weights: &[f64],
    metric: &MahalanobisMetric,
    config: &RestartConfig,
    rng: &mut R,
) -> Result<RunResult> {
    let n = data.n_points();
    if weights.len() != n {
        return Err(Error::ScoreCountMismatch {
            expected: n,
            found: weights.len(),
        });
    }
    if config.k == 0 || config.k > n {
        return Err(Error::InvalidClusterCount {
            requested: config.k,
            n_items: n,
        });
    }
    if config.n_repeats == 0 {
        return Err(Error::InvalidParameter {
            name: "n_repeats",
            message: "must be > 0",
        });
    }
    if config.max_iter == 0 {
        return Err(Error::InvalidParameter {
            name: "max_iter",
            message: "must be > 0",
        });
    }
    if metric.dim() != data.n_features() {
        return Err(Error::DimensionMismatch {
            expected: data.n_features(),
            found: metric.dim(),
        });
    }

    let view = data.view();
    keep_best(config.k, config.n_repeats, |_| {
        let mut stream = StdRng::from_rng(&mut *rng);
        let outcome = seed_centers(view, config.k, metric, weights, &mut stream)
            .and_then(|seeding| {
                lloyd::run(view, seeding.centers, metric, config.max_iter, config.convergence)
            })?;
        let score = dispersion(view, outcome.centers.view(), &outcome.labels, metric);
        Ok((outcome, score))
    })
}

/// Run `restart` for each index in `0..n_repeats` and keep the lowest
/// dispersion. Invariant violations drop only the restart that raised them.
fn keep_best<F>(k: usize, n_repeats: usize, mut restart: F) -> Result<RunResult>
where
    F: FnMut(usize) -> Result<(LloydOutcome, f64)>,
{
    let mut best: Option<RunResult> = None;
    let mut history = Vec::with_capacity(n_repeats);
    let mut last_violation = None;

    for index in 0..n_repeats {
        let (outcome, score) = match restart(index) {
            Ok(done) => done,
            Err(e) if e.is_invariant_violation() => {
                tracing::warn!(restart = index, error = %e, "restart aborted");
                history.push(None);
                last_violation = Some(e);
                continue;
            }
            Err(e) => return Err(e),
        };
        history.push(Some(score));

        let improves = best.as_ref().is_none_or(|b| score < b.dispersion);
        if improves {
            tracing::debug!(
                restart = index,
                dispersion = score,
                iterations = outcome.iterations,
                converged = outcome.converged,
                "new best restart"
            );
            best = Some(RunResult {
                centers: outcome.centers,
                labels: outcome.labels,
                dispersion: score,
                iterations: outcome.iterations,
                converged: outcome.converged,
                best_restart: index,
                restart_dispersions: Vec::new(),
            });
        }
    }

    match best {
        Some(mut result) => {
            result.restart_dispersions = history;
            tracing::info!(
                k,
                n_repeats,
                completed = result.restarts_completed(),
                dispersion = result.dispersion,
                best_restart = result.best_restart,
                "clustering finished"
            );
            Ok(result)
        }
        None => Err(last_violation.unwrap_or(Error::EmptyInput)),
    }
}
