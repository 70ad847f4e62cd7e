//! Lloyd iteration under the Mahalanobis metric.
//!
//! 1. **Assign**: each point goes to the center with the smallest squared
//!    Mahalanobis distance (first minimum on ties).
//! 2. **Update**: each center becomes the mean of its points.
//! 3. Stop when the centers no longer change, or after `max_iter` rounds.
//!
//! The iteration is deterministic: identical inputs give identical outputs.
//! Hitting the iteration cap is an accepted terminal state, not an error.

use super::centers::aggregate;
use crate::distance::MahalanobisMetric;
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2};

/// When two consecutive center matrices count as equal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Convergence {
    /// Bitwise equal in every element.
    #[default]
    Exact,
    /// Largest absolute element change at most the given tolerance.
    ///
    /// Stops earlier than [`Convergence::Exact`] and therefore can change the
    /// final centers and labels.
    Tolerance(f64),
}

impl Convergence {
    fn converged(&self, old: &Array2<f64>, new: &Array2<f64>) -> bool {
        match *self {
            Convergence::Exact => old == new,
            Convergence::Tolerance(tol) => old
                .iter()
                .zip(new.iter())
                .all(|(a, b)| (a - b).abs() <= tol),
        }
    }
}

/// Final state of one Lloyd run.
#[derive(Debug, Clone)]
pub struct LloydOutcome {
    /// k×p centers.
    pub centers: Array2<f64>,
    /// 0-based label per point.
    pub labels: Vec<usize>,
    /// Assignment rounds performed.
    pub iterations: usize,
    /// Whether the centers reached a fixed point before the cap.
    pub converged: bool,
}

/// Label every point with its nearest center.
pub fn assign(
    data: ArrayView2<'_, f64>,
    centers: ArrayView2<'_, f64>,
    metric: &MahalanobisMetric,
    labels: &mut [usize],
) {
    for (point, label) in data.outer_iter().zip(labels.iter_mut()) {
        *label = metric.nearest(&point, &centers).0;
    }
}

/// Run Lloyd iterations from `initial` centers.
pub fn run(
    data: ArrayView2<'_, f64>,
    initial: Array2<f64>,
    metric: &MahalanobisMetric,
    max_iter: usize,
    convergence: Convergence,
) -> Result<LloydOutcome> {
    if max_iter == 0 {
        return Err(Error::InvalidParameter {
            name: "max_iter",
            message: "must be > 0",
        });
    }
    if initial.ncols() != data.ncols() {
        return Err(Error::DimensionMismatch {
            expected: data.ncols(),
            found: initial.ncols(),
        });
    }
    let k = initial.nrows();
    if k == 0 {
        return Err(Error::InvalidClusterCount {
            requested: 0,
            n_items: data.nrows(),
        });
    }

    let mut centers = initial;
    let mut labels = vec![0usize; data.nrows()];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iter {
        iterations += 1;
        assign(data, centers.view(), metric, &mut labels);
        let new_centers = aggregate(data, &labels, k)?;

        if convergence.converged(&centers, &new_centers) {
            converged = true;
            break;
        }
        tracing::trace!(iteration = iterations, "centers moved");
        centers = new_centers;
    }

    Ok(LloydOutcome {
        centers,
        labels,
        iterations,
        converged,
    })
}
