//! Anomaly-aware k-means++ seeding under the Mahalanobis metric.
//!
//! Standard k-means++ picks the first center uniformly. Here the first draw
//! follows the anomaly-derived seed weights (see
//! [`seed_weights`](crate::anomaly::seed_weights)), so anomalous points rarely
//! anchor a cluster. Every later center is drawn with probability
//! proportional to D(x)², the squared Mahalanobis distance from x to its
//! nearest already chosen center. Anomalous points still take part in that
//! expansion; only the first draw is biased against them.
//!
//! Centers are always actual data rows.

use crate::distance::MahalanobisMetric;
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2};
use rand::Rng;

/// Chosen seed rows and the centers copied from them.
#[derive(Debug, Clone)]
pub struct Seeding {
    /// Row index of each center, in selection order.
    pub indices: Vec<usize>,
    /// k×p matrix of the selected rows.
    pub centers: Array2<f64>,
}

/// Draw one index with probability proportional to `weights`.
///
/// Zero-weight entries are never drawn.
pub fn sample_index<R: Rng>(weights: &[f64], rng: &mut R, stage: &'static str) -> Result<usize> {
    let total: f64 = weights.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(Error::DegenerateWeights { stage });
    }

    let threshold = rng.random::<f64>() * total;
    let mut cumsum = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumsum += w;
        if cumsum > threshold {
            return Ok(i);
        }
    }

    // cumsum ends at exactly `total`, which is strictly above the threshold.
    Err(Error::SampleOutOfRange {
        index: weights.len(),
        n: weights.len(),
    })
}

/// Pick `k` initial centers from the rows of `data`.
///
/// `weights` is the first-draw distribution, one entry per row.
pub fn seed_centers<R: Rng>(
    data: ArrayView2<'_, f64>,
    k: usize,
    metric: &MahalanobisMetric,
    weights: &[f64],
    rng: &mut R,
) -> Result<Seeding> {
    let (n, d) = data.dim();
    if k == 0 || k > n {
        return Err(Error::InvalidClusterCount {
            requested: k,
            n_items: n,
        });
    }
    if weights.len() != n {
        return Err(Error::ScoreCountMismatch {
            expected: n,
            found: weights.len(),
        });
    }

    let mut indices = Vec::with_capacity(k);
    let mut centers = Array2::<f64>::zeros((k, d));

    let first = sample_index(weights, rng, "first seed")?;
    indices.push(first);
    centers.row_mut(0).assign(&data.row(first));

    if k == 1 {
        return Ok(Seeding { indices, centers });
    }

    // D(x)² to the nearest chosen center, updated as centers are added.
    let first_row = data.row(first);
    let mut min_distances: Vec<f64> = data
        .outer_iter()
        .map(|point| metric.squared_distance(&point, &first_row))
        .collect();

    for c in 1..k {
        let next = sample_index(&min_distances, rng, "k-means++ expansion")?;
        indices.push(next);
        centers.row_mut(c).assign(&data.row(next));

        if c + 1 < k {
            let chosen = data.row(next);
            for (point, best) in data.outer_iter().zip(min_distances.iter_mut()) {
                let dist = metric.squared_distance(&point, &chosen);
                if dist < *best {
                    *best = dist;
                }
            }
        }
    }

    tracing::trace!(?indices, "seeded centers");
    Ok(Seeding { indices, centers })
}
