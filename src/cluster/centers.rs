//! Group means and within-cluster dispersion.

use crate::distance::MahalanobisMetric;
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2};

/// Per-group arithmetic mean of the rows of `data`.
///
/// `labels` are 0-based; row `g` of the result is the mean of every point
/// labelled `g`. A group with no members has no defined mean and yields
/// [`Error::EmptyCluster`] (reported 1-based).
pub fn aggregate(data: ArrayView2<'_, f64>, labels: &[usize], k: usize) -> Result<Array2<f64>> {
    let (n, d) = data.dim();
    if labels.len() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            found: labels.len(),
        });
    }

    let mut sums = Array2::<f64>::zeros((k, d));
    let mut counts = vec![0usize; k];

    for (point, &label) in data.outer_iter().zip(labels) {
        if label >= k {
            return Err(Error::InvalidClusterCount {
                requested: label + 1,
                n_items: k,
            });
        }
        let mut row = sums.row_mut(label);
        row += &point;
        counts[label] += 1;
    }

    for (g, &count) in counts.iter().enumerate() {
        if count == 0 {
            return Err(Error::EmptyCluster { group: g + 1 });
        }
        let mut row = sums.row_mut(g);
        row /= count as f64;
    }

    Ok(sums)
}

/// Sum over points of the squared Mahalanobis distance to the point's own center.
pub fn dispersion(
    data: ArrayView2<'_, f64>,
    centers: ArrayView2<'_, f64>,
    labels: &[usize],
    metric: &MahalanobisMetric,
) -> f64 {
    data.outer_iter()
        .zip(labels)
        .map(|(point, &label)| metric.squared_distance(&point, &centers.row(label)))
        .sum()
}
