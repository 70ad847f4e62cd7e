//! Covariance estimation for the Mahalanobis metric.
//!
//! The metric for a run is derived from a single p×p covariance matrix:
//!
//! 1. Compute the unbiased sample covariance.
//! 2. If its condition number exceeds a threshold (default `1e10`), replace it
//!    with a shrinkage estimate from a [`CovarianceShrinker`].
//! 3. Hand the chosen matrix to [`MahalanobisMetric::from_covariance`](crate::MahalanobisMetric::from_covariance)
//!    for inversion.
//!
//! # Shrinkage
//!
//! [`ShrinkageEstimator`] implements the Schäfer–Strimmer estimator:
//!
//! ```text
//! r*_ij = (1 - λ) r_ij          (i ≠ j), r*_ii = 1
//! v*_j  = λ_v median(v) + (1 - λ_v) v_j
//! Σ*_ij = r*_ij √(v*_i v*_j)
//! ```
//!
//! Both intensities are estimated in closed form from the variance of the
//! per-sample cross products and clamped into `[0, 1]`. Shrinking the
//! correlations toward the identity keeps Σ* positive definite for any λ > 0.
//!
//! # References
//!
//! - Schäfer & Strimmer (2005). "A shrinkage approach to large-scale covariance
//!   matrix estimation and implications for functional genomics"
//! - Opgen-Rhein & Strimmer (2007). "Accurate ranking of differentially
//!   expressed genes by a distribution-free shrinkage approach"

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use faer::Mat;
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Condition number above which the sample covariance is replaced.
pub const DEFAULT_CONDITION_THRESHOLD: f64 = 1e10;

/// Produces an invertible covariance estimate for a dataset.
///
/// Implementations must return a symmetric p×p matrix that is better
/// conditioned than the raw sample covariance.
pub trait CovarianceShrinker {
    /// Estimate a well-conditioned covariance for `data`.
    fn shrink(&self, data: &Dataset) -> Result<Array2<f64>>;
}

/// Where the covariance used by a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CovarianceSource {
    /// Raw sample covariance.
    Sample,
    /// Shrinkage fallback after the sample covariance was ill-conditioned.
    Shrunk,
    /// Supplied by the caller.
    Supplied,
}

/// A covariance matrix together with how it was obtained.
#[derive(Debug, Clone)]
pub struct CovarianceEstimate {
    /// The p×p covariance.
    pub matrix: Array2<f64>,
    /// Provenance.
    pub source: CovarianceSource,
    /// Condition number of `matrix`.
    pub condition: f64,
}

/// Unbiased (n − 1) sample covariance of the columns of `data`.
pub fn sample_covariance(data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    let n = data.nrows();
    if n < 2 {
        return Err(Error::InvalidParameter {
            name: "data",
            message: "at least two points are required to estimate covariance",
        });
    }

    let mean = column_means(data);
    let centered = &data - &mean;
    let mut cov = centered.t().dot(&centered);
    cov /= (n - 1) as f64;
    Ok(cov)
}

/// Ratio of the largest to the smallest singular value.
///
/// Returns `f64::INFINITY` for a singular matrix.
pub fn condition_number(matrix: &Array2<f64>) -> Result<f64> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(Error::DimensionMismatch {
            expected: rows,
            found: cols,
        });
    }

    let m = Mat::<f64>::from_fn(rows, cols, |i, j| matrix[[i, j]]);
    let singular = m
        .as_ref()
        .singular_values()
        .map_err(|e| Error::Decomposition(format!("{e:?}")))?;

    let max = singular.iter().cloned().fold(0.0, f64::max);
    let min = singular.iter().cloned().fold(f64::INFINITY, f64::min);

    if !max.is_finite() || !min.is_finite() {
        return Err(Error::Decomposition("non-finite singular value".to_string()));
    }
    if min <= 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(max / min)
}

/// Treat an undecomposable matrix as infinitely ill-conditioned.
fn condition_or_infinite(condition: Result<f64>) -> f64 {
    match condition {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "condition number unavailable, treating as singular");
            f64::INFINITY
        }
    }
}

/// Sample covariance with shrinkage fallback.
///
/// The sample covariance is kept when its condition number is at most
/// `threshold`; otherwise `shrinker` supplies the estimate. A sample
/// covariance that cannot even be decomposed also triggers the fallback.
pub fn estimate_covariance(
    data: &Dataset,
    threshold: f64,
    shrinker: &dyn CovarianceShrinker,
) -> Result<CovarianceEstimate> {
    let sample = sample_covariance(data.view())?;
    let condition = condition_or_infinite(condition_number(&sample));

    if condition <= threshold {
        tracing::debug!(condition, "using sample covariance");
        return Ok(CovarianceEstimate {
            matrix: sample,
            source: CovarianceSource::Sample,
            condition,
        });
    }

    tracing::warn!(
        condition,
        threshold,
        "sample covariance ill-conditioned, falling back to shrinkage"
    );
    let shrunk = shrinker.shrink(data)?;
    let p = data.n_features();
    if shrunk.dim() != (p, p) {
        return Err(Error::DimensionMismatch {
            expected: p,
            found: shrunk.nrows(),
        });
    }
    let condition = condition_number(&shrunk)?;
    tracing::debug!(condition, "shrunk covariance condition number");

    Ok(CovarianceEstimate {
        matrix: shrunk,
        source: CovarianceSource::Shrunk,
        condition,
    })
}

/// Schäfer–Strimmer shrinkage estimator.
#[derive(Debug, Clone, Default)]
pub struct ShrinkageEstimator {
    /// Fixed correlation shrinkage intensity (estimated when `None`).
    lambda: Option<f64>,
    /// Fixed variance shrinkage intensity (estimated when `None`).
    lambda_var: Option<f64>,
}

impl ShrinkageEstimator {
    /// Estimator with both intensities estimated from the data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the correlation shrinkage intensity.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = Some(lambda);
        self
    }

    /// Fix the variance shrinkage intensity.
    pub fn with_lambda_var(mut self, lambda_var: f64) -> Self {
        self.lambda_var = Some(lambda_var);
        self
    }

    fn check_intensity(name: &'static str, value: Option<f64>) -> Result<()> {
        match value {
            Some(v) if !(0.0..=1.0).contains(&v) => Err(Error::InvalidParameter {
                name,
                message: "must be in [0, 1]",
            }),
            _ => Ok(()),
        }
    }
}

impl CovarianceShrinker for ShrinkageEstimator {
    fn shrink(&self, data: &Dataset) -> Result<Array2<f64>> {
        Self::check_intensity("lambda", self.lambda)?;
        Self::check_intensity("lambda_var", self.lambda_var)?;

        let x = data.view();
        let (n, p) = x.dim();
        if n < 3 {
            return Err(Error::InvalidParameter {
                name: "data",
                message: "at least three points are required for shrinkage",
            });
        }
        let nf = n as f64;
        // Scale of the unbiased variance-of-estimate formula.
        let var_scale = nf / (nf - 1.0).powi(3);

        let mean = column_means(x);
        let centered = &x - &mean;

        // Variances and their estimated sampling variance.
        let mut variances = Array1::<f64>::zeros(p);
        let mut var_of_var = Array1::<f64>::zeros(p);
        for j in 0..p {
            let col = centered.column(j);
            let w_bar = col.iter().map(|c| c * c).sum::<f64>() / nf;
            variances[j] = nf / (nf - 1.0) * w_bar;
            var_of_var[j] = var_scale * col.iter().map(|c| (c * c - w_bar).powi(2)).sum::<f64>();
        }

        // Standardized columns; zero-variance columns stay at zero.
        let sd = variances.mapv(f64::sqrt);
        let mut xs = centered.clone();
        for (j, mut col) in xs.axis_iter_mut(Axis(1)).enumerate() {
            if sd[j] > 0.0 {
                col /= sd[j];
            } else {
                col.fill(0.0);
            }
        }

        // Correlations and the pooled correlation intensity.
        let mut corr = Array2::<f64>::eye(p);
        let mut sum_var_r = 0.0;
        let mut sum_r2 = 0.0;
        for i in 0..p {
            for j in (i + 1)..p {
                let (a, b) = (xs.column(i), xs.column(j));
                let w_bar = a.dot(&b) / nf;
                let r = nf / (nf - 1.0) * w_bar;
                let var_r = var_scale
                    * a.iter()
                        .zip(b.iter())
                        .map(|(u, v)| (u * v - w_bar).powi(2))
                        .sum::<f64>();
                corr[[i, j]] = r;
                corr[[j, i]] = r;
                sum_var_r += 2.0 * var_r;
                sum_r2 += 2.0 * r * r;
            }
        }

        let lambda = self
            .lambda
            .unwrap_or_else(|| clamp_intensity(sum_var_r, sum_r2));

        let target = median(variances.as_slice().unwrap_or(&[]));
        let lambda_var = self.lambda_var.unwrap_or_else(|| {
            let dev: f64 = variances.iter().map(|v| (v - target).powi(2)).sum();
            clamp_intensity(var_of_var.sum(), dev)
        });
        tracing::debug!(lambda, lambda_var, "shrinkage intensities");

        let shrunk_var = variances.mapv(|v| lambda_var * target + (1.0 - lambda_var) * v);
        let shrunk_sd = shrunk_var.mapv(f64::sqrt);

        let mut cov = Array2::<f64>::zeros((p, p));
        for i in 0..p {
            for j in 0..p {
                let r = if i == j { 1.0 } else { (1.0 - lambda) * corr[[i, j]] };
                cov[[i, j]] = r * shrunk_sd[i] * shrunk_sd[j];
            }
        }
        Ok(cov)
    }
}

fn column_means(data: ArrayView2<'_, f64>) -> Array1<f64> {
    data.mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(data.ncols()))
}

/// `num / den` clamped into `[0, 1]`; full shrinkage when `den` vanishes.
fn clamp_intensity(num: f64, den: f64) -> f64 {
    if den <= 0.0 || !den.is_finite() {
        return 1.0;
    }
    (num / den).clamp(0.0, 1.0)
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
