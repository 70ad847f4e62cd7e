//! Mahalanobis distance.
//!
//! ```text
//! d²(u, v) = (u - v)ᵀ Σ⁻¹ (u - v)
//! ```
//!
//! With Σ = I this is the squared Euclidean distance. With a full covariance,
//! directions of high variance are shrunk and correlated features are not
//! double counted, so clusters may be elongated ellipsoids instead of balls.
//!
//! The inverse covariance is computed once per run and shared read-only by
//! seeding, assignment and scoring.

use crate::error::{Error, Result};
use crate::covariance::condition_number;
use faer::prelude::*;
use faer::Mat;
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Matrices with a larger condition number cannot be inverted reliably in f64.
const SINGULAR_CONDITION: f64 = 1e15;

/// Squared Mahalanobis distance under a fixed inverse covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct MahalanobisMetric {
    inverse: Array2<f64>,
}

impl MahalanobisMetric {
    /// Invert `covariance` and use it as the metric.
    pub fn from_covariance(covariance: &Array2<f64>) -> Result<Self> {
        let (p, q) = covariance.dim();
        if p == 0 {
            return Err(Error::EmptyInput);
        }
        if p != q {
            return Err(Error::DimensionMismatch {
                expected: p,
                found: q,
            });
        }

        let condition = condition_number(covariance)?;
        if condition > SINGULAR_CONDITION {
            return Err(Error::IllConditioned { condition });
        }

        let m = Mat::<f64>::from_fn(p, p, |i, j| covariance[[i, j]]);
        let lu = m.full_piv_lu();
        let inv = lu.solve(&Mat::<f64>::identity(p, p));

        let inverse = Array2::from_shape_fn((p, p), |(i, j)| inv[(i, j)]);
        if inverse.iter().any(|v| !v.is_finite()) {
            return Err(Error::InversionFailed);
        }
        Self::from_inverse(inverse)
    }

    /// Use an already inverted covariance. The matrix is symmetrised.
    pub fn from_inverse(inverse: Array2<f64>) -> Result<Self> {
        let (p, q) = inverse.dim();
        if p == 0 {
            return Err(Error::EmptyInput);
        }
        if p != q {
            return Err(Error::DimensionMismatch {
                expected: p,
                found: q,
            });
        }
        if inverse.iter().any(|v| !v.is_finite()) {
            return Err(Error::InversionFailed);
        }

        let symmetric = (&inverse + &inverse.t()) * 0.5;
        Ok(Self { inverse: symmetric })
    }

    /// Euclidean geometry in `p` dimensions.
    pub fn identity(p: usize) -> Self {
        Self {
            inverse: Array2::eye(p),
        }
    }

    /// Number of features the metric expects.
    pub fn dim(&self) -> usize {
        self.inverse.nrows()
    }

    /// The inverse covariance.
    pub fn inverse(&self) -> &Array2<f64> {
        &self.inverse
    }

    /// Squared distance between `u` and `v`.
    ///
    /// Clamped at zero: round-off on a nearly singular metric must not
    /// produce negative distances.
    #[inline]
    pub fn squared_distance(&self, u: &ArrayView1<'_, f64>, v: &ArrayView1<'_, f64>) -> f64 {
        debug_assert_eq!(u.len(), self.dim());
        debug_assert_eq!(v.len(), self.dim());

        let p = self.dim();
        let mut total = 0.0;
        for i in 0..p {
            let di = u[i] - v[i];
            if di == 0.0 {
                continue;
            }
            let row = self.inverse.row(i);
            // Symmetric metric: off-diagonal pairs counted twice.
            let mut acc = 0.5 * row[i] * di;
            for j in (i + 1)..p {
                acc += row[j] * (u[j] - v[j]);
            }
            total += 2.0 * di * acc;
        }
        total.max(0.0)
    }

    /// Distance (square root of [`squared_distance`](Self::squared_distance)).
    pub fn distance(&self, u: &ArrayView1<'_, f64>, v: &ArrayView1<'_, f64>) -> f64 {
        self.squared_distance(u, v).sqrt()
    }

    /// Index and squared distance of the closest row of `centers`.
    ///
    /// Ties go to the lowest index.
    pub fn nearest(&self, point: &ArrayView1<'_, f64>, centers: &ArrayView2<'_, f64>) -> (usize, f64) {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (c, center) in centers.outer_iter().enumerate() {
            let dist = self.squared_distance(point, &center);
            if dist < best_dist {
                best_dist = dist;
                best = c;
            }
        }
        (best, best_dist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn test_identity_is_squared_euclidean() {
        let m = MahalanobisMetric::identity(2);
        let u = array![0.0, 0.0];
        let v = array![3.0, 4.0];
        assert!((m.squared_distance(&u.view(), &v.view()) - 25.0).abs() < 1e-12);
        assert!((m.distance(&u.view(), &v.view()) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_diagonal_covariance_scales_axes() {
        // Variance 4 along x, 1 along y
        let cov = array![[4.0, 0.0], [0.0, 1.0]];
        let m = MahalanobisMetric::from_covariance(&cov).unwrap();
        let o = array![0.0, 0.0];
        let x = array![2.0, 0.0];
        let y = array![0.0, 1.0];
        let dx = m.squared_distance(&o.view(), &x.view());
        let dy = m.squared_distance(&o.view(), &y.view());
        assert!((dx - 1.0).abs() < 1e-12);
        assert!((dy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlated_covariance_matches_quadratic_form() {
        let cov = array![[2.0, 0.8], [0.8, 1.0]];
        let m = MahalanobisMetric::from_covariance(&cov).unwrap();
        let u = array![1.0, -2.0];
        let v = array![0.5, 0.5];

        let diff = &u - &v;
        let expected = diff.dot(&m.inverse().dot(&diff));
        let got = m.squared_distance(&u.view(), &v.view());
        assert!((got - expected).abs() < 1e-10);

        // Σ Σ⁻¹ = I
        let prod = cov.dot(m.inverse());
        for i in 0..2 {
            for j in 0..2 {
                let e = if i == j { 1.0 } else { 0.0 };
                assert!((prod[[i, j]] - e).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_singular_covariance_rejected() {
        let cov = array![[1.0, 1.0], [1.0, 1.0]];
        let err = MahalanobisMetric::from_covariance(&cov).unwrap_err();
        assert!(matches!(
            err,
            Error::IllConditioned { .. } | Error::InversionFailed
        ));
    }

    #[test]
    fn test_non_square_rejected() {
        let m = Array2::<f64>::zeros((2, 3));
        assert!(MahalanobisMetric::from_inverse(m).is_err());
    }

    #[test]
    fn test_nearest_first_minimum_wins() {
        let m = MahalanobisMetric::identity(1);
        let centers = array![[-1.0], [1.0], [5.0]];
        let p = array![0.0];
        let (idx, dist) = m.nearest(&p.view(), &centers.view());
        assert_eq!(idx, 0);
        assert!((dist - 1.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_identity_matches_euclidean(
            u in proptest::collection::vec(-100.0f64..100.0, 4),
            v in proptest::collection::vec(-100.0f64..100.0, 4),
        ) {
            let m = MahalanobisMetric::identity(4);
            let ua = ndarray::Array1::from(u);
            let va = ndarray::Array1::from(v);
            let euclid: f64 = ua.iter().zip(va.iter()).map(|(a, b)| (a - b).powi(2)).sum();
            let got = m.squared_distance(&ua.view(), &va.view());
            prop_assert!((got - euclid).abs() <= 1e-9 * euclid.max(1.0));
        }

        #[test]
        fn prop_distance_symmetric_and_non_negative(
            u in proptest::collection::vec(-10.0f64..10.0, 3),
            v in proptest::collection::vec(-10.0f64..10.0, 3),
        ) {
            let cov = array![[2.0, 0.5, 0.1], [0.5, 1.0, 0.2], [0.1, 0.2, 0.5]];
            let m = MahalanobisMetric::from_covariance(&cov).unwrap();
            let ua = ndarray::Array1::from(u);
            let va = ndarray::Array1::from(v);
            let d1 = m.squared_distance(&ua.view(), &va.view());
            let d2 = m.squared_distance(&va.view(), &ua.view());
            prop_assert!(d1 >= 0.0);
            prop_assert!((d1 - d2).abs() <= 1e-9 * d1.max(1.0));
        }
    }
}
