//! Mahalanobis K-means with anomaly-aware seeding.
//!
//! ## Pieces
//!
//! | Module | Role |
//! |--------|------|
//! | [`centers`] | Group means and within-cluster dispersion |
//! | [`seeding`] | Anomaly-weighted k-means++ under the Mahalanobis metric |
//! | [`lloyd`] | Assignment / update iteration to a fixed point or cap |
//! | [`restart`] | Best-of-n restarts with independent RNG streams |
//!
//! [`MahalanobisKmeans`] ties them together behind a builder.
//!
//! ## Why Mahalanobis?
//!
//! Euclidean k-means treats every direction alike, so it carves correlated
//! or differently scaled features into spherical cells. Measuring distance
//! through the inverse covariance,
//!
//! ```text
//! d²(x, μ) = (x - μ)ᵀ Σ⁻¹ (x - μ)
//! ```
//!
//! makes one unit of distance mean "one standard deviation" in every
//! direction of the data.
//!
//! ## Why anomaly-aware seeding?
//!
//! A k-means++ run that starts on an outlier wastes a center on it. Biasing
//! the first draw by `exp(-score)` (or a linear variant) keeps seeds in the
//! normal bulk, while the D(x)² expansion still spreads later seeds out.
//!
//! ## Usage
//!
//! ```rust
//! use maha::{Dataset, MahalanobisKmeans};
//!
//! let data = Dataset::from_rows(&[
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.2],
//!     vec![0.2, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.2, 10.1],
//!     vec![10.1, 10.2],
//! ])
//! .unwrap();
//! let scores = vec![0.0; 6];
//!
//! let model = MahalanobisKmeans::new(2)
//!     .with_n_repeats(10)
//!     .with_seed(42)
//!     .fit(&data, &scores)
//!     .unwrap();
//!
//! let groups = model.result.groups(); // 1-based
//! assert_eq!(groups.len(), 6);
//! assert!(groups.iter().all(|&g| g == 1 || g == 2));
//! ```

pub mod centers;
pub mod lloyd;
pub mod restart;
pub mod seeding;

mod kmeans;
mod traits;

pub use kmeans::{FittedModel, MahalanobisKmeans};
pub use lloyd::{Convergence, LloydOutcome};
pub use restart::{RestartConfig, RunResult};
pub use seeding::Seeding;
pub use traits::Clustering;
