//! # maha
//!
//! K-means clustering under the Mahalanobis metric, seeded by an
//! anomaly-aware k-means++ and repeated over many random restarts.
//!
//! A run shares one inverse covariance between every restart: it is
//! estimated once from the data (with a shrinkage fallback for
//! ill-conditioned samples), then used by seeding, assignment and the final
//! dispersion score. Anomaly scores, supplied by the caller or computed by an
//! [`AnomalyScorer`], bias the first seed toward normal points.
//!
//! Labels are 1-based at the result boundary ([`RunResult::groups`]) and
//! 0-based everywhere else ([`RunResult::labels`], [`Clustering::fit_predict`]).

pub mod anomaly;
pub mod cluster;
pub mod covariance;
pub mod dataset;
pub mod distance;
/// Error types used across `maha`.
pub mod error;

#[cfg(test)]
mod kmeans_tests;

pub use anomaly::{seed_weights, AnomalyScorer, EllipticScorer, SeedWeighting};
pub use cluster::{
    Clustering, Convergence, FittedModel, LloydOutcome, MahalanobisKmeans, RestartConfig,
    RunResult,
};
pub use covariance::{
    CovarianceEstimate, CovarianceShrinker, CovarianceSource, ShrinkageEstimator,
    DEFAULT_CONDITION_THRESHOLD,
};
pub use dataset::Dataset;
pub use distance::MahalanobisMetric;
pub use error::{Error, ErrorKind, Result};
