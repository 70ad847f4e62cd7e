use thiserror::Error;

/// Result alias for `maha`.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
///
/// Configuration errors are raised before any computation starts. Numerical
/// errors abort the whole run because the metric is shared by every restart.
/// Invariant errors signal a defect in the weight or assignment math and
/// abort only the restart that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input.
    Configuration,
    /// Covariance could not be turned into a usable metric.
    Numerical,
    /// Internal consistency check failed.
    Invariant,
}

/// Errors returned by the covariance, seeding and clustering primitives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Input was empty.
    #[error("empty input provided")]
    EmptyInput,

    /// Row length differs from the first row (usize).
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Shape mismatch (string description).
    #[error("shape mismatch: expected {expected}, actual {actual}")]
    ShapeMismatch {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        actual: String,
    },

    /// A feature value is NaN or infinite.
    #[error("non-finite value at row {row}, column {col}")]
    NonFiniteValue {
        /// Row index (0-based).
        row: usize,
        /// Column index (0-based).
        col: usize,
    },

    /// Anomaly score vector does not have one entry per point.
    #[error("anomaly score count mismatch: expected {expected}, found {found}")]
    ScoreCountMismatch {
        /// Number of points in the dataset.
        expected: usize,
        /// Number of scores supplied.
        found: usize,
    },

    /// Invalid number of clusters requested.
    #[error("cannot create {requested} clusters from {n_items} items")]
    InvalidClusterCount {
        /// Requested count.
        requested: usize,
        /// Number of items.
        n_items: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// Matrix inversion failure.
    #[error("matrix inversion failed")]
    InversionFailed,

    /// Covariance is still numerically singular after the fallback.
    #[error("covariance is numerically singular (condition number {condition:e})")]
    IllConditioned {
        /// Estimated condition number.
        condition: f64,
    },

    /// A dense decomposition did not converge.
    #[error("decomposition failed: {0}")]
    Decomposition(String),

    /// Weighted sampling drew an index outside the dataset.
    #[error("sampled index {index} out of bounds for {n} points")]
    SampleOutOfRange {
        /// Sampled index (0-based).
        index: usize,
        /// Number of points.
        n: usize,
    },

    /// Sampling weights do not form a distribution.
    #[error("sampling weights are degenerate during {stage}")]
    DegenerateWeights {
        /// Which sampling stage failed.
        stage: &'static str,
    },

    /// A group has no members when its mean is required.
    #[error("group {group} has no members")]
    EmptyCluster {
        /// Group label (1-based).
        group: usize,
    },
}

impl Error {
    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyInput
            | Error::DimensionMismatch { .. }
            | Error::ShapeMismatch { .. }
            | Error::NonFiniteValue { .. }
            | Error::ScoreCountMismatch { .. }
            | Error::InvalidClusterCount { .. }
            | Error::InvalidParameter { .. } => ErrorKind::Configuration,
            Error::InversionFailed | Error::IllConditioned { .. } | Error::Decomposition(_) => {
                ErrorKind::Numerical
            }
            Error::SampleOutOfRange { .. }
            | Error::DegenerateWeights { .. }
            | Error::EmptyCluster { .. } => ErrorKind::Invariant,
        }
    }

    /// True for errors that abort a single restart rather than the run.
    pub fn is_invariant_violation(&self) -> bool {
        self.kind() == ErrorKind::Invariant
    }
}
