use thiserror::Error;

/// Result alias for `tacluster`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by metrics, clusters and clustering techniques.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Input was empty (no voxels, or no voxels left after noise filtering).
    #[error("empty input provided")]
    EmptyInput,

    /// Curve length mismatch.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Matrix inversion failure (singular covariance).
    #[error("matrix inversion failed")]
    InversionFailed,

    /// Invalid number of clusters requested.
    #[error("cannot create {requested} clusters from {n_items} items")]
    InvalidClusterCount {
        /// Requested count.
        requested: usize,
        /// Number of items.
        n_items: usize,
    },

    /// An iterative solver did not converge within its iteration limit.
    #[error("did not converge after {iterations} iterations")]
    ConvergenceFailure {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// A stateful metric was queried before `init`.
    #[error("metric '{metric}' used before init")]
    MetricNotInitialized {
        /// Metric name.
        metric: &'static str,
    },

    /// Seeding gave up after too many rejected draws.
    #[error("seeding gave up after {attempts} rejected draws")]
    SeedingExhausted {
        /// Number of draws attempted for the failing seed.
        attempts: usize,
    },

    /// Malformed textual seed specification.
    #[error("invalid seed specification: {0}")]
    InvalidSeedSpec(String),

    /// No metric or technique registered under the given name.
    #[error("unknown {kind} '{name}'")]
    UnknownName {
        /// "metric" or "technique".
        kind: &'static str,
        /// The name that was looked up.
        name: String,
    },

    /// Eigen or singular value decomposition failed.
    #[error("decomposition failed: {0}")]
    Decomposition(String),
}
