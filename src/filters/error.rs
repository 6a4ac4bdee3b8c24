use thiserror::Error;

/// Errors surfaced by the estimator core.
///
/// Every variant is local to a single step call. The filter performs no
/// retries (a singular matrix does not resolve on its own) and never
/// panics the hosting process; a failed step leaves the previous belief
/// in place so the driver can skip the cycle and continue.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("{name} covariance is not symmetric (|m01 - m10| = {skew:.3e})")]
    NonSymmetric { name: &'static str, skew: f64 },

    #[error("{name} covariance is not positive semi-definite")]
    NotPositiveSemiDefinite { name: &'static str },

    #[error("innovation covariance is singular or ill-conditioned (det = {determinant:.3e})")]
    SingularInnovation { determinant: f64 },
}

pub type FilterResult<T> = Result<T, FilterError>;
