use thiserror::Error;

use crate::algorithms::AlgorithmKind;

/// Errors from the numerical detection layer.
///
/// Too little data is never an error here: detectors return an empty
/// candidate list instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectionError {
    #[error("{algorithm} algorithm failed: {reason}")]
    AlgorithmFailure {
        algorithm: AlgorithmKind,
        reason: String,
    },

    #[error("series contains a non-finite value at index {index}")]
    NonFiniteInput { index: usize },

    #[error("invalid detection configuration: {0}")]
    InvalidConfig(String),
}

impl DetectionError {
    pub fn algorithm(algorithm: AlgorithmKind, reason: impl Into<String>) -> Self {
        Self::AlgorithmFailure {
            algorithm,
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for detection results.
pub type DetectionResult<T> = Result<T, DetectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_failure_names_the_algorithm() {
        let e = DetectionError::algorithm(AlgorithmKind::Breakpoint, "degenerate window");
        let msg = e.to_string();
        assert!(msg.contains("breakpoint"));
        assert!(msg.contains("degenerate window"));
    }

    #[test]
    fn non_finite_reports_index() {
        let e = DetectionError::NonFiniteInput { index: 7 };
        assert!(e.to_string().contains('7'));
    }
}
