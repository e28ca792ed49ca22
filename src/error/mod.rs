use thiserror::Error;

/// Broad classification of a [`DceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid input values, such as an empty baseline or a zero reference signal
    Domain,
    /// A root finder or local optimizer ran out of budget
    Convergence,
    /// A collaborator model returned data of the wrong shape or missed a parameter
    Contract,
    /// Configuration could not be parsed
    Config,
}

#[derive(Error, Debug, Clone)]
pub enum DceError {
    #[error("Baseline index set is empty")]
    EmptyBaseline,

    #[error("Baseline index {index} is out of range for a series of length {len}")]
    BaselineOutOfRange { index: usize, len: usize },

    #[error("Baseline reference signal is zero")]
    ZeroReference,

    #[error("Enhancement-to-concentration root finding failed at sample {sample} (enhancement = {enhancement}): {reason}")]
    RootNotFound {
        sample: usize,
        enhancement: f64,
        reason: String,
    },

    #[error("Local minimization from start {start} did not converge: {reason}")]
    NotConverged { start: usize, reason: String },

    #[error("All {starts} initial guesses failed to converge")]
    AllStartsFailed { starts: usize },

    #[error("No initial guesses supplied")]
    NoInitialGuesses,

    #[error("Optimizer error: {0}")]
    Optimizer(String),

    #[error("Missing PK parameter: {0}")]
    MissingParameter(String),

    #[error("Length mismatch for {what}: expected {expected}, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid model definition: {0}")]
    InvalidModel(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DceError::EmptyBaseline
            | DceError::BaselineOutOfRange { .. }
            | DceError::ZeroReference
            | DceError::NoInitialGuesses => ErrorKind::Domain,
            DceError::RootNotFound { .. }
            | DceError::NotConverged { .. }
            | DceError::AllStartsFailed { .. }
            | DceError::Optimizer(_) => ErrorKind::Convergence,
            DceError::MissingParameter(_)
            | DceError::LengthMismatch { .. }
            | DceError::InvalidModel(_) => ErrorKind::Contract,
            DceError::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<serde_json::Error> for DceError {
    fn from(err: serde_json::Error) -> Self {
        DceError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_classified_by_kind() {
        assert_eq!(DceError::EmptyBaseline.kind(), ErrorKind::Domain);
        assert_eq!(DceError::ZeroReference.kind(), ErrorKind::Domain);
        assert_eq!(
            DceError::AllStartsFailed { starts: 3 }.kind(),
            ErrorKind::Convergence
        );
        assert_eq!(
            DceError::MissingParameter("vp".into()).kind(),
            ErrorKind::Contract
        );
    }

    #[test]
    fn root_failure_message_names_the_sample() {
        let err = DceError::RootNotFound {
            sample: 4,
            enhancement: 12.5,
            reason: "no sign change".into(),
        };
        assert!(err.to_string().contains("sample 4"));
    }
}
