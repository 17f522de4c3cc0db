use thiserror::Error;

use dexboot_chain::ChainError;
use dexboot_core::{CoreError, ModuleName};
use dexboot_verifier::VerifierError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{module} is not deployed (required by {required_by})")]
    DependencyNotReady {
        module: ModuleName,
        required_by: String,
    },

    #[error("{0} is already deployed")]
    AlreadyDeployed(ModuleName),

    #[error("{step} on {target} failed: {source}")]
    SubmissionFailure {
        step: String,
        target: String,
        #[source]
        source: ChainError,
    },

    #[error(transparent)]
    Verifier(#[from] VerifierError),

    #[error("Invalid plan: {0}")]
    Plan(#[from] CoreError),

    #[error("Artifact for {module}: {source}")]
    Artifact {
        module: ModuleName,
        #[source]
        source: ChainError,
    },

    #[error("Step {index} ({step}) failed: {source}")]
    StepFailed {
        index: usize,
        step: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Funding failed for {failed} of {total} accounts")]
    FundingIncomplete { failed: usize, total: usize },

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

impl PipelineError {
    /// The error underneath any `StepFailed` wrappers
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::StepFailed { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_malformed_key(&self) -> bool {
        matches!(self.root(), PipelineError::Verifier(e) if e.is_malformed())
    }

    pub fn is_dependency_not_ready(&self) -> bool {
        matches!(self.root(), PipelineError::DependencyNotReady { .. })
    }

    pub fn is_submission_failure(&self) -> bool {
        matches!(self.root(), PipelineError::SubmissionFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failed_names_index_and_step() {
        let err = PipelineError::StepFailed {
            index: 3,
            step: "depositContract.initialize".to_string(),
            source: Box::new(PipelineError::SubmissionFailure {
                step: "depositContract.initialize".to_string(),
                target: "DefaultDepositContract".to_string(),
                source: ChainError::Reverted("INITIALIZED".to_string()),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("Step 3"));
        assert!(msg.contains("depositContract.initialize"));
        assert!(err.is_submission_failure());
        assert!(!err.is_dependency_not_ready());
    }

    #[test]
    fn test_malformed_key_detected_through_wrapper() {
        let err = PipelineError::StepFailed {
            index: 1,
            step: "load keys".to_string(),
            source: Box::new(PipelineError::Verifier(VerifierError::MalformedVerificationKey {
                field: "alpha".to_string(),
                reason: "missing".to_string(),
            })),
        };
        assert!(err.is_malformed_key());
    }
}
