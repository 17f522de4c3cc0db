//! dexboot Verifier Keys
//!
//! Verification-key codec for the block verifier contract.
//!
//! The verifier's `registerCircuit(uint8,uint16,uint8,uint256[18])` call takes
//! a Groth16 key as a flat array. This crate parses key documents, checks their
//! shape and flattens them in the fixed field order
//! `alpha, beta, gamma, delta, gammaABC`.

pub mod circuit;
pub mod vk;

pub use circuit::{load_circuit_keys, CircuitId, CircuitKey, VkSource};
pub use vk::{flatten, FlattenedVerificationKey, Shape, VerificationKey, VkNode};

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use dexboot_core::VERIFIER_KEY_LEN;

#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("Malformed verification key: {field}: {reason}")]
    MalformedVerificationKey { field: String, reason: String },

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Circuit {0} listed more than once")]
    DuplicateCircuit(CircuitId),
}

impl VerifierError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, VerifierError::MalformedVerificationKey { .. })
    }

    /// Prefix a malformed-key field path with the document it came from
    pub(crate) fn in_file(self, path: &Path) -> Self {
        match self {
            VerifierError::MalformedVerificationKey { field, reason } => {
                VerifierError::MalformedVerificationKey {
                    field: format!("{}:{}", path.display(), field),
                    reason,
                }
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, VerifierError>;
