//! Circuit identities and verification-key sources

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::vk::{flatten, FlattenedVerificationKey, VerificationKey};
use crate::{Result, VerifierError};

/// Identity of one verifier registration:
/// (block-size class, entry count, auxiliary parameter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitId {
    pub block_type: u8,
    pub block_size: u16,
    pub block_version: u8,
}

impl CircuitId {
    pub fn new(block_type: u8, block_size: u16, block_version: u8) -> Self {
        Self { block_type, block_size, block_version }
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.block_type, self.block_size, self.block_version)
    }
}

/// A key document to register for one circuit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VkSource {
    pub circuit: CircuitId,
    pub path: PathBuf,
}

impl VkSource {
    pub fn new(circuit: CircuitId, path: impl Into<PathBuf>) -> Self {
        Self { circuit, path: path.into() }
    }
}

/// A flattened key ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitKey {
    pub circuit: CircuitId,
    pub key: FlattenedVerificationKey,
}

/// Load, validate and flatten every source.
///
/// All documents are checked before returning, so a malformed key is
/// reported before any registration is attempted.
pub fn load_circuit_keys(sources: &[VkSource]) -> Result<Vec<CircuitKey>> {
    let mut seen = HashSet::new();
    let mut keys = Vec::with_capacity(sources.len());

    for source in sources {
        if !seen.insert(source.circuit) {
            return Err(VerifierError::DuplicateCircuit(source.circuit));
        }
        debug!("Reading verification key for circuit {} from {:?}", source.circuit, source.path);
        let vk = VerificationKey::from_file(&source.path)?;
        let key = flatten(&vk);
        info!(
            "Verification key for circuit {} loaded ({} elements, {} public inputs)",
            source.circuit,
            key.len(),
            vk.public_inputs(),
        );
        keys.push(CircuitKey { circuit: source.circuit, key });
    }

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_vk(dir: &tempfile::TempDir, name: &str, offset: u64) -> PathBuf {
        let n = |i: u64| (offset + i).to_string();
        let doc = serde_json::json!({
            "alpha": [n(1), n(2)],
            "beta": [[n(3), n(4)], [n(5), n(6)]],
            "gamma": [[n(7), n(8)], [n(9), n(10)]],
            "delta": [[n(11), n(12)], [n(13), n(14)]],
            "gammaABC": [[n(15), n(16)], [n(17), n(18)]]
        });
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(doc.to_string().as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_two_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec![
            VkSource::new(CircuitId::new(0, 16, 0), write_vk(&dir, "all_16_vk.json", 0)),
            VkSource::new(CircuitId::new(0, 64, 0), write_vk(&dir, "all_64_vk.json", 100)),
        ];

        let keys = load_circuit_keys(&sources).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].circuit.block_size, 16);
        assert_eq!(keys[1].circuit.block_size, 64);
        assert_eq!(keys[0].key.len(), 18);
        assert_ne!(keys[0].key, keys[1].key);
    }

    #[test]
    fn test_duplicate_circuit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_vk(&dir, "vk.json", 0);
        let sources = vec![
            VkSource::new(CircuitId::new(0, 16, 0), path.clone()),
            VkSource::new(CircuitId::new(0, 16, 0), path),
        ];
        assert!(matches!(
            load_circuit_keys(&sources),
            Err(VerifierError::DuplicateCircuit(_))
        ));
    }

    #[test]
    fn test_malformed_second_file_fails_whole_load() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_vk(&dir, "good.json", 0);
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"alpha": ["1"]}"#).unwrap();

        let sources = vec![
            VkSource::new(CircuitId::new(0, 16, 0), good),
            VkSource::new(CircuitId::new(0, 64, 0), bad.clone()),
        ];
        let err = load_circuit_keys(&sources).unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn test_missing_file() {
        let sources = vec![VkSource::new(CircuitId::new(0, 16, 0), "/nonexistent/vk.json")];
        assert!(matches!(load_circuit_keys(&sources), Err(VerifierError::Io { .. })));
    }

    #[test]
    fn test_circuit_id_serde() {
        let json = serde_json::to_value(CircuitId::new(0, 64, 0)).unwrap();
        assert_eq!(json["blockSize"], 64);
    }
}
