//! Truffle build artifacts: bytecode with library placeholders and the
//! addresses of earlier deployments per network.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use dexboot_core::{Address, ModuleName, SystemPlan};

use crate::{ChainError, Result};

/// Width of a library placeholder in hex characters (one address)
pub const PLACEHOLDER_LEN: usize = 40;

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkEntry {
    pub address: Address,
}

/// One compiled contract
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    /// Hex creation code, possibly containing `__Name___` placeholders
    pub bytecode: String,
    #[serde(default)]
    pub networks: HashMap<String, NetworkEntry>,
}

impl Artifact {
    /// `__` followed by the library name padded with `_` to the width of an
    /// address
    pub fn placeholder(library: &str) -> String {
        let mut marker = String::with_capacity(PLACEHOLDER_LEN);
        marker.push_str("__");
        marker.extend(library.chars().take(PLACEHOLDER_LEN - 2));
        while marker.len() < PLACEHOLDER_LEN {
            marker.push('_');
        }
        marker
    }

    /// Replace every placeholder for `library` in `bytecode` with `address`.
    ///
    /// Returns whether anything was replaced.
    pub fn link_library(bytecode: &mut String, library: &str, address: Address) -> bool {
        let marker = Self::placeholder(library);
        if !bytecode.contains(&marker) {
            return false;
        }
        *bytecode = bytecode.replace(&marker, &hex::encode(address));
        true
    }

    /// Library names still referenced by placeholders in `bytecode`.
    ///
    /// Works on bytes. Code that is not ASCII is rejected by
    /// [`Artifact::linked_bytecode`] before decoding.
    pub fn unresolved_libraries(bytecode: &str) -> Vec<String> {
        let bytes = bytecode.as_bytes();
        let mut names = Vec::new();
        let mut pos = 0;
        while let Some(offset) = bytes[pos..].windows(2).position(|w| w == b"__") {
            let start = pos + offset;
            let end = (start + PLACEHOLDER_LEN).min(bytes.len());
            let name = String::from_utf8_lossy(&bytes[start..end]).trim_matches('_').to_string();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
            pos = end;
        }
        names
    }

    /// Link libraries in order and decode. Fails if any placeholder is left.
    pub fn linked_bytecode(&self, links: &[(ModuleName, Address)]) -> Result<Vec<u8>> {
        if !self.bytecode.is_ascii() {
            return Err(ChainError::InvalidArtifact {
                name: self.contract_name.clone(),
                reason: "bytecode is not ASCII hex".to_string(),
            });
        }

        let mut code = self.bytecode.trim_start_matches("0x").to_string();
        for (library, address) in links {
            if Artifact::link_library(&mut code, library.as_str(), *address) {
                debug!("Linked {} at {:?} into {}", library, address, self.contract_name);
            }
        }

        if let Some(library) = Self::unresolved_libraries(&code).into_iter().next() {
            return Err(ChainError::UnlinkedLibrary {
                contract: self.contract_name.clone(),
                library,
            });
        }

        hex::decode(&code).map_err(|e| ChainError::InvalidArtifact {
            name: self.contract_name.clone(),
            reason: format!("bytecode: {}", e),
        })
    }

    pub fn address_on(&self, network_id: &str) -> Option<Address> {
        self.networks.get(network_id).map(|n| n.address)
    }
}

/// Artifacts by contract name
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    artifacts: HashMap<String, Artifact>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts.insert(artifact.contract_name.clone(), artifact);
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Load every `*.json` artifact in `dir` (a Truffle `build/contracts`
    /// directory)
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut registry = Self::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let artifact: Artifact =
                serde_json::from_str(&content).map_err(|e| ChainError::InvalidArtifact {
                    name: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            registry.insert(artifact);
        }
        debug!("Loaded {} artifacts from {:?}", registry.len(), dir);
        Ok(registry)
    }

    /// Placeholder artifacts for every module of `plan`, for mock runs.
    ///
    /// The bytecode carries one placeholder per library so linking is
    /// exercised exactly as with compiled artifacts.
    pub fn synthetic(plan: &SystemPlan) -> Self {
        let mut registry = Self::new();
        for module in &plan.modules {
            let mut bytecode = String::from("0x608060405234801561001057600080fd5b50");
            for library in &module.libraries {
                bytecode.push_str("73");
                bytecode.push_str(&Artifact::placeholder(library.as_str()));
                bytecode.push_str("5af4");
            }
            bytecode.push_str("00");
            registry.insert(Artifact {
                contract_name: module.name.as_str().to_string(),
                bytecode,
                networks: HashMap::new(),
            });
        }
        registry
    }

    pub fn get(&self, name: &ModuleName) -> Result<&Artifact> {
        self.artifacts
            .get(name.as_str())
            .ok_or_else(|| ChainError::ArtifactNotFound(name.to_string()))
    }

    /// Address recorded for `name` by an earlier migration on `network_id`
    pub fn deployed_address(&self, name: &ModuleName, network_id: &str) -> Result<Address> {
        self.get(name)?.address_on(network_id).ok_or_else(|| {
            ChainError::ArtifactNotFound(format!("{} on network {}", name, network_id))
        })
    }
}
