//! Verification-key registration on the block verifier

use tracing::info;

use dexboot_core::{uint, Arg, ModuleName};
use dexboot_verifier::CircuitKey;

use crate::steps::{Step, StepRunner};
use crate::Result;

pub use dexboot_core::REGISTER_CIRCUIT;

pub struct VkRegistrar {
    verifier: ModuleName,
}

impl VkRegistrar {
    pub fn new(verifier: ModuleName) -> Self {
        Self { verifier }
    }

    /// One `registerCircuit` per key, in the given order
    pub fn steps(&self, keys: &[CircuitKey]) -> Vec<Step> {
        keys.iter()
            .map(|ck| {
                Step::call(
                    format!("blockVerifier.registerCircuit{}", ck.circuit),
                    self.verifier.clone(),
                    REGISTER_CIRCUIT,
                    vec![
                        Arg::Value(uint(ck.circuit.block_type as u128)),
                        Arg::Value(uint(ck.circuit.block_size as u128)),
                        Arg::Value(uint(ck.circuit.block_version as u128)),
                        Arg::Value(ck.key.to_token()),
                    ],
                )
            })
            .collect()
    }

    /// Submit already-loaded keys
    pub async fn register(&self, runner: &StepRunner<'_>, keys: &[CircuitKey]) -> Result<usize> {
        let count = runner.run_all(&self.steps(keys)).await?;
        info!("Registered {} circuits on {}", count, self.verifier);
        Ok(count)
    }
}
