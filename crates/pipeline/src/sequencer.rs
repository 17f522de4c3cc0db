//! Deployment sequencer: one deployment per module, in plan order

use std::collections::HashMap;

use tracing::info;

use dexboot_chain::{ArtifactRegistry, Chain, DeployRequest, TxOptions};
use dexboot_core::{Address, DeployedInstance, ModuleDescriptor, ModuleName, Token};

use crate::linker::Linker;
use crate::{PipelineError, Result};

/// Owner of every deployed instance in a run
#[derive(Debug, Default)]
pub struct Sequencer {
    instances: Vec<DeployedInstance>,
    index: HashMap<ModuleName, usize>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_deployed(&self, name: &ModuleName) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &ModuleName) -> Option<&DeployedInstance> {
        self.index.get(name).map(|&i| &self.instances[i])
    }

    /// Address of a deployed module, or `DependencyNotReady` naming the
    /// dependent
    pub fn require(&self, name: &ModuleName, required_by: &str) -> Result<Address> {
        self.get(name)
            .map(|instance| instance.address)
            .ok_or_else(|| PipelineError::DependencyNotReady {
                module: name.clone(),
                required_by: required_by.to_string(),
            })
    }

    /// Instances in the order they became available
    pub fn instances(&self) -> &[DeployedInstance] {
        &self.instances
    }

    fn record(&mut self, instance: DeployedInstance) -> DeployedInstance {
        self.index.insert(instance.name.clone(), self.instances.len());
        self.instances.push(instance.clone());
        instance
    }

    /// Record a module deployed by an earlier migration
    pub fn adopt(&mut self, name: &ModuleName, address: Address) -> Result<DeployedInstance> {
        if self.is_deployed(name) {
            return Err(PipelineError::AlreadyDeployed(name.clone()));
        }
        info!("Using existing {} at {:?}", name, address);
        Ok(self.record(DeployedInstance {
            name: name.clone(),
            address,
            tx_hash: None,
        }))
    }

    /// Deploy `descriptor` and wait for the receipt.
    ///
    /// Every library must already be deployed and linked into the module;
    /// the module is never submitted with an unresolved placeholder.
    #[allow(clippy::too_many_arguments)]
    pub async fn deploy(
        &mut self,
        chain: &dyn Chain,
        artifacts: &ArtifactRegistry,
        linker: &Linker,
        descriptor: &ModuleDescriptor,
        constructor_args: Vec<Token>,
        gas_limit: u64,
        from: Address,
    ) -> Result<DeployedInstance> {
        let name = &descriptor.name;
        if self.is_deployed(name) {
            return Err(PipelineError::AlreadyDeployed(name.clone()));
        }

        for library in &descriptor.libraries {
            self.require(library, name.as_str())?;
            if !linker.is_linked(library, name) {
                return Err(PipelineError::DependencyNotReady {
                    module: library.clone(),
                    required_by: name.to_string(),
                });
            }
        }

        let artifact = artifacts.get(name).map_err(|source| PipelineError::Artifact {
            module: name.clone(),
            source,
        })?;
        let bytecode = artifact
            .linked_bytecode(linker.links_for(name))
            .map_err(|source| PipelineError::Artifact {
                module: name.clone(),
                source,
            })?;

        info!("Deploying {} (gas {})", name, gas_limit);
        let receipt = chain
            .deploy(DeployRequest {
                contract: name.to_string(),
                bytecode,
                constructor_args,
                options: TxOptions::sender(from).with_gas(gas_limit),
            })
            .await
            .map_err(|source| PipelineError::SubmissionFailure {
                step: "deploy".to_string(),
                target: name.to_string(),
                source,
            })?;

        let address = receipt.contract_address.ok_or_else(|| PipelineError::SubmissionFailure {
            step: "deploy".to_string(),
            target: name.to_string(),
            source: dexboot_chain::ChainError::InvalidResponse("no contract address".to_string()),
        })?;
        info!("{} deployed at {:?} (block {})", name, address, receipt.block_number);

        Ok(self.record(DeployedInstance {
            name: name.clone(),
            address,
            tx_hash: Some(receipt.tx_hash),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexboot_chain::{ChainClient, ChainConfig};
    use dexboot_core::SystemPlan;

    async fn setup() -> (ChainClient, ArtifactRegistry, Address) {
        let chain = ChainClient::new(ChainConfig::mock());
        let artifacts = ArtifactRegistry::synthetic(&SystemPlan::standard());
        let admin = chain.accounts().await.unwrap()[0];
        (chain, artifacts, admin)
    }

    #[tokio::test]
    async fn test_deploy_records_instance() {
        let (chain, artifacts, admin) = setup().await;
        let mut sequencer = Sequencer::new();
        let descriptor = ModuleDescriptor::deploy("DefaultDepositContract", 6_700_000);

        let instance = sequencer
            .deploy(&chain, &artifacts, &Linker::new(), &descriptor, vec![], 6_700_000, admin)
            .await
            .unwrap();
        assert!(instance.tx_hash.is_some());
        assert_eq!(sequencer.require(&descriptor.name, "test").unwrap(), instance.address);
        assert_eq!(sequencer.instances().len(), 1);
    }

    #[tokio::test]
    async fn test_second_deploy_is_rejected() {
        let (chain, artifacts, admin) = setup().await;
        let mut sequencer = Sequencer::new();
        let descriptor = ModuleDescriptor::deploy("DefaultDepositContract", 6_700_000);
        let linker = Linker::new();

        sequencer
            .deploy(&chain, &artifacts, &linker, &descriptor, vec![], 6_700_000, admin)
            .await
            .unwrap();
        let err = sequencer
            .deploy(&chain, &artifacts, &linker, &descriptor, vec![], 6_700_000, admin)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyDeployed(_)));
        // only one creation reached the chain
        assert_eq!(chain.block_number().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_adopted_module_cannot_be_deployed() {
        let (chain, artifacts, admin) = setup().await;
        let mut sequencer = Sequencer::new();
        let name = ModuleName::new("USDT");
        sequencer.adopt(&name, Address::from([7; 20])).unwrap();

        let err = sequencer
            .deploy(&chain, &artifacts, &Linker::new(), &ModuleDescriptor::deploy("USDT", 1_000_000), vec![], 1_000_000, admin)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyDeployed(_)));
        assert!(matches!(sequencer.adopt(&name, Address::from([8; 20])), Err(PipelineError::AlreadyDeployed(_))));
    }

    #[tokio::test]
    async fn test_unlinked_library_blocks_deploy() {
        let (chain, artifacts, admin) = setup().await;
        let mut sequencer = Sequencer::new();
        let exchange = SystemPlan::standard()
            .module(&"ExchangeV3".into())
            .cloned()
            .unwrap();

        // libraries not deployed at all
        let err = sequencer
            .deploy(&chain, &artifacts, &Linker::new(), &exchange, vec![], 6_700_000, admin)
            .await
            .unwrap_err();
        assert!(err.is_dependency_not_ready());

        // deployed but not linked into the exchange
        for library in &exchange.libraries {
            sequencer.adopt(library, Address::from([1; 20])).unwrap();
        }
        let err = sequencer
            .deploy(&chain, &artifacts, &Linker::new(), &exchange, vec![], 6_700_000, admin)
            .await
            .unwrap_err();
        assert!(err.is_dependency_not_ready());
        assert!(!sequencer.is_deployed(&exchange.name));
        assert_eq!(chain.block_number().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_chain_rejection_is_submission_failure() {
        let (chain, artifacts, admin) = setup().await;
        let mut sequencer = Sequencer::new();
        let descriptor = ModuleDescriptor::deploy("DefaultDepositContract", 9_000_000);

        let err = sequencer
            .deploy(&chain, &artifacts, &Linker::new(), &descriptor, vec![], 9_000_000, admin)
            .await
            .unwrap_err();
        match err {
            PipelineError::SubmissionFailure { target, .. } => assert_eq!(target, "DefaultDepositContract"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!sequencer.is_deployed(&descriptor.name));
    }
}
