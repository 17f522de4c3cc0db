//! Configuration types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use dexboot_chain::{ChainConfig, ChainMode};
use dexboot_core::{parse_bytes32, pow10, Address, EMPTY_MERKLE_ROOT, H256};
use dexboot_verifier::{CircuitId, VkSource};

use crate::{default_settings_path, Result, SettingsError};

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub chain: ChainSettings,

    #[serde(default)]
    pub deploy: DeploySettings,

    #[serde(default)]
    pub funding: FundingSettings,

    /// Circuits to register, in order
    #[serde(default = "default_circuits")]
    pub circuits: Vec<CircuitSettings>,

    /// Custom settings file path (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chain: ChainSettings::default(),
            deploy: DeploySettings::default(),
            funding: FundingSettings::default(),
            circuits: default_circuits(),
            config_path: None,
        }
    }
}

impl Settings {
    /// Load settings from the default path, or create defaults
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&default_settings_path())
    }

    /// Load settings from a specific path, or create defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            info!("Loaded settings from {:?}", path);
            settings
        } else {
            Self::default()
        };
        settings.config_path = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Save settings to the configured path
    pub fn save(&self) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_settings_path);
        self.save_to(&path)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Verification-key sources, with relative paths resolved against `base`
    pub fn vk_sources(&self, base: &Path) -> Vec<VkSource> {
        self.circuits
            .iter()
            .map(|c| {
                let path = if c.path.is_absolute() { c.path.clone() } else { base.join(&c.path) };
                VkSource::new(CircuitId::new(c.block_type, c.block_size, c.block_version), path)
            })
            .collect()
    }
}

/// Chain mode as written in the settings file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChainModeSetting {
    /// In-memory ledger
    #[default]
    Mock,
    /// JSON-RPC node
    Live,
}

impl From<ChainModeSetting> for ChainMode {
    fn from(mode: ChainModeSetting) -> Self {
        match mode {
            ChainModeSetting::Mock => ChainMode::Mock,
            ChainModeSetting::Live => ChainMode::Live,
        }
    }
}

/// Chain connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettings {
    #[serde(default)]
    pub mode: ChainModeSetting,

    /// Node endpoint (live mode)
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_block_gas_limit")]
    pub block_gas_limit: u64,

    /// Accounts exposed by the mock ledger
    #[serde(default = "default_mock_accounts")]
    pub mock_accounts: usize,

    #[serde(default = "default_poll_interval")]
    pub receipt_poll_interval_ms: u64,

    #[serde(default = "default_poll_attempts")]
    pub receipt_poll_attempts: u32,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_block_gas_limit() -> u64 {
    6_721_975
}

fn default_mock_accounts() -> usize {
    10
}

fn default_poll_interval() -> u64 {
    500
}

fn default_poll_attempts() -> u32 {
    120
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            mode: ChainModeSetting::default(),
            rpc_url: default_rpc_url(),
            block_gas_limit: default_block_gas_limit(),
            mock_accounts: default_mock_accounts(),
            receipt_poll_interval_ms: default_poll_interval(),
            receipt_poll_attempts: default_poll_attempts(),
        }
    }
}

impl ChainSettings {
    pub fn to_chain_config(&self) -> ChainConfig {
        ChainConfig {
            mode: self.mode.into(),
            rpc_url: self.rpc_url.clone(),
            block_gas_limit: self.block_gas_limit,
            mock_accounts: self.mock_accounts,
            receipt_poll_interval_ms: self.receipt_poll_interval_ms,
            receipt_poll_attempts: self.receipt_poll_attempts,
            ..ChainConfig::default()
        }
    }
}

/// Deployment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySettings {
    /// Truffle `build/contracts` directory (live mode)
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Deploy every module instead of adopting earlier migrations
    #[serde(default)]
    pub fresh: bool,

    /// Administrative account. Defaults to the node's first account.
    #[serde(default)]
    pub admin: Option<Address>,

    /// Genesis state root passed to `exchange.initialize`
    #[serde(default = "default_genesis_root")]
    pub genesis_root: String,

    /// Network id override for artifact address lookup
    #[serde(default)]
    pub network_id: Option<String>,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("build/contracts")
}

fn default_genesis_root() -> String {
    EMPTY_MERKLE_ROOT.to_string()
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            fresh: false,
            admin: None,
            genesis_root: default_genesis_root(),
            network_id: None,
        }
    }
}

impl DeploySettings {
    pub fn genesis_root(&self) -> Result<H256> {
        parse_bytes32(&self.genesis_root).map_err(|e| SettingsError::Invalid {
            field: "deploy.genesis_root",
            reason: e.to_string(),
        })
    }
}

/// Demonstration funding amounts, in base units. Amounts are decimal
/// strings so they survive JSON readers limited to 53-bit integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingSettings {
    #[serde(default = "default_allowance", with = "decimal")]
    pub allowance: u128,

    #[serde(default = "default_token_deposit", with = "decimal")]
    pub token_deposit: u128,

    #[serde(default = "default_native_deposit", with = "decimal")]
    pub native_deposit: u128,

    /// Gas for each approval and deposit
    #[serde(default = "default_funding_gas")]
    pub gas: u64,

    /// Fail the run when any account could not be funded
    #[serde(default)]
    pub strict: bool,
}

fn default_allowance() -> u128 {
    pow10(28)
}

fn default_token_deposit() -> u128 {
    pow10(26)
}

fn default_native_deposit() -> u128 {
    pow10(20)
}

fn default_funding_gas() -> u64 {
    200_000
}

impl Default for FundingSettings {
    fn default() -> Self {
        Self {
            allowance: default_allowance(),
            token_deposit: default_token_deposit(),
            native_deposit: default_native_deposit(),
            gas: default_funding_gas(),
            strict: false,
        }
    }
}

/// One verification key to register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSettings {
    pub block_type: u8,
    pub block_size: u16,
    pub block_version: u8,
    pub path: PathBuf,
}

fn default_circuits() -> Vec<CircuitSettings> {
    [16u16, 64]
        .into_iter()
        .map(|size| CircuitSettings {
            block_type: 0,
            block_size: size,
            block_version: 0,
            path: PathBuf::from(format!("test/all_{}_vk.json", size)),
        })
        .collect()
}

mod decimal {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(D::Error::custom),
            Raw::Number(n) => Ok(n as u128),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.chain.mode, ChainModeSetting::Mock);
        assert_eq!(settings.funding.allowance, 10u128.pow(28));
        assert_eq!(settings.funding.token_deposit, 10u128.pow(26));
        assert_eq!(settings.funding.native_deposit, 10u128.pow(20));
        assert_eq!(settings.funding.gas, 200_000);
        assert!(!settings.funding.strict);
        assert_eq!(settings.deploy.genesis_root, EMPTY_MERKLE_ROOT);
    }

    #[test]
    fn test_default_circuits_from_empty_document() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.circuits.len(), 2);
        assert_eq!(settings.circuits[0].block_size, 16);
        assert_eq!(settings.circuits[1].block_size, 64);
        assert_eq!(settings.circuits[1].path, PathBuf::from("test/all_64_vk.json"));
    }

    #[test]
    fn test_settings_serialization() {
        let mut settings = Settings::default();
        settings.funding.strict = true;
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"10000000000000000000000000000\""));

        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.funding.allowance, settings.funding.allowance);
        assert!(parsed.funding.strict);
        assert_eq!(parsed.circuits, settings.circuits);
    }

    #[test]
    fn test_amount_accepts_number() {
        let funding: FundingSettings =
            serde_json::from_str(r#"{"native_deposit": 5, "token_deposit": "7"}"#).unwrap();
        assert_eq!(funding.native_deposit, 5);
        assert_eq!(funding.token_deposit, 7);
        assert_eq!(funding.allowance, 10u128.pow(28));
    }

    #[test]
    fn test_genesis_root_parse() {
        let mut deploy = DeploySettings::default();
        assert!(deploy.genesis_root().is_ok());
        deploy.genesis_root = "not-a-root".to_string();
        assert!(matches!(deploy.genesis_root(), Err(SettingsError::Invalid { .. })));
    }

    #[test]
    fn test_chain_config_conversion() {
        let mut chain = ChainSettings::default();
        chain.mode = ChainModeSetting::Live;
        chain.rpc_url = "http://node:8545".to_string();
        let config = chain.to_chain_config();
        assert_eq!(config.mode, ChainMode::Live);
        assert_eq!(config.rpc_url, "http://node:8545");
        assert_eq!(config.block_gas_limit, 6_721_975);
    }

    #[test]
    fn test_vk_sources_resolve_relative_paths() {
        let settings = Settings::default();
        let sources = settings.vk_sources(Path::new("/repo"));
        assert_eq!(sources[0].path, PathBuf::from("/repo/test/all_16_vk.json"));
        assert_eq!(sources[1].circuit, CircuitId::new(0, 64, 0));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dexboot.json");

        let mut settings = Settings::load_from(&path).unwrap();
        settings.chain.mock_accounts = 3;
        settings.save().unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.chain.mock_accounts, 3);
    }
}
