//! dexboot Settings
//!
//! Configuration for a bootstrap run, stored as JSON.
//!
//! ## Sections
//!
//! - `chain`: mock or live node, RPC endpoint, gas ceiling, receipt polling
//! - `deploy`: artifacts directory, fresh-chain flag, admin, genesis root
//! - `funding`: demonstration deposit amounts and the strict flag
//! - `circuits`: verification-key documents to register
//!
//! ## Usage
//!
//! ```no_run
//! use dexboot_settings::Settings;
//!
//! let mut settings = Settings::load_or_default()?;
//! settings.funding.strict = true;
//! settings.save()?;
//! # Ok::<(), dexboot_settings::SettingsError>(())
//! ```

mod config;

pub use config::{
    ChainModeSetting, ChainSettings, CircuitSettings, DeploySettings, FundingSettings, Settings,
};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to create config directory: {0}")]
    CreateDirError(std::io::Error),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Default settings file, relative to the working directory
pub fn default_settings_path() -> PathBuf {
    PathBuf::from("dexboot.json")
}
