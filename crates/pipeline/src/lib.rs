//! dexboot Pipeline
//!
//! Deploys the exchange system and bootstraps it into a usable state.
//!
//! ## Phases
//!
//! 1. **Deploy**: modules from earlier migrations are adopted from the
//!    artifact registry; the rest are linked against their libraries and
//!    deployed one at a time, each waiting for its receipt.
//! 2. **Wire**: initialize the exchange and its deposit contract and connect
//!    them to each other and to the agent registry.
//! 3. **Register**: base tokens, then pool tokens, then every pool as a
//!    universal agent.
//! 4. **Hand over**: the exchange moves to its owner contract, which opens
//!    block submission.
//! 5. **Pools**: `setupPool` on every pool.
//! 6. **Fund**: approve and deposit for every account. Failures stay with
//!    their account.
//! 7. **Verifier**: register one flattened key per circuit.
//!
//! Phases 2 to 7 only run in [`BootstrapMode::DeployAndBootstrap`].

pub mod configurator;
mod error;
pub mod initializer;
pub mod linker;
mod pipeline;
pub mod registrar;
pub mod sequencer;
pub mod steps;

pub use configurator::{Configurator, FundingFailure, FundingParams, FundingReport};
pub use error::{PipelineError, Result};
pub use initializer::Initializer;
pub use linker::Linker;
pub use pipeline::{BootstrapMode, Pipeline, PipelineConfig, PipelineReport, TEST_ENV_VAR};
pub use registrar::VkRegistrar;
pub use sequencer::Sequencer;
pub use steps::{CallAction, Step, StepRunner};
