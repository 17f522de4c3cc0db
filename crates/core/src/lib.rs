//! dexboot Core Types
//!
//! Addresses, ABI values, module descriptors and the static system plan
//! shared by every dexboot crate.

mod error;
mod module;
mod plan;
mod pool;
mod types;
mod value;

pub use error::*;
pub use module::*;
pub use plan::*;
pub use pool::*;
pub use types::*;
pub use value::*;
