//! Client for the FVM lucky draw actor.
//!
//! Encodes method params the way the actor decodes them, sends the calls
//! through a wallet (a Lotus node by default), waits for the receipts and
//! turns the return values back into something readable.

pub mod address;
pub mod config;
pub mod deploy;
pub mod encoding;
pub mod error;
pub mod invoke;
pub mod lotus;
pub mod receipt;
pub mod types;
pub mod wallet;
pub mod workflow;

#[cfg(test)]
mod mock;

pub use address::{validate, Address};
pub use config::Config;
pub use encoding::EncodedEnvelope;
pub use error::{CallError, ErrorKind, RpcError};
pub use invoke::Invoker;
pub use lotus::LotusClient;
pub use receipt::Decoded;
pub use types::Method;
pub use wallet::{CallReceipt, WalletRpc};
pub use workflow::{CallOptions, SetupFields, Step, Workflow, WorkflowState};
