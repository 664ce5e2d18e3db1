//! The wallet/RPC collaborator: key custody, signing and chain access live
//! behind [`WalletRpc`]. Message types use the Lotus JSON shapes.

use async_trait::async_trait;
use fvm_shared::address::Address;
use fvm_shared::error::ExitCode;
use fvm_shared::MethodNum;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RpcError;

/// One actor call about to be sent. Value is always zero.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingCall {
    pub to: Address,
    pub from: Address,
    pub method: MethodNum,
    /// base64 envelope, empty for methods without params
    pub params: String,
}

impl PendingCall {
    pub const VALUE: &'static str = "0";
}

/// CID in its JSON form, `{"/": "bafy..."}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallId {
    #[serde(rename = "/")]
    pub root: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct UnsignedMessage {
    pub version: u64,
    pub to: String,
    pub from: String,
    pub nonce: u64,
    pub value: String,
    pub gas_limit: i64,
    pub gas_fee_cap: String,
    pub gas_premium: String,
    pub method: MethodNum,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: String,
    #[serde(rename = "CID", default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<CallId>,
}

impl UnsignedMessage {
    /// Message with gas fields left for the node to estimate.
    pub fn from_call(call: &PendingCall, nonce: u64) -> Self {
        Self {
            version: 0,
            to: call.to.to_string(),
            from: call.from.to_string(),
            nonce,
            value: PendingCall::VALUE.to_owned(),
            gas_limit: 0,
            gas_fee_cap: "0".to_owned(),
            gas_premium: "0".to_owned(),
            method: call.method,
            params: call.params.clone(),
            cid: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Signature {
    #[serde(rename = "Type")]
    pub sig_type: u8,
    pub data: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SignedMessage {
    pub message: UnsignedMessage,
    pub signature: Signature,
}

/// Execution outcome of a confirmed message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CallReceipt {
    pub exit_code: ExitCode,
    /// base64 on success; whatever the node reports otherwise
    #[serde(rename = "Return", default, deserialize_with = "null_as_empty")]
    pub return_data: String,
    #[serde(default)]
    pub gas_used: i64,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[async_trait]
pub trait WalletRpc: Send + Sync {
    /// Address of the wallet's default key; used as the owner and caller.
    async fn default_address(&self) -> Result<Address, RpcError>;

    /// Fills in nonce and gas for `call`.
    async fn create_message(&self, call: &PendingCall) -> Result<UnsignedMessage, RpcError>;

    async fn sign_message(&self, message: UnsignedMessage) -> Result<SignedMessage, RpcError>;

    async fn send_signed_message(&self, message: &SignedMessage) -> Result<CallId, RpcError>;

    /// Resolves once `id` is on chain with `confirmations` epochs on top.
    async fn wait_for_confirmation(
        &self,
        id: &CallId,
        confirmations: u64,
    ) -> Result<CallReceipt, RpcError>;
}
