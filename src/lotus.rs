//! [`WalletRpc`] over a Lotus node's JSON-RPC API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fvm_shared::address::Address;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{info, trace, warn};

use crate::address::validate;
use crate::error::{CallError, RpcError};
use crate::wallet::{CallId, CallReceipt, PendingCall, SignedMessage, UnsignedMessage, WalletRpc};
use crate::workflow::{CallOptions, Endpoint, SetupFields, Workflow};

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MsgLookup {
    receipt: CallReceipt,
    #[serde(default)]
    height: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TipSet {
    height: i64,
}

pub struct LotusClient {
    client: Client,
    endpoint: Endpoint,
    next_id: AtomicU64,
}

impl LotusClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn chain_head_height(&self) -> Result<i64, RpcError> {
        let head: TipSet = self.request("Filecoin.ChainHead", json!([])).await?;
        Ok(head.height)
    }

    async fn request<P, R>(&self, method: &str, params: P) -> Result<R, RpcError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });
        trace!(%method, id, "rpc request");

        let mut req = self.client.post(&self.endpoint.url).json(&body);
        if !self.endpoint.token.is_empty() {
            req = req.bearer_auth(&self.endpoint.token);
        }
        let resp: RpcResponse<R> = req.send().await?.error_for_status()?.json().await?;
        match (resp.result, resp.error) {
            (_, Some(err)) => Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(RpcError::Malformed(format!("{method}: empty result"))),
        }
    }
}

#[async_trait]
impl WalletRpc for LotusClient {
    async fn default_address(&self) -> Result<Address, RpcError> {
        let addr: String = self.request("Filecoin.WalletDefaultAddress", json!([])).await?;
        validate(&addr).map_err(|e| RpcError::Malformed(e.to_string()))
    }

    async fn create_message(&self, call: &PendingCall) -> Result<UnsignedMessage, RpcError> {
        let nonce: u64 = self
            .request("Filecoin.MpoolGetNonce", (call.from.to_string(),))
            .await?;
        let message = UnsignedMessage::from_call(call, nonce);
        let spec = json!({ "MaxFee": "0" });
        let tipset_key: Vec<CallId> = Vec::new();
        self.request("Filecoin.GasEstimateMessageGas", (message, spec, tipset_key))
            .await
    }

    async fn sign_message(&self, message: UnsignedMessage) -> Result<SignedMessage, RpcError> {
        let from = message.from.clone();
        self.request("Filecoin.WalletSignMessage", (from, message))
            .await
    }

    async fn send_signed_message(&self, message: &SignedMessage) -> Result<CallId, RpcError> {
        self.request("Filecoin.MpoolPush", (message,)).await
    }

    async fn wait_for_confirmation(
        &self,
        id: &CallId,
        confirmations: u64,
    ) -> Result<CallReceipt, RpcError> {
        let lookup: MsgLookup = self
            .request("Filecoin.StateWaitMsg", (id, confirmations))
            .await?;
        trace!(cid = %id.root, height = lookup.height, "message landed");
        Ok(lookup.receipt)
    }
}

impl Workflow<LotusClient> {
    /// Runs the setup step against a Lotus node.
    pub async fn open(fields: &SetupFields, options: CallOptions) -> Result<Self, CallError> {
        let setup = fields.validate()?;
        let client = Arc::new(LotusClient::new(setup.endpoint.clone()));
        match client.chain_head_height().await {
            Ok(height) => info!(height, "current chain height"),
            Err(err) => warn!(error = %err, "failed to get chain head"),
        }
        Workflow::connect(setup, client, options).await
    }
}
