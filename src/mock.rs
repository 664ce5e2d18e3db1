//! Scripted in-memory wallet for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use fvm_shared::address::Address;
use fvm_shared::error::ExitCode;
use tokio::sync::Notify;

use crate::address::validate;
use crate::error::{RpcError, Stage};
use crate::wallet::{
    CallId, CallReceipt, PendingCall, Signature, SignedMessage, UnsignedMessage, WalletRpc,
};

pub const OWNER: &str = "f1joi27fay5otrjkn6r3ak4fwxyolkifbz3dlcwdi";

pub fn receipt(exit_code: u32, return_data: &str) -> CallReceipt {
    CallReceipt {
        exit_code: ExitCode::new(exit_code),
        return_data: return_data.to_owned(),
        gas_used: 1_000,
    }
}

/// Receipt whose return is the CBOR text `text`, as the actor emits it.
pub fn text_receipt(text: &str) -> CallReceipt {
    let bytes = fvm_ipld_encoding::to_vec(text).unwrap();
    receipt(0, &B64.encode(bytes))
}

#[derive(Default)]
pub struct MockWallet {
    owner: Option<Address>,
    receipts: Mutex<VecDeque<CallReceipt>>,
    created: Mutex<Vec<PendingCall>>,
    waited: Mutex<Vec<u64>>,
    pushed: AtomicUsize,
    fail_at: Mutex<Option<Stage>>,
    gate: Option<Arc<Notify>>,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            owner: Some(validate(OWNER).unwrap()),
            ..Default::default()
        }
    }

    /// A wallet whose default address lookup fails.
    pub fn without_owner() -> Self {
        Self::default()
    }

    /// Confirmation waits block until `gate` is notified.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn push_receipt(&self, receipt: CallReceipt) {
        self.receipts.lock().unwrap().push_back(receipt);
    }

    pub fn fail_at(&self, stage: Stage) {
        *self.fail_at.lock().unwrap() = Some(stage);
    }

    pub fn created(&self) -> Vec<PendingCall> {
        self.created.lock().unwrap().clone()
    }

    pub fn waited(&self) -> Vec<u64> {
        self.waited.lock().unwrap().clone()
    }

    pub fn pushed(&self) -> usize {
        self.pushed.load(Ordering::SeqCst)
    }

    fn check(&self, stage: Stage) -> Result<(), RpcError> {
        if *self.fail_at.lock().unwrap() == Some(stage) {
            return Err(RpcError::Rpc {
                code: 1,
                message: format!("{stage} refused"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WalletRpc for MockWallet {
    async fn default_address(&self) -> Result<Address, RpcError> {
        self.owner.clone().ok_or_else(|| RpcError::Rpc {
            code: 1,
            message: "no default wallet".into(),
        })
    }

    async fn create_message(&self, call: &PendingCall) -> Result<UnsignedMessage, RpcError> {
        self.created.lock().unwrap().push(call.clone());
        self.check(Stage::Create)?;
        Ok(UnsignedMessage::from_call(call, self.created.lock().unwrap().len() as u64))
    }

    async fn sign_message(&self, message: UnsignedMessage) -> Result<SignedMessage, RpcError> {
        self.check(Stage::Sign)?;
        Ok(SignedMessage {
            message,
            signature: Signature {
                sig_type: 1,
                data: "c2ln".into(),
            },
        })
    }

    async fn send_signed_message(&self, message: &SignedMessage) -> Result<CallId, RpcError> {
        self.check(Stage::Submit)?;
        self.pushed.fetch_add(1, Ordering::SeqCst);
        Ok(CallId {
            root: format!("bafy2bzacemock{}", message.message.nonce),
        })
    }

    async fn wait_for_confirmation(
        &self,
        _id: &CallId,
        confirmations: u64,
    ) -> Result<CallReceipt, RpcError> {
        self.waited.lock().unwrap().push(confirmations);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.check(Stage::Confirm)?;
        self.receipts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| RpcError::Malformed("no receipt scripted".into()))
    }
}
