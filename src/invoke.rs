use std::sync::Arc;

use fvm_shared::address::Address;
use tracing::{debug, info};

use crate::encoding::EncodedEnvelope;
use crate::error::{CallError, Stage};
use crate::types::Method;
use crate::wallet::{CallReceipt, PendingCall, WalletRpc};

/// Epochs on top of the inclusion epoch before a message counts as final.
pub const CONFIRMATIONS: u64 = 1;

/// Sends actor calls through a wallet and waits for their receipts.
///
/// Nothing here retries. Once the message is pushed its CID is the only
/// handle on it, and pushing again could execute the method twice.
pub struct Invoker<W: ?Sized> {
    wallet: Arc<W>,
    confirmations: u64,
}

impl<W: WalletRpc + ?Sized> Invoker<W> {
    pub fn new(wallet: Arc<W>) -> Self {
        Self::with_confirmations(wallet, CONFIRMATIONS)
    }

    pub fn with_confirmations(wallet: Arc<W>, confirmations: u64) -> Self {
        Self {
            wallet,
            confirmations,
        }
    }

    pub async fn invoke(
        &self,
        target: &Address,
        caller: &Address,
        method: Method,
        params: Option<&EncodedEnvelope>,
    ) -> Result<CallReceipt, CallError> {
        let call = PendingCall {
            to: target.clone(),
            from: caller.clone(),
            method: method.number(),
            params: params.map(EncodedEnvelope::to_base64).unwrap_or_default(),
        };
        info!(to = %call.to, from = %call.from, "going to call {}", method);

        let message = self
            .wallet
            .create_message(&call)
            .await
            .map_err(|source| CallError::TransactionFailed {
                stage: Stage::Create,
                source,
            })?;
        debug!(nonce = message.nonce, gas_limit = message.gas_limit, "message created");

        let signed = self
            .wallet
            .sign_message(message)
            .await
            .map_err(|source| CallError::TransactionFailed {
                stage: Stage::Sign,
                source,
            })?;

        let id = self
            .wallet
            .send_signed_message(&signed)
            .await
            .map_err(|source| CallError::TransactionFailed {
                stage: Stage::Submit,
                source,
            })?;
        info!(cid = %id.root, "message pushed, waiting for {} confirmation(s)", self.confirmations);

        let receipt = self
            .wallet
            .wait_for_confirmation(&id, self.confirmations)
            .await
            .map_err(|source| CallError::TransactionFailed {
                stage: Stage::Confirm,
                source,
            })?;
        debug!(
            cid = %id.root,
            exit_code = receipt.exit_code.value(),
            gas_used = receipt.gas_used,
            "message confirmed"
        );
        Ok(receipt)
    }
}
