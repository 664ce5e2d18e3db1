use std::fmt;

use fvm_shared::error::ExitCode;
use thiserror::Error;

use crate::address::InvalidAddressFormat;
use crate::encoding::EncodingError;
use crate::types::Method;
use crate::workflow::Step;

/// Failure reported by the wallet/RPC collaborator.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("http transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed rpc response: {0}")]
    Malformed(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Where in the message lifecycle a transaction failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Create,
    Sign,
    Submit,
    Confirm,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Create => "create message",
            Stage::Sign => "sign message",
            Stage::Submit => "push message",
            Stage::Confirm => "wait message",
        })
    }
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddressFormat),
    #[error("please add some candidates")]
    EmptyCandidates,
    #[error("missing setup field: {0}")]
    MissingField(&'static str),
    #[error("failed to get owner address: {0}")]
    OwnerResolution(#[source] RpcError),
    #[error("transaction failed at {stage}: {source}")]
    TransactionFailed {
        stage: Stage,
        #[source]
        source: RpcError,
    },
    #[error("actor call rejected with exit code {}: {raw_return}", .exit_code.value())]
    ActorCallRejected {
        exit_code: ExitCode,
        raw_return: String,
    },
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("failed to decode return value of {method}: {reason}")]
    Decode { method: Method, reason: String },
    #[error("another call is still in flight")]
    Busy,
    #[error("{operation} is not available at step {step}")]
    WrongStep {
        operation: &'static str,
        step: Step,
    },
}

/// Coarse classification surfaced to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Detected locally, nothing was sent.
    Validation,
    /// Owner resolution, message creation or signing failed.
    Wallet,
    /// Push or confirmation wait failed.
    Submission,
    /// The actor exited with a nonzero code.
    Rejected,
    /// The call succeeded but its return value could not be read.
    Decode,
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::InvalidAddress(_)
            | CallError::EmptyCandidates
            | CallError::MissingField(_)
            | CallError::Encoding(_)
            | CallError::Busy
            | CallError::WrongStep { .. } => ErrorKind::Validation,
            CallError::OwnerResolution(_) => ErrorKind::Wallet,
            CallError::TransactionFailed { stage, .. } => match stage {
                Stage::Create | Stage::Sign => ErrorKind::Wallet,
                Stage::Submit | Stage::Confirm => ErrorKind::Submission,
            },
            CallError::ActorCallRejected { .. } => ErrorKind::Rejected,
            CallError::Decode { .. } => ErrorKind::Decode,
        }
    }
}
