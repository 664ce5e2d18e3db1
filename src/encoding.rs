//! Parameter envelopes: DAG-CBOR tuples, rendered as base64 for the `Params`
//! field of a message.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use cid::Cid;
use fvm_ipld_encoding::{from_slice, to_vec, RawBytes};
use fvm_shared::address::{Address, Network};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::address::on_network;
use crate::types::{AddCandidatesParam, ExecParams, InitParam};

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("cbor: {0}")]
    Cbor(#[from] fvm_ipld_encoding::Error),
    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Serialized parameters of one actor call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedEnvelope {
    bytes: Vec<u8>,
}

impl EncodedEnvelope {
    pub fn encode<T: Serialize>(params: &T) -> Result<Self, EncodingError> {
        Ok(Self {
            bytes: to_vec(params)?,
        })
    }

    pub fn from_base64(text: &str) -> Result<Self, EncodingError> {
        Ok(Self {
            bytes: B64.decode(text.trim())?,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, EncodingError> {
        Ok(from_slice(&self.bytes)?)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        B64.encode(&self.bytes)
    }
}

pub fn add_candidates(addresses: &[Address]) -> Result<EncodedEnvelope, EncodingError> {
    EncodedEnvelope::encode(&AddCandidatesParam {
        addresses: addresses.to_vec(),
    })
}

pub fn init_params(
    owner: &Address,
    winners_num: u32,
    candidates: &[Address],
) -> Result<EncodedEnvelope, EncodingError> {
    EncodedEnvelope::encode(&InitParam {
        owner: owner.clone(),
        winners_num,
        candidates: candidates.to_vec(),
    })
}

/// Wraps already encoded constructor params for InitActor#Exec.
pub fn exec_params(
    code_cid: Cid,
    constructor_params: &EncodedEnvelope,
) -> Result<EncodedEnvelope, EncodingError> {
    EncodedEnvelope::encode(&ExecParams {
        code_cid,
        constructor_params: RawBytes::new(constructor_params.bytes().to_vec()),
    })
}

/// Decoded addresses are placed on `network`; the envelope does not record it.
pub fn decode_add_candidates(
    text: &str,
    network: Network,
) -> Result<Vec<Address>, EncodingError> {
    let p: AddCandidatesParam = EncodedEnvelope::from_base64(text)?.decode()?;
    Ok(p.addresses
        .into_iter()
        .map(|addr| on_network(addr, network))
        .collect())
}

pub fn decode_init_params(text: &str, network: Network) -> Result<InitParam, EncodingError> {
    let p: InitParam = EncodedEnvelope::from_base64(text)?.decode()?;
    Ok(InitParam {
        owner: on_network(p.owner, network),
        winners_num: p.winners_num,
        candidates: p
            .candidates
            .into_iter()
            .map(|addr| on_network(addr, network))
            .collect(),
    })
}
