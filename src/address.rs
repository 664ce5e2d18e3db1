//! Chain address validation.
//!
//! Every address that ends up in a parameter tuple, or is used as the target
//! or caller of a message, goes through [`validate`] first. Validation is
//! purely syntactic: network prefix, protocol, base32 payload and checksum.

use std::str::FromStr;

pub use fvm_shared::address::{Address, Network, Protocol};
use thiserror::Error;

use crate::error::CallError;

#[derive(Debug, Error)]
#[error("invalid address format {input:?}: {source}")]
pub struct InvalidAddressFormat {
    pub input: String,
    #[source]
    pub source: fvm_shared::address::Error,
}

/// Parses `input` into an [`Address`]. Surrounding whitespace is ignored.
pub fn validate(input: &str) -> Result<Address, InvalidAddressFormat> {
    let trimmed = input.trim();
    Address::from_str(trimmed).map_err(|source| InvalidAddressFormat {
        input: trimmed.to_owned(),
        source,
    })
}

/// Puts an address decoded from CBOR back on `network`. The binary layout
/// has no network prefix, so decoding always yields a mainnet address.
pub fn on_network(mut addr: Address, network: Network) -> Address {
    addr.set_network(network);
    addr
}

/// Validates a comma separated address list, as typed into the candidates
/// step. Empty entries (`a,,b` or a trailing comma) are skipped; an input with
/// no entries at all is rejected.
pub fn parse_list(input: &str) -> Result<Vec<Address>, CallError> {
    let addresses = input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(validate)
        .collect::<Result<Vec<_>, _>>()?;
    if addresses.is_empty() {
        return Err(CallError::EmptyCandidates);
    }
    Ok(addresses)
}
