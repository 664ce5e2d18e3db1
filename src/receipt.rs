//! Classifying and decoding call receipts.

use fvm_ipld_encoding::from_slice;
use tracing::{debug, warn};

use crate::encoding::{EncodedEnvelope, EncodingError};
use crate::error::CallError;
use crate::types::{ExecReturn, Method};
use crate::wallet::CallReceipt;

#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    /// The method returns nothing worth showing.
    Success,
    /// Human readable return value, e.g. the actor's state summary.
    Text(String),
    /// Plain winner address from a draw.
    Winner(String),
    ActorCreated(ExecReturn),
}

pub fn interpret(receipt: &CallReceipt, method: Method) -> Result<Decoded, CallError> {
    if !receipt.exit_code.is_success() {
        warn!(
            exit_code = receipt.exit_code.value(),
            "{} rejected: {}", method, receipt.return_data
        );
        return Err(CallError::ActorCallRejected {
            exit_code: receipt.exit_code,
            raw_return: receipt.return_data.clone(),
        });
    }

    let decode_err = |reason: String| CallError::Decode { method, reason };
    let decoded = match method {
        Method::AddCandidates | Method::SetReady => Decoded::Success,
        Method::ReadCurrentState => Decoded::Text(
            decode_display(&receipt.return_data).map_err(|e| decode_err(e.to_string()))?,
        ),
        Method::LuckyDraw => {
            let raw = &receipt.return_data;
            let text = decode_display(raw)
                .map_err(|e| decode_err(format!("{e} (return {raw:?})")))?;
            let winner = trim_winner(&text);
            if winner.is_empty() {
                return Err(decode_err(format!("no winner in {text:?} (return {raw:?})")));
            }
            Decoded::Winner(winner.to_owned())
        }
        Method::Exec => Decoded::ActorCreated(
            EncodedEnvelope::from_base64(&receipt.return_data)
                .and_then(|env| env.decode())
                .map_err(|e| decode_err(e.to_string()))?,
        ),
    };
    debug!("{} succeeded: {:?}", method, decoded);
    Ok(decoded)
}

/// Turns a base64 return value into display text.
///
/// The actor returns CBOR encoded strings. Anything that is not a CBOR text
/// string is shown as (lossy) UTF-8.
pub fn decode_display(text: &str) -> Result<String, EncodingError> {
    let env = EncodedEnvelope::from_base64(text)?;
    if env.bytes().is_empty() {
        return Ok(String::new());
    }
    match from_slice::<String>(env.bytes()) {
        Ok(s) => Ok(s),
        Err(_) => Ok(String::from_utf8_lossy(env.bytes()).into_owned()),
    }
}

const WINNER_LABEL: &str = "Winner:";
const ENCLOSING: [(char, char); 4] = [('"', '"'), ('\'', '\''), ('[', ']'), ('(', ')')];

/// Strips the `Winner:` label and enclosing quotes or brackets from a draw
/// result. Applying it to its own output changes nothing.
pub fn trim_winner(raw: &str) -> &str {
    let mut s = raw.trim();
    loop {
        let next = match s.strip_prefix(WINNER_LABEL) {
            Some(rest) => rest,
            None => match strip_enclosing(s) {
                Some(inner) => inner,
                None => return s,
            },
        };
        s = next.trim();
    }
}

fn strip_enclosing(s: &str) -> Option<&str> {
    ENCLOSING
        .iter()
        .find_map(|(open, close)| s.strip_prefix(*open)?.strip_suffix(*close))
}
