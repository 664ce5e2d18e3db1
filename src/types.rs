use std::fmt;

use cid::Cid;
use fvm_ipld_encoding::tuple::{Deserialize_tuple, Serialize_tuple};
use fvm_ipld_encoding::RawBytes;
use fvm_shared::address::Address;
use fvm_shared::MethodNum;

/// Entry points of the lucky draw actor, plus the init actor's Exec used to
/// deploy it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    AddCandidates,
    SetReady,
    LuckyDraw,
    ReadCurrentState,
    /// InitActor#Exec. Targets the init actor, not the lucky draw actor.
    Exec,
}

impl Method {
    pub const fn number(self) -> MethodNum {
        match self {
            Method::AddCandidates => 2,
            Method::SetReady => 3,
            Method::LuckyDraw => 4,
            Method::ReadCurrentState => 5,
            Method::Exec => 2,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::AddCandidates => "add_candidates",
            Method::SetReady => "ready",
            Method::LuckyDraw => "lucky_draw",
            Method::ReadCurrentState => "current_state",
            Method::Exec => "exec",
        };
        write!(f, "{} (method {})", name, self.number())
    }
}

#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq)]
pub struct AddCandidatesParam {
    pub addresses: Vec<Address>,
}

/// Constructor params of the lucky draw actor.
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq)]
pub struct InitParam {
    pub owner: Address,
    pub winners_num: u32,
    pub candidates: Vec<Address>,
}

/// Init actor Exec params
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq)]
pub struct ExecParams {
    pub code_cid: Cid,
    pub constructor_params: RawBytes,
}

/// Init actor Exec return value
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq)]
pub struct ExecReturn {
    /// ID based address for created actor
    pub id_address: Address,
    /// Reorg safe address for actor
    pub robust_address: Address,
}
