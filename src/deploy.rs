//! Creating a lucky draw actor through InitActor#Exec.

use cid::Cid;
use fvm_shared::address::Address;
use tracing::info;

use crate::address::on_network;
use crate::encoding;
use crate::error::CallError;
use crate::invoke::Invoker;
use crate::receipt::{self, Decoded};
use crate::types::{ExecReturn, Method};
use crate::wallet::WalletRpc;

pub const INIT_ACTOR: &str = "f01";

/// Constructor input for a new lucky draw actor.
#[derive(Clone, Debug, PartialEq)]
pub struct Deployment {
    pub code_cid: Cid,
    pub owner: Address,
    pub winners_num: u32,
    pub candidates: Vec<Address>,
}

pub async fn create_actor<W: WalletRpc + ?Sized>(
    invoker: &Invoker<W>,
    init_actor: &Address,
    caller: &Address,
    deployment: &Deployment,
) -> Result<ExecReturn, CallError> {
    let ctor = encoding::init_params(
        &deployment.owner,
        deployment.winners_num,
        &deployment.candidates,
    )?;
    let params = encoding::exec_params(deployment.code_cid, &ctor)?;
    info!(code = %deployment.code_cid, winners = deployment.winners_num, "creating actor");

    let r = invoker
        .invoke(init_actor, caller, Method::Exec, Some(&params))
        .await?;
    match receipt::interpret(&r, Method::Exec)? {
        Decoded::ActorCreated(ret) => {
            let network = init_actor.network();
            let ret = ExecReturn {
                id_address: on_network(ret.id_address, network),
                robust_address: on_network(ret.robust_address, network),
            };
            info!(id = %ret.id_address, robust = %ret.robust_address, "actor created");
            Ok(ret)
        }
        other => Err(CallError::Decode {
            method: Method::Exec,
            reason: format!("unexpected {other:?}"),
        }),
    }
}
