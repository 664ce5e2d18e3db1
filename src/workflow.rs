//! The lucky draw wizard as a state machine.
//!
//! Steps run in order: setup, add candidates, set ready, then any number of
//! draws. The actor state can be read at any point after setup. A failed call
//! never moves the workflow; the step can simply be retried.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fvm_shared::address::Address;
use tokio::sync::watch;
use tracing::{info, instrument};

use crate::address::{self, validate};
use crate::encoding::{self, EncodedEnvelope};
use crate::error::CallError;
use crate::invoke::{Invoker, CONFIRMATIONS};
use crate::receipt::{self, Decoded};
use crate::types::Method;
use crate::wallet::WalletRpc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Step {
    #[default]
    Setup,
    CollectCandidates,
    MarkReady,
    Draw,
}

impl Step {
    pub fn number(self) -> u8 {
        match self {
            Step::Setup => 1,
            Step::CollectCandidates => 2,
            Step::MarkReady => 3,
            Step::Draw => 4,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Setup => "setup",
            Step::CollectCandidates => "add candidates",
            Step::MarkReady => "set state ready",
            Step::Draw => "lucky draw",
        };
        write!(f, "{} ({})", self.number(), name)
    }
}

/// RPC endpoint and its bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub token: String,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Raw setup input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetupFields {
    pub actor: String,
    pub rpc_url: String,
    pub rpc_token: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidSetup {
    pub actor: Address,
    pub endpoint: Endpoint,
}

impl SetupFields {
    pub fn validate(&self) -> Result<ValidSetup, CallError> {
        let actor = self.actor.trim();
        let rpc_url = self.rpc_url.trim();
        let rpc_token = self.rpc_token.trim();
        for (name, value) in [("actor", actor), ("rpc url", rpc_url), ("rpc token", rpc_token)] {
            if value.is_empty() {
                return Err(CallError::MissingField(name));
            }
        }
        Ok(ValidSetup {
            actor: validate(actor)?,
            endpoint: Endpoint {
                url: rpc_url.to_owned(),
                token: rpc_token.to_owned(),
            },
        })
    }
}

/// Setup values shown alongside every step.
#[derive(Clone, Debug, PartialEq)]
pub struct SetupInfo {
    pub actor: Address,
    pub owner: Address,
    pub endpoint: Endpoint,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkflowState {
    pub step: Step,
    pub setup: Option<SetupInfo>,
    pub candidates: Vec<Address>,
    pub winners: Vec<String>,
}

impl WorkflowState {
    pub fn configured(self, setup: SetupInfo) -> Self {
        Self {
            step: Step::CollectCandidates,
            setup: Some(setup),
            ..self
        }
    }

    pub fn candidates_added(self, candidates: Vec<Address>) -> Self {
        Self {
            step: Step::MarkReady,
            candidates,
            ..self
        }
    }

    pub fn marked_ready(self) -> Self {
        Self {
            step: Step::Draw,
            ..self
        }
    }

    pub fn winner_drawn(mut self, winner: String) -> Self {
        self.winners.push(winner);
        self
    }
}

/// Knobs for how calls are sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallOptions {
    pub confirmations: u64,
    /// Pause after a receipt before another call may start.
    pub grace: Duration,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            confirmations: CONFIRMATIONS,
            grace: Duration::from_millis(300),
        }
    }
}

/// Everything a call needs, fixed once setup completes.
pub struct Session<W: ?Sized> {
    pub actor: Address,
    pub owner: Address,
    pub invoker: Invoker<W>,
}

/// Clears the in-flight flag when dropped, whatever happened to the call.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, CallError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CallError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Workflow<W: ?Sized> {
    session: Session<W>,
    state: watch::Sender<WorkflowState>,
    in_flight: AtomicBool,
    grace: Duration,
}

impl<W: WalletRpc + ?Sized> Workflow<W> {
    /// Completes the setup step: resolves the owner from the wallet and
    /// moves on to collecting candidates.
    #[instrument(skip_all, fields(actor = %setup.actor, rpc = %setup.endpoint.url))]
    pub async fn connect(
        setup: ValidSetup,
        wallet: Arc<W>,
        options: CallOptions,
    ) -> Result<Self, CallError> {
        let owner = wallet
            .default_address()
            .await
            .map_err(CallError::OwnerResolution)?;
        info!(%owner, "owner address resolved");

        let info = SetupInfo {
            actor: setup.actor.clone(),
            owner: owner.clone(),
            endpoint: setup.endpoint,
        };
        let (state, _) = watch::channel(WorkflowState::default().configured(info));
        Ok(Self {
            session: Session {
                actor: setup.actor,
                owner,
                invoker: Invoker::with_confirmations(wallet, options.confirmations),
            },
            state,
            in_flight: AtomicBool::new(false),
            grace: options.grace,
        })
    }

    pub fn session(&self) -> &Session<W> {
        &self.session
    }

    pub fn state(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    /// Receives every state the workflow moves into.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Step 2: `input` is a comma separated list of candidate addresses.
    pub async fn add_candidates(&self, input: &str) -> Result<WorkflowState, CallError> {
        self.expect_step("add candidates", Step::CollectCandidates)?;
        let candidates = address::parse_list(input)?;
        let params = encoding::add_candidates(&candidates)?;
        self.call(Method::AddCandidates, Some(&params)).await?;
        info!(count = candidates.len(), "add candidates success");
        Ok(self.transition(|s| s.candidates_added(candidates)))
    }

    /// Step 3.
    pub async fn mark_ready(&self) -> Result<WorkflowState, CallError> {
        self.expect_step("set ready", Step::MarkReady)?;
        self.call(Method::SetReady, None).await?;
        info!("lucky draw is ready");
        Ok(self.transition(WorkflowState::marked_ready))
    }

    /// Step 4, repeatable. Returns the new winner along with the state.
    pub async fn draw(&self) -> Result<(String, WorkflowState), CallError> {
        self.expect_step("lucky draw", Step::Draw)?;
        let Decoded::Winner(winner) = self.call(Method::LuckyDraw, None).await? else {
            return Err(CallError::Decode {
                method: Method::LuckyDraw,
                reason: "expected a winner".into(),
            });
        };
        info!(%winner, "winner drawn");
        let state = self.transition(|s| s.winner_drawn(winner.clone()));
        Ok((winner, state))
    }

    /// Reads the actor's state summary. Never changes the step.
    pub async fn read_current_state(&self) -> Result<String, CallError> {
        match self.call(Method::ReadCurrentState, None).await? {
            Decoded::Text(text) => Ok(text),
            _ => Err(CallError::Decode {
                method: Method::ReadCurrentState,
                reason: "expected text".into(),
            }),
        }
    }

    fn expect_step(&self, operation: &'static str, expected: Step) -> Result<(), CallError> {
        let step = self.state.borrow().step;
        if step != expected {
            return Err(CallError::WrongStep { operation, step });
        }
        Ok(())
    }

    async fn call(
        &self,
        method: Method,
        params: Option<&EncodedEnvelope>,
    ) -> Result<Decoded, CallError> {
        let _guard = InFlight::acquire(&self.in_flight)?;
        let result = match self
            .session
            .invoker
            .invoke(&self.session.actor, &self.session.owner, method, params)
            .await
        {
            Ok(receipt) => receipt::interpret(&receipt, method),
            Err(err) => Err(err),
        };
        if !self.grace.is_zero() {
            tokio::time::sleep(self.grace).await;
        }
        result
    }

    fn transition(&self, f: impl FnOnce(WorkflowState) -> WorkflowState) -> WorkflowState {
        let next = f(self.state());
        info!(step = %next.step, "workflow step");
        self.state.send_replace(next.clone());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mock::{receipt, text_receipt, MockWallet, OWNER};
    use tokio::sync::Notify;

    const ACTOR: &str = "t01003";
    const SIX: &str = "f12zrfpwtuasimdmyuimdravhciaesljapklhd7ea,f13arowvbfjgdy3hqmzujfvknuxn2wts77l5ths3q,f13cp7xurexqvs33h2nh3d5ujzg4mwc4rtrvijw7q,f13tgop5lqasp3dbwxjizzkcol5du6avjqtgrvojy,f14tik37yu7gejv6ifo7r2n4pcaaoyqocd74xv2zq,f15am4vztyfiu3y4yiyhgawrkyz44lsxgvr3dzqmi";

    fn fields() -> SetupFields {
        SetupFields {
            actor: ACTOR.into(),
            rpc_url: "http://127.0.0.1:1234/rpc/v0".into(),
            rpc_token: "s3cr3t".into(),
        }
    }

    fn options() -> CallOptions {
        CallOptions {
            confirmations: 1,
            grace: Duration::ZERO,
        }
    }

    async fn connect(wallet: Arc<MockWallet>) -> Workflow<MockWallet> {
        Workflow::connect(fields().validate().unwrap(), wallet, options())
            .await
            .unwrap()
    }

    /// Drives a fresh workflow up to `step` with successful calls.
    async fn at_step(wallet: Arc<MockWallet>, step: Step) -> Workflow<MockWallet> {
        let wf = connect(wallet.clone()).await;
        if step == Step::CollectCandidates {
            return wf;
        }
        wallet.push_receipt(receipt(0, ""));
        wf.add_candidates(SIX).await.unwrap();
        if step == Step::MarkReady {
            return wf;
        }
        wallet.push_receipt(receipt(0, ""));
        wf.mark_ready().await.unwrap();
        wf
    }

    #[test]
    fn test_setup_validation() {
        let mut f = fields();
        f.rpc_token = "  ".into();
        assert!(matches!(f.validate(), Err(CallError::MissingField("rpc token"))));

        let mut f = fields();
        f.actor = "not-an-address".into();
        let err = f.validate().unwrap_err();
        assert!(matches!(err, CallError::InvalidAddress(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let setup = fields().validate().unwrap();
        assert_eq!(setup.actor.to_string(), ACTOR);
        assert!(!format!("{:?}", setup.endpoint).contains("s3cr3t"));
    }

    #[tokio::test]
    async fn test_setup_resolves_owner() {
        let wf = connect(Arc::new(MockWallet::new())).await;
        let state = wf.state();
        assert_eq!(state.step, Step::CollectCandidates);
        let setup = state.setup.unwrap();
        assert_eq!(setup.owner.to_string(), OWNER);
        assert_eq!(setup.actor.to_string(), ACTOR);
        assert_eq!(wf.session().owner.to_string(), OWNER);
    }

    #[tokio::test]
    async fn test_setup_owner_failure() {
        let res = Workflow::connect(
            fields().validate().unwrap(),
            Arc::new(MockWallet::without_owner()),
            options(),
        )
        .await;
        let err = res.err().unwrap();
        assert!(matches!(err, CallError::OwnerResolution(_)));
        assert_eq!(err.kind(), ErrorKind::Wallet);
    }

    #[tokio::test]
    async fn test_add_candidates_advances() {
        let wallet = Arc::new(MockWallet::new());
        let wf = connect(wallet.clone()).await;
        let mut rx = wf.subscribe();
        wallet.push_receipt(receipt(0, ""));

        let state = wf.add_candidates(SIX).await.unwrap();
        assert_eq!(state.step, Step::MarkReady);
        let got: Vec<String> = state.candidates.iter().map(|a| a.to_string()).collect();
        let want: Vec<&str> = SIX.split(',').collect();
        assert_eq!(got, want);

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().step, Step::MarkReady);

        let sent = wallet.created();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, 2);
        assert_eq!(
            encoding::decode_add_candidates(&sent[0].params, crate::address::Network::Mainnet)
                .unwrap(),
            state.candidates
        );
        assert!(!wf.is_busy());
    }

    #[tokio::test]
    async fn test_add_candidates_rejects_empty_input_locally() {
        let wallet = Arc::new(MockWallet::new());
        let wf = connect(wallet.clone()).await;

        let err = wf.add_candidates(" , ").await.unwrap_err();
        assert!(matches!(err, CallError::EmptyCandidates));
        let err = wf.add_candidates("f1bogus").await.unwrap_err();
        assert!(matches!(err, CallError::InvalidAddress(_)));

        assert!(wallet.created().is_empty());
        assert_eq!(wf.state().step, Step::CollectCandidates);
    }

    #[tokio::test]
    async fn test_add_candidates_rejected_stays() {
        let wallet = Arc::new(MockWallet::new());
        let wf = connect(wallet.clone()).await;
        wallet.push_receipt(receipt(16, "failed to unmarshal AddCandidatesParam"));

        let err = wf.add_candidates(SIX).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert_eq!(wf.state().step, Step::CollectCandidates);
        assert!(wf.state().candidates.is_empty());
        assert!(!wf.is_busy());
    }

    #[tokio::test]
    async fn test_mark_ready_rejected_surfaces_raw_return() {
        let wallet = Arc::new(MockWallet::new());
        let wf = at_step(wallet.clone(), Step::MarkReady).await;
        wallet.push_receipt(receipt(33, "ready invoked by non-owner actor"));

        match wf.mark_ready().await {
            Err(CallError::ActorCallRejected {
                exit_code,
                raw_return,
            }) => {
                assert_eq!(exit_code.value(), 33);
                assert_eq!(raw_return, "ready invoked by non-owner actor");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(wf.state().step, Step::MarkReady);

        // retry works
        wallet.push_receipt(receipt(0, ""));
        assert_eq!(wf.mark_ready().await.unwrap().step, Step::Draw);
    }

    #[tokio::test]
    async fn test_draw_is_repeatable() {
        let wallet = Arc::new(MockWallet::new());
        let wf = at_step(wallet.clone(), Step::Draw).await;

        wallet.push_receipt(text_receipt("\"f1xyz\""));
        let (winner, state) = wf.draw().await.unwrap();
        assert_eq!(winner, "f1xyz");
        assert_eq!(state.step, Step::Draw);

        wallet.push_receipt(receipt(16, "all winners have been drawn"));
        assert!(wf.draw().await.is_err());

        wallet.push_receipt(text_receipt(
            "Winner: \"f13arowvbfjgdy3hqmzujfvknuxn2wts77l5ths3q\"",
        ));
        let (_, state) = wf.draw().await.unwrap();
        assert_eq!(state.step, Step::Draw);
        assert_eq!(
            state.winners,
            vec!["f1xyz", "f13arowvbfjgdy3hqmzujfvknuxn2wts77l5ths3q"]
        );
    }

    #[tokio::test]
    async fn test_wrong_step() {
        let wallet = Arc::new(MockWallet::new());
        let wf = connect(wallet.clone()).await;
        assert!(matches!(
            wf.draw().await,
            Err(CallError::WrongStep {
                step: Step::CollectCandidates,
                ..
            })
        ));
        assert!(matches!(wf.mark_ready().await, Err(CallError::WrongStep { .. })));
        assert!(wallet.created().is_empty());
    }

    #[tokio::test]
    async fn test_read_current_state_keeps_step() {
        let summary = "Owner: 1001 | Ready: false | Finished: false | Winners: #[]";
        for step in [Step::CollectCandidates, Step::MarkReady, Step::Draw] {
            let wallet = Arc::new(MockWallet::new());
            let wf = at_step(wallet.clone(), step).await;
            wallet.push_receipt(text_receipt(summary));

            assert_eq!(wf.read_current_state().await.unwrap(), summary);
            assert_eq!(wf.state().step, step);
            assert_eq!(wallet.created().last().unwrap().method, 5);
        }
    }

    #[tokio::test]
    async fn test_second_call_is_busy() {
        let gate = Arc::new(Notify::new());
        let wallet = Arc::new(MockWallet::gated(gate.clone()));
        let wf = connect(wallet.clone()).await;
        wallet.push_receipt(receipt(0, ""));

        let (first, second) = tokio::join!(wf.add_candidates(SIX), async {
            let res = wf.read_current_state().await;
            gate.notify_one();
            res
        });
        assert!(matches!(second, Err(CallError::Busy)));
        assert_eq!(first.unwrap().step, Step::MarkReady);
        // the busy attempt never reached the wallet
        assert_eq!(wallet.created().len(), 1);
        assert!(!wf.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flag_cleared_when_call_dropped() {
        let gate = Arc::new(Notify::new());
        let wallet = Arc::new(MockWallet::gated(gate.clone()));
        let wf = connect(wallet.clone()).await;

        // the confirmation wait never returns, so the call is cut off mid flight
        let res = tokio::time::timeout(Duration::from_millis(10), wf.add_candidates(SIX)).await;
        assert!(res.is_err());
        assert_eq!(wallet.waited().len(), 1);
        assert!(!wf.is_busy());
        assert_eq!(wf.state().step, Step::CollectCandidates);

        wallet.push_receipt(receipt(0, ""));
        gate.notify_one();
        let state = wf.add_candidates(SIX).await.unwrap();
        assert_eq!(state.step, Step::MarkReady);
        assert_eq!(wallet.created().len(), 2);
    }

    #[tokio::test]
    async fn test_flag_cleared_on_failure() {
        let wallet = Arc::new(MockWallet::new());
        let wf = connect(wallet.clone()).await;
        wallet.fail_at(crate::error::Stage::Submit);

        let err = wf.add_candidates(SIX).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Submission);
        assert!(!wf.is_busy());
        assert_eq!(wf.state().step, Step::CollectCandidates);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_delay_holds_flag() {
        let wallet = Arc::new(MockWallet::new());
        let wf = Workflow::connect(
            fields().validate().unwrap(),
            wallet.clone(),
            CallOptions {
                confirmations: 1,
                grace: Duration::from_millis(300),
            },
        )
        .await
        .unwrap();
        wallet.push_receipt(receipt(0, ""));

        let start = tokio::time::Instant::now();
        wf.add_candidates(SIX).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(!wf.is_busy());
    }
}
