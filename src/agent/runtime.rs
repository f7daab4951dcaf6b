//! Agent runtime
//!
//! Bridges the synchronous [`AgentSession`] to the async collaborators. Each
//! [`Effect`] runs as its own tokio task and reports back with exactly one
//! [`AgentEvent`] on an internal channel; the runtime feeds those events into
//! the session in arrival order, so the session is only ever mutated from the
//! task that owns the runtime.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::agent::{ActivityKind, AgentEvent, AgentSession, Effect, Transition, TransactionMode};
use crate::catalog::ServiceDescriptor;
use crate::config::AgentConfig;
use crate::payment::{PaymentExecutor, ServiceGateway, ServiceRequest};
use crate::wallet::{BalanceRefresher, WalletSnapshot};

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub approval_delay: Duration,
    pub post_payment_refresh_delay: Duration,
    pub provider_address: String,
}

impl RuntimeSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            approval_delay: config.approval_delay(),
            post_payment_refresh_delay: config.post_payment_refresh_delay(),
            provider_address: config.provider_address.clone(),
        }
    }
}

pub struct AgentRuntime {
    session: AgentSession,
    wallet_rx: watch::Receiver<WalletSnapshot>,
    refresher: BalanceRefresher,
    gateway: Arc<dyn ServiceGateway>,
    executor: Arc<dyn PaymentExecutor>,
    settings: RuntimeSettings,
    events_tx: mpsc::UnboundedSender<AgentEvent>,
    events_rx: mpsc::UnboundedReceiver<AgentEvent>,
    /// Spawned effect tasks whose event has not been received yet
    outstanding: usize,
}

impl AgentRuntime {
    pub fn new(
        session: AgentSession,
        wallet_rx: watch::Receiver<WalletSnapshot>,
        refresher: BalanceRefresher,
        gateway: Arc<dyn ServiceGateway>,
        executor: Arc<dyn PaymentExecutor>,
        settings: RuntimeSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            session,
            wallet_rx,
            refresher,
            gateway,
            executor,
            settings,
            events_tx,
            events_rx,
            outstanding: 0,
        }
    }

    pub fn session(&self) -> &AgentSession {
        &self.session
    }

    /// Latest published wallet snapshot
    pub fn wallet(&self) -> WalletSnapshot {
        self.wallet_rx.borrow().clone()
    }

    pub fn mode(&self) -> TransactionMode {
        self.session.mode_for(&self.wallet_rx.borrow())
    }

    pub fn refresher(&self) -> BalanceRefresher {
        self.refresher.clone()
    }

    /// True while any effect task is still running
    pub fn is_busy(&self) -> bool {
        self.outstanding > 0
    }

    /// Pick up the latest wallet snapshot if it changed since the last call
    pub fn observe_wallet(&mut self) -> Option<TransactionMode> {
        if !self.wallet_rx.has_changed().unwrap_or(false) {
            return None;
        }
        let snapshot = self.wallet_rx.borrow_and_update().clone();
        Some(self.session.observe_wallet(&snapshot))
    }

    /// Record a wallet or network event that is not a state transition
    pub fn note(&mut self, kind: ActivityKind, message: impl Into<String>, details: Option<Value>) {
        self.session.note(kind, message, details);
    }

    pub fn select_service(&mut self, service: ServiceDescriptor) -> Transition {
        self.dispatch(AgentEvent::SelectService(service))
    }

    pub fn request_service(&mut self) -> Transition {
        self.dispatch(AgentEvent::RequestService)
    }

    pub fn approve_payment(&mut self) -> Transition {
        self.dispatch(AgentEvent::ApprovePayment)
    }

    pub fn reset(&mut self) -> Transition {
        self.dispatch(AgentEvent::Reset)
    }

    /// Apply an event against the current wallet snapshot and start the
    /// resulting effects
    pub fn dispatch(&mut self, event: AgentEvent) -> Transition {
        let snapshot = self.wallet_rx.borrow().clone();
        let transition = self.session.apply(event, &snapshot);
        for effect in transition.effects.iter().cloned() {
            self.execute(effect);
        }
        transition
    }

    /// Apply every completion that has already arrived, without waiting
    pub fn poll_events(&mut self) -> Vec<Transition> {
        let mut transitions = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            self.outstanding = self.outstanding.saturating_sub(1);
            transitions.push(self.dispatch(event));
        }
        transitions
    }

    /// Wait for the next completion and apply it. `None` once nothing is in
    /// flight.
    pub async fn next_event(&mut self) -> Option<Transition> {
        if self.outstanding == 0 {
            return None;
        }
        let event = self.events_rx.recv().await?;
        self.outstanding -= 1;
        Some(self.dispatch(event))
    }

    /// Drive completions until no effect task is left
    pub async fn run_until_settled(&mut self) -> Vec<Transition> {
        let mut transitions = Vec::new();
        while let Some(transition) = self.next_event().await {
            transitions.push(transition);
        }
        transitions
    }

    fn execute(&mut self, effect: Effect) {
        debug!(?effect, "Executing effect");
        match effect {
            Effect::RequestQuote {
                request_id,
                service,
            } => {
                let gateway = self.gateway.clone();
                let request = ServiceRequest {
                    service_id: service.id,
                    service_name: service.name,
                    endpoint: service.endpoint,
                    price: service.price,
                    provider_address: self.settings.provider_address.clone(),
                };
                self.spawn(async move {
                    match gateway.request_service(&request).await {
                        Ok(descriptor) => AgentEvent::QuoteReceived {
                            request_id,
                            descriptor,
                        },
                        Err(e) => AgentEvent::QuoteFailed {
                            request_id,
                            reason: e.to_string(),
                        },
                    }
                });
            }
            Effect::AcknowledgeApproval { reference } => {
                let delay = self.settings.approval_delay;
                self.spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    AgentEvent::ApprovalAcknowledged { reference }
                });
            }
            Effect::SendPayment {
                reference,
                transfer,
            } => {
                let executor = self.executor.clone();
                self.spawn(async move {
                    match executor.send(&transfer).await {
                        Ok(tx_hash) => {
                            info!(%tx_hash, amount = %transfer.amount, mode = %transfer.mode, "Transfer submitted");
                            AgentEvent::PaymentSubmitted { reference, tx_hash }
                        }
                        Err(rejection) => AgentEvent::PaymentRejected {
                            reference,
                            rejection,
                        },
                    }
                });
            }
            Effect::WatchConfirmation { tx_hash } => {
                let executor = self.executor.clone();
                self.spawn(async move {
                    let outcome = executor.confirm(&tx_hash).await;
                    AgentEvent::PaymentFinalized { tx_hash, outcome }
                });
            }
            Effect::VerifyAndUnlock {
                reference,
                service_id,
                proof,
            } => {
                let gateway = self.gateway.clone();
                self.spawn(async move {
                    match gateway.verify_and_unlock(&proof, &service_id).await {
                        Ok(response) if response.success => AgentEvent::Unlocked {
                            reference,
                            data: response.data.unwrap_or(Value::Null),
                        },
                        Ok(response) => AgentEvent::UnlockFailed {
                            reference,
                            reason: response
                                .error
                                .unwrap_or_else(|| "payment proof rejected".to_string()),
                        },
                        Err(e) => AgentEvent::UnlockFailed {
                            reference,
                            reason: e.to_string(),
                        },
                    }
                });
            }
            Effect::RefreshBalance => {
                self.refresher
                    .refresh_after(self.settings.post_payment_refresh_delay);
            }
        }
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: std::future::Future<Output = AgentEvent> + Send + 'static,
    {
        self.outstanding += 1;
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let event = task.await;
            // The runtime holds the receiver for its whole life
            let _ = events_tx.send(event);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentState;
    use crate::catalog;
    use crate::payment::{
        ConfirmationOutcome, MockServiceGateway, PaymentDescriptor, PaymentProof, PaymentRejection,
        TokenAmount, TransferRequest, UnlockResponse,
    };
    use crate::types::{AppError, AppResult};
    use crate::wallet::{BalanceOracle, SimulatedWallet, WalletControl};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    const ARC: u64 = 5042002;

    fn amount(value: &str) -> TokenAmount {
        TokenAmount::parse(value).unwrap()
    }

    fn settings() -> RuntimeSettings {
        RuntimeSettings {
            approval_delay: Duration::ZERO,
            post_payment_refresh_delay: Duration::ZERO,
            provider_address: "0xprovider".to_string(),
        }
    }

    /// Counts calls and optionally holds them until released
    struct CountingExecutor {
        inner: SimulatedWallet,
        sends: AtomicUsize,
        confirms: AtomicUsize,
        release: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl PaymentExecutor for CountingExecutor {
        async fn send(&self, transfer: &TransferRequest) -> Result<String, PaymentRejection> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            self.inner.send(transfer).await
        }

        async fn confirm(&self, tx_hash: &str) -> ConfirmationOutcome {
            self.confirms.fetch_add(1, Ordering::SeqCst);
            if let Some(release) = &self.release {
                release.notified().await;
            }
            self.inner.confirm(tx_hash).await
        }
    }

    struct CountingGateway {
        inner: MockServiceGateway,
        unlocks: AtomicUsize,
        fail_requests: bool,
    }

    #[async_trait]
    impl ServiceGateway for CountingGateway {
        async fn request_service(&self, request: &ServiceRequest) -> AppResult<PaymentDescriptor> {
            if self.fail_requests {
                return Err(AppError::Gateway("service unavailable".to_string()));
            }
            self.inner.request_service(request).await
        }

        async fn verify_and_unlock(
            &self,
            proof: &PaymentProof,
            service_id: &str,
        ) -> AppResult<UnlockResponse> {
            self.unlocks.fetch_add(1, Ordering::SeqCst);
            self.inner.verify_and_unlock(proof, service_id).await
        }
    }

    struct Harness {
        runtime: AgentRuntime,
        executor: Arc<CountingExecutor>,
        gateway: Arc<CountingGateway>,
        wallet_tx: watch::Sender<WalletSnapshot>,
    }

    async fn harness(balance: &str, release: Option<Arc<Notify>>, fail_requests: bool) -> Harness {
        let wallet = SimulatedWallet::new("0xpayer", ARC, amount(balance));
        wallet.connect().await.unwrap();
        let snapshot = wallet.read().await.unwrap();
        let (wallet_tx, wallet_rx) = watch::channel(snapshot);

        let executor = Arc::new(CountingExecutor {
            inner: wallet,
            sends: AtomicUsize::new(0),
            confirms: AtomicUsize::new(0),
            release,
        });
        let gateway = Arc::new(CountingGateway {
            inner: MockServiceGateway::new(ARC, "Arc Testnet"),
            unlocks: AtomicUsize::new(0),
            fail_requests,
        });

        let runtime = AgentRuntime::new(
            AgentSession::new(ARC, 20),
            wallet_rx,
            BalanceRefresher::default(),
            gateway.clone(),
            executor.clone(),
            settings(),
        );
        Harness {
            runtime,
            executor,
            gateway,
            wallet_tx,
        }
    }

    fn select(runtime: &mut AgentRuntime, id: &str) {
        let service = catalog::find_service(id).unwrap();
        runtime.select_service(service);
    }

    #[tokio::test]
    async fn test_full_flow_unlocks_service() {
        let mut h = harness("1.00", None, false).await;
        select(&mut h.runtime, "data-analysis");

        h.runtime.request_service();
        h.runtime.run_until_settled().await;
        assert_eq!(h.runtime.session().state(), AgentState::PaymentRequired);

        h.runtime.approve_payment();
        h.runtime.run_until_settled().await;

        let session = h.runtime.session();
        assert_eq!(session.state(), AgentState::Success);
        assert!(session.tx_hash().unwrap().starts_with("0x"));
        assert_eq!(session.service_data().unwrap()["service_id"], "data-analysis");
        assert_eq!(h.executor.sends.load(Ordering::SeqCst), 1);
        assert_eq!(h.executor.confirms.load(Ordering::SeqCst), 1);
        assert_eq!(h.gateway.unlocks.load(Ordering::SeqCst), 1);
        assert!(!h.runtime.is_busy());
    }

    #[tokio::test]
    async fn test_insufficient_balance_makes_no_executor_call() {
        let mut h = harness("0.00", None, false).await;
        select(&mut h.runtime, "data-analysis");
        h.runtime.request_service();
        h.runtime.run_until_settled().await;

        h.runtime.approve_payment();
        h.runtime.run_until_settled().await;

        assert_eq!(h.runtime.session().state(), AgentState::Error);
        assert_eq!(h.executor.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_double_approve_sends_once() {
        let mut h = harness("1.00", None, false).await;
        select(&mut h.runtime, "gpt4-api");
        h.runtime.request_service();
        h.runtime.run_until_settled().await;

        let first = h.runtime.approve_payment();
        let second = h.runtime.approve_payment();
        assert!(first.accepted);
        assert!(!second.accepted);

        h.runtime.run_until_settled().await;
        assert_eq!(h.runtime.session().state(), AgentState::Success);
        assert_eq!(h.executor.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_declined_transfer_allows_retry() {
        let mut h = harness("1.00", None, false).await;
        h.executor.inner.decline_next_transfer().await;
        select(&mut h.runtime, "code-review");
        h.runtime.request_service();
        h.runtime.run_until_settled().await;

        h.runtime.approve_payment();
        h.runtime.run_until_settled().await;
        assert_eq!(h.runtime.session().state(), AgentState::PaymentRequired);
        assert_eq!(
            h.runtime.session().activity().latest().unwrap().kind,
            ActivityKind::Declined
        );

        h.runtime.approve_payment();
        h.runtime.run_until_settled().await;
        assert_eq!(h.runtime.session().state(), AgentState::Success);
        assert_eq!(h.executor.sends.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gateway_failure_goes_to_error() {
        let mut h = harness("1.00", None, true).await;
        select(&mut h.runtime, "image-gen");
        h.runtime.request_service();
        h.runtime.run_until_settled().await;

        let session = h.runtime.session();
        assert_eq!(session.state(), AgentState::Error);
        assert_eq!(session.last_error(), Some("Service request failed"));
    }

    #[tokio::test]
    async fn test_reset_during_confirmation_drops_late_result() {
        let release = Arc::new(Notify::new());
        let mut h = harness("1.00", Some(release.clone()), false).await;
        select(&mut h.runtime, "data-analysis");
        h.runtime.request_service();
        h.runtime.run_until_settled().await;

        h.runtime.approve_payment();
        // Acknowledgment, then submission; confirmation stays parked
        while h.runtime.session().tx_hash().is_none() {
            h.runtime.next_event().await.unwrap();
        }
        assert!(h.runtime.is_busy());

        h.runtime.reset();
        let logged = h.runtime.session().activity().len();
        release.notify_one();

        let late = h.runtime.run_until_settled().await;
        assert_eq!(late.len(), 1);
        assert!(!late[0].accepted);

        let session = h.runtime.session();
        assert_eq!(session.state(), AgentState::Idle);
        assert!(session.tx_hash().is_none());
        assert_eq!(session.activity().len(), logged);
        assert_eq!(h.gateway.unlocks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_observe_wallet_only_on_change() {
        let mut h = harness("1.00", None, false).await;
        assert!(h.runtime.observe_wallet().is_none());

        h.wallet_tx
            .send(WalletSnapshot::connected("0xpayer", ARC, amount("0.00")))
            .unwrap();
        assert_eq!(h.runtime.observe_wallet(), Some(TransactionMode::Simulation));
        assert_eq!(h.runtime.mode(), TransactionMode::Simulation);
        assert_eq!(h.runtime.session().state(), AgentState::Idle);
    }
}
