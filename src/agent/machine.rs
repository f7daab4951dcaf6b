//! Agent payment state machine
//!
//! [`AgentSession`] owns every piece of per-attempt state and changes only
//! through [`AgentSession::apply`]. `apply` is synchronous: it validates the
//! event against the current state, mutates the session, writes the activity
//! log and returns the [`Effect`]s the runtime must perform. Results of those
//! effects come back later as new events, tagged with the request id,
//! reference token or transaction hash they belong to, so completions that
//! outlived a reset are recognised and dropped.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::agent::{ActivityKind, ActivityLog, AgentState, ModeGate, TransactionMode};
use crate::catalog::ServiceDescriptor;
use crate::payment::{
    ConfirmationOutcome, PaymentDescriptor, PaymentProof, PaymentRejection, RejectionKind,
    TokenAmount, TransferRequest,
};
use crate::wallet::WalletSnapshot;

/// Inputs to the state machine: user actions and collaborator completions
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    SelectService(ServiceDescriptor),
    RequestService,
    QuoteReceived {
        request_id: u64,
        descriptor: PaymentDescriptor,
    },
    QuoteFailed {
        request_id: u64,
        reason: String,
    },
    ApprovePayment,
    ApprovalAcknowledged {
        reference: String,
    },
    PaymentSubmitted {
        reference: String,
        tx_hash: String,
    },
    PaymentRejected {
        reference: String,
        rejection: PaymentRejection,
    },
    PaymentFinalized {
        tx_hash: String,
        outcome: ConfirmationOutcome,
    },
    Unlocked {
        reference: String,
        data: Value,
    },
    UnlockFailed {
        reference: String,
        reason: String,
    },
    Reset,
}

/// Work the runtime performs on behalf of the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RequestQuote {
        request_id: u64,
        service: ServiceDescriptor,
    },
    /// Wait out the approval acknowledgment delay
    AcknowledgeApproval { reference: String },
    SendPayment {
        reference: String,
        transfer: TransferRequest,
    },
    WatchConfirmation { tx_hash: String },
    VerifyAndUnlock {
        reference: String,
        service_id: String,
        proof: PaymentProof,
    },
    /// One extra balance refresh shortly after a payment settles
    RefreshBalance,
}

/// Outcome of applying one event
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: AgentState,
    pub to: AgentState,
    /// False when the event was not legal in the current state and was dropped
    pub accepted: bool,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn ignored(state: AgentState) -> Self {
        Self {
            from: state,
            to: state,
            accepted: false,
            effects: Vec::new(),
        }
    }
}

/// Serializable view of the session for display and reporting
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub state: AgentState,
    pub service: Option<ServiceDescriptor>,
    pub payment: Option<PaymentDescriptor>,
    pub tx_hash: Option<String>,
    pub pending_amount: Option<TokenAmount>,
    pub service_data: Option<Value>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AgentSession {
    state: AgentState,
    selected_service: Option<ServiceDescriptor>,
    payment: Option<PaymentDescriptor>,
    tx_hash: Option<String>,
    pending_amount: Option<TokenAmount>,
    service_data: Option<Value>,
    last_error: Option<String>,
    request_seq: u64,
    mode_gate: ModeGate,
    activity: ActivityLog,
}

impl AgentSession {
    pub fn new(designated_chain_id: u64, activity_capacity: usize) -> Self {
        Self {
            state: AgentState::Idle,
            selected_service: None,
            payment: None,
            tx_hash: None,
            pending_amount: None,
            service_data: None,
            last_error: None,
            request_seq: 0,
            mode_gate: ModeGate::new(designated_chain_id),
            activity: ActivityLog::new(activity_capacity),
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn selected_service(&self) -> Option<&ServiceDescriptor> {
        self.selected_service.as_ref()
    }

    pub fn payment(&self) -> Option<&PaymentDescriptor> {
        self.payment.as_ref()
    }

    pub fn tx_hash(&self) -> Option<&str> {
        self.tx_hash.as_deref()
    }

    pub fn pending_amount(&self) -> Option<TokenAmount> {
        self.pending_amount
    }

    pub fn service_data(&self) -> Option<&Value> {
        self.service_data.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn designated_chain_id(&self) -> u64 {
        self.mode_gate.designated_chain_id()
    }

    pub fn mode_for(&self, wallet: &WalletSnapshot) -> TransactionMode {
        self.mode_gate.mode_for(wallet)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            state: self.state,
            service: self.selected_service.clone(),
            payment: self.payment.clone(),
            tx_hash: self.tx_hash.clone(),
            pending_amount: self.pending_amount,
            service_data: self.service_data.clone(),
            last_error: self.last_error.clone(),
        }
    }

    /// Note a new wallet snapshot. Logs mode changes, never changes state.
    pub fn observe_wallet(&mut self, wallet: &WalletSnapshot) -> TransactionMode {
        self.mode_gate.observe(wallet, &mut self.activity)
    }

    /// Append an externally observed event that is not a state transition
    pub fn note(&mut self, kind: ActivityKind, message: impl Into<String>, details: Option<Value>) {
        self.activity.append(kind, message, details);
    }

    pub fn apply(&mut self, event: AgentEvent, wallet: &WalletSnapshot) -> Transition {
        let from = self.state;
        let outcome = match event {
            AgentEvent::SelectService(service) => self.on_select(service),
            AgentEvent::RequestService => self.on_request(wallet),
            AgentEvent::QuoteReceived {
                request_id,
                descriptor,
            } => self.on_quote(request_id, descriptor),
            AgentEvent::QuoteFailed { request_id, reason } => {
                self.on_quote_failed(request_id, reason)
            }
            AgentEvent::ApprovePayment => self.on_approve(wallet),
            AgentEvent::ApprovalAcknowledged { reference } => {
                self.on_acknowledged(&reference, wallet)
            }
            AgentEvent::PaymentSubmitted { reference, tx_hash } => {
                self.on_submitted(&reference, tx_hash)
            }
            AgentEvent::PaymentRejected {
                reference,
                rejection,
            } => self.on_rejected(&reference, rejection),
            AgentEvent::PaymentFinalized { tx_hash, outcome } => {
                self.on_finalized(&tx_hash, outcome)
            }
            AgentEvent::Unlocked { reference, data } => self.on_unlocked(&reference, data),
            AgentEvent::UnlockFailed { reference, reason } => {
                self.on_unlock_failed(&reference, reason)
            }
            AgentEvent::Reset => self.on_reset(),
        };

        match outcome {
            Some(effects) => {
                if from != self.state {
                    info!(from = %from, to = %self.state, "Agent state changed");
                }
                Transition {
                    from,
                    to: self.state,
                    accepted: true,
                    effects,
                }
            }
            None => Transition::ignored(from),
        }
    }

    // -------------------------------------------------------------------------
    // Handlers. `None` means the event was dropped without side effects.
    // -------------------------------------------------------------------------

    fn on_select(&mut self, service: ServiceDescriptor) -> Option<Vec<Effect>> {
        if self.state.is_processing() {
            debug!(service = %service.id, state = %self.state, "Service selection ignored while busy");
            return None;
        }
        self.selected_service = Some(service);
        Some(Vec::new())
    }

    fn on_request(&mut self, wallet: &WalletSnapshot) -> Option<Vec<Effect>> {
        if self.state.is_processing() {
            warn!(state = %self.state, "Service request ignored, another request is in flight");
            return None;
        }
        if self.state.is_terminal() {
            debug!(state = %self.state, "Service request ignored until the agent is reset");
            return None;
        }
        let Some(service) = self.selected_service.clone() else {
            self.fail("No service selected", None);
            return Some(Vec::new());
        };
        if !wallet.is_connected() {
            self.fail("Wallet not connected", Some(json!({ "service": service.id })));
            return Some(Vec::new());
        }

        self.clear_attempt();
        self.request_seq += 1;
        self.state = AgentState::Requesting;
        self.activity.append(
            ActivityKind::Request,
            format!("Requesting service: {}", service.name),
            Some(json!({ "service": service.id, "price": service.price })),
        );

        Some(vec![Effect::RequestQuote {
            request_id: self.request_seq,
            service,
        }])
    }

    fn on_quote(&mut self, request_id: u64, descriptor: PaymentDescriptor) -> Option<Vec<Effect>> {
        if self.state != AgentState::Requesting || request_id != self.request_seq {
            debug!(request_id, current = self.request_seq, "Dropping stale 402 response");
            return None;
        }

        self.activity.append(
            ActivityKind::Request,
            "HTTP 402 Payment Required received",
            Some(json!({
                "amount": descriptor.payment.amount,
                "reference": descriptor.payment.reference,
            })),
        );
        self.payment = Some(descriptor);
        self.state = AgentState::PaymentRequired;
        Some(Vec::new())
    }

    fn on_quote_failed(&mut self, request_id: u64, reason: String) -> Option<Vec<Effect>> {
        if self.state != AgentState::Requesting || request_id != self.request_seq {
            debug!(request_id, "Dropping stale service request failure");
            return None;
        }
        self.fail("Service request failed", Some(json!({ "error": reason })));
        Some(Vec::new())
    }

    fn on_approve(&mut self, wallet: &WalletSnapshot) -> Option<Vec<Effect>> {
        if self.state != AgentState::PaymentRequired {
            warn!(state = %self.state, "Payment approval ignored");
            return None;
        }
        let descriptor = self.payment.clone()?;
        let required = descriptor.payment.amount;

        let balance = wallet.balance_or_zero();
        if balance < required {
            let shortfall = balance.shortfall(&required);
            self.fail(
                "Insufficient USDC balance",
                Some(json!({
                    "required": required,
                    "balance": balance,
                    "shortfall": shortfall,
                })),
            );
            return Some(Vec::new());
        }

        if !wallet.is_on_chain(descriptor.payment.chain_id) {
            self.fail(
                format!("Wrong network - switch to {}", descriptor.payment.chain),
                Some(json!({
                    "expected": descriptor.payment.chain_id,
                    "connected": wallet.chain_id,
                })),
            );
            return Some(Vec::new());
        }

        self.pending_amount = Some(required);
        self.state = AgentState::ApprovingPayment;
        self.activity.append(
            ActivityKind::Payment,
            "Payment approved - agent executing transaction...",
            None,
        );

        Some(vec![Effect::AcknowledgeApproval {
            reference: descriptor.payment.reference,
        }])
    }

    fn on_acknowledged(&mut self, reference: &str, wallet: &WalletSnapshot) -> Option<Vec<Effect>> {
        if self.state != AgentState::ApprovingPayment || !self.is_current_reference(reference) {
            debug!(reference, "Dropping stale approval acknowledgment");
            return None;
        }
        let descriptor = self.payment.clone()?;
        let mode = self.mode_gate.mode_for(wallet);

        self.state = AgentState::ProcessingPayment;
        self.activity.append(
            ActivityKind::Payment,
            format!(
                "Sending {} {} to service provider",
                descriptor.payment.amount, descriptor.payment.currency
            ),
            Some(json!({ "recipient": descriptor.payment.recipient, "mode": mode })),
        );

        Some(vec![Effect::SendPayment {
            reference: descriptor.payment.reference.clone(),
            transfer: TransferRequest {
                recipient: descriptor.payment.recipient,
                amount: descriptor.payment.amount,
                chain_id: descriptor.payment.chain_id,
                mode,
            },
        }])
    }

    fn on_submitted(&mut self, reference: &str, tx_hash: String) -> Option<Vec<Effect>> {
        if self.state != AgentState::ProcessingPayment
            || !self.is_current_reference(reference)
            || self.tx_hash.is_some()
        {
            warn!(reference, %tx_hash, "Ignoring submission for a payment that is no longer pending");
            return None;
        }

        let chain = self
            .payment
            .as_ref()
            .map(|d| d.payment.chain.clone())
            .unwrap_or_default();
        self.activity.append(
            ActivityKind::Payment,
            format!("Transaction submitted to {}", chain),
            Some(json!({ "tx_hash": tx_hash })),
        );
        self.tx_hash = Some(tx_hash.clone());

        Some(vec![Effect::WatchConfirmation { tx_hash }])
    }

    fn on_rejected(&mut self, reference: &str, rejection: PaymentRejection) -> Option<Vec<Effect>> {
        let in_flight = matches!(
            self.state,
            AgentState::ApprovingPayment | AgentState::ProcessingPayment
        );
        if !in_flight || !self.is_current_reference(reference) || self.tx_hash.is_some() {
            debug!(reference, "Dropping stale payment rejection");
            return None;
        }

        let (kind, message) = match rejection.kind {
            RejectionKind::UserDeclined => (
                ActivityKind::Declined,
                "Payment declined in wallet - approve again to retry",
            ),
            RejectionKind::InsufficientFunds => (
                ActivityKind::Error,
                "Payment rejected: insufficient funds for transfer",
            ),
            RejectionKind::Other => (ActivityKind::Error, "Payment transaction failed"),
        };
        self.activity.append(
            kind,
            message,
            Some(json!({ "reason": rejection.kind, "error": rejection.message })),
        );

        // Not terminal: the 402 terms are still valid and the user may retry
        self.pending_amount = None;
        self.state = AgentState::PaymentRequired;
        Some(Vec::new())
    }

    fn on_finalized(&mut self, tx_hash: &str, outcome: ConfirmationOutcome) -> Option<Vec<Effect>> {
        let tracked = self.tx_hash.as_deref() == Some(tx_hash);
        if self.state != AgentState::ProcessingPayment || self.payment.is_none() || !tracked {
            debug!(tx_hash, "Dropping confirmation for an untracked transaction");
            return None;
        }
        let descriptor = self.payment.clone()?;
        self.pending_amount = None;

        match outcome {
            ConfirmationOutcome::Succeeded => {
                self.state = AgentState::Verifying;
                self.activity.append(
                    ActivityKind::Payment,
                    "Payment confirmed on-chain - verifying...",
                    Some(json!({ "tx_hash": tx_hash })),
                );
                let proof = PaymentProof::for_descriptor(&descriptor, tx_hash);
                Some(vec![
                    Effect::VerifyAndUnlock {
                        reference: descriptor.payment.reference.clone(),
                        service_id: descriptor.service.id.clone(),
                        proof,
                    },
                    Effect::RefreshBalance,
                ])
            }
            ConfirmationOutcome::Reverted => {
                self.fail(
                    "Payment transaction reverted",
                    Some(json!({ "tx_hash": tx_hash })),
                );
                Some(vec![Effect::RefreshBalance])
            }
            ConfirmationOutcome::Failed { reason } => {
                self.fail(
                    "Payment confirmation failed",
                    Some(json!({ "tx_hash": tx_hash, "error": reason })),
                );
                Some(Vec::new())
            }
        }
    }

    fn on_unlocked(&mut self, reference: &str, data: Value) -> Option<Vec<Effect>> {
        if self.state != AgentState::Verifying || !self.is_current_reference(reference) {
            debug!(reference, "Dropping stale unlock result");
            return None;
        }
        let name = self
            .payment
            .as_ref()
            .map(|d| d.service.name.clone())
            .unwrap_or_default();

        self.activity.append(
            ActivityKind::Unlock,
            format!("Service unlocked: {}", name),
            Some(data.clone()),
        );
        self.service_data = Some(data);
        self.state = AgentState::Success;
        Some(Vec::new())
    }

    fn on_unlock_failed(&mut self, reference: &str, reason: String) -> Option<Vec<Effect>> {
        if self.state != AgentState::Verifying || !self.is_current_reference(reference) {
            debug!(reference, "Dropping stale unlock failure");
            return None;
        }
        self.fail("Payment verification failed", Some(json!({ "error": reason })));
        Some(Vec::new())
    }

    fn on_reset(&mut self) -> Option<Vec<Effect>> {
        if self.is_pristine() {
            return Some(Vec::new());
        }
        if self.state.is_processing() {
            warn!(state = %self.state, "Reset while a collaborator call is in flight; its result will be dropped");
        }

        self.clear_attempt();
        self.selected_service = None;
        // Invalidates any quote still on its way
        self.request_seq += 1;
        self.state = AgentState::Idle;
        self.activity
            .append(ActivityKind::Request, "Demo reset - ready for new request", None);
        Some(Vec::new())
    }

    // -------------------------------------------------------------------------

    fn fail(&mut self, message: impl Into<String>, details: Option<Value>) {
        let message = message.into();
        self.pending_amount = None;
        self.last_error = Some(message.clone());
        self.state = AgentState::Error;
        self.activity.append(ActivityKind::Error, message, details);
    }

    fn clear_attempt(&mut self) {
        self.payment = None;
        self.tx_hash = None;
        self.pending_amount = None;
        self.service_data = None;
        self.last_error = None;
    }

    fn is_current_reference(&self, reference: &str) -> bool {
        self.payment
            .as_ref()
            .map(|d| d.payment.reference == reference)
            .unwrap_or(false)
    }

    fn is_pristine(&self) -> bool {
        self.state == AgentState::Idle
            && self.selected_service.is_none()
            && self.payment.is_none()
            && self.tx_hash.is_none()
            && self.pending_amount.is_none()
            && self.service_data.is_none()
            && self.last_error.is_none()
    }
}
