use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the agent is in the pay-to-unlock protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentState {
    #[default]
    Idle,
    Requesting,
    PaymentRequired,
    ApprovingPayment,
    ProcessingPayment,
    Verifying,
    Success,
    Error,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::Requesting => "requesting",
            AgentState::PaymentRequired => "payment-required",
            AgentState::ApprovingPayment => "approving-payment",
            AgentState::ProcessingPayment => "processing-payment",
            AgentState::Verifying => "verifying",
            AgentState::Success => "success",
            AgentState::Error => "error",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgentState::Idle => "Idle",
            AgentState::Requesting => "Requesting Service",
            AgentState::PaymentRequired => "Payment Required",
            AgentState::ApprovingPayment => "Awaiting Approval",
            AgentState::ProcessingPayment => "Processing Payment",
            AgentState::Verifying => "Verifying Payment",
            AgentState::Success => "Success",
            AgentState::Error => "Error",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentState::Idle => "Agent is ready to process requests",
            AgentState::Requesting => "Sending request to service provider...",
            AgentState::PaymentRequired => "HTTP 402 received - payment needed to proceed",
            AgentState::ApprovingPayment => "Waiting for payment approval...",
            AgentState::ProcessingPayment => "Sending USDC payment...",
            AgentState::Verifying => "Confirming transaction and unlocking service...",
            AgentState::Success => "Service unlocked and data received",
            AgentState::Error => "Something went wrong - reset to try again",
        }
    }

    /// A collaborator call is outstanding; user actions are disabled
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            AgentState::Requesting
                | AgentState::ApprovingPayment
                | AgentState::ProcessingPayment
                | AgentState::Verifying
        )
    }

    /// Only `reset` leaves these
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Success | AgentState::Error)
    }

    /// Position in the four-step payment flow, if the state belongs to one
    pub fn flow_step(&self) -> Option<FlowStep> {
        match self {
            AgentState::Requesting => Some(FlowStep::RequestService),
            AgentState::PaymentRequired => Some(FlowStep::PaymentRequired),
            AgentState::ApprovingPayment | AgentState::ProcessingPayment => {
                Some(FlowStep::SendPayment)
            }
            AgentState::Verifying | AgentState::Success => Some(FlowStep::VerifyAndUnlock),
            AgentState::Idle | AgentState::Error => None,
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four visible steps of the HTTP 402 flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlowStep {
    RequestService,
    PaymentRequired,
    SendPayment,
    VerifyAndUnlock,
}

impl FlowStep {
    pub const ALL: [FlowStep; 4] = [
        FlowStep::RequestService,
        FlowStep::PaymentRequired,
        FlowStep::SendPayment,
        FlowStep::VerifyAndUnlock,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FlowStep::RequestService => "Request Service",
            FlowStep::PaymentRequired => "HTTP 402",
            FlowStep::SendPayment => "Send Payment",
            FlowStep::VerifyAndUnlock => "Verify & Unlock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names_match_serde() {
        for state in [
            AgentState::Idle,
            AgentState::Requesting,
            AgentState::PaymentRequired,
            AgentState::ApprovingPayment,
            AgentState::ProcessingPayment,
            AgentState::Verifying,
            AgentState::Success,
            AgentState::Error,
        ] {
            let json = serde_json::to_value(state).unwrap();
            assert_eq!(json, state.as_str());
        }
    }

    #[test]
    fn test_processing_and_terminal() {
        assert!(AgentState::Requesting.is_processing());
        assert!(AgentState::Verifying.is_processing());
        assert!(!AgentState::PaymentRequired.is_processing());
        assert!(AgentState::Error.is_terminal());
        assert!(!AgentState::Idle.is_terminal());
    }

    #[test]
    fn test_flow_steps() {
        assert_eq!(AgentState::Idle.flow_step(), None);
        assert_eq!(
            AgentState::ProcessingPayment.flow_step(),
            Some(FlowStep::SendPayment)
        );
        assert_eq!(
            AgentState::Success.flow_step(),
            Some(FlowStep::VerifyAndUnlock)
        );
        assert_eq!(FlowStep::ALL[1].label(), "HTTP 402");
    }
}
