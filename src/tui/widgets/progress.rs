//! Payment Flow Widget
//!
//! The four steps of the 402 flow, followed by the payment terms and the
//! transaction once they exist.

use crate::agent::{AgentSession, AgentState, FlowStep};
use crate::tui::theme::{Icons, Theme};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// State of one flow step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Active,
    Complete,
    Error,
}

/// Render the payment flow panel
pub fn render_progress(
    frame: &mut Frame,
    area: Rect,
    session: &AgentSession,
    explorer_link: Option<String>,
    tick: u64,
) {
    let block = Block::default()
        .title(" Payment Flow ")
        .borders(Borders::ALL)
        .border_style(Theme::border());

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![Line::from(build_progress_line(session, tick)), Line::from("")];

    if let Some(descriptor) = session.payment() {
        let terms = &descriptor.payment;
        lines.push(Line::from(vec![
            Span::styled("Status    ", Theme::text_dim()),
            Span::styled(format!("HTTP {} Payment Required", descriptor.status), Theme::warning()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Amount    ", Theme::text_dim()),
            Span::styled(format!("{} {}", terms.amount, terms.currency), Theme::heading()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Recipient ", Theme::text_dim()),
            Span::styled(terms.recipient.clone(), Theme::text()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Network   ", Theme::text_dim()),
            Span::styled(format!("{} ({})", terms.chain, terms.chain_id), Theme::text()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Reference ", Theme::text_dim()),
            Span::styled(terms.reference.clone(), Theme::text_secondary()),
        ]));
    }

    if let Some(tx_hash) = session.tx_hash() {
        lines.push(Line::from(vec![
            Span::styled("Tx        ", Theme::text_dim()),
            Span::styled(tx_hash.to_string(), Theme::text()),
        ]));
        if let Some(link) = explorer_link {
            lines.push(Line::from(vec![
                Span::styled("Explorer  ", Theme::text_dim()),
                Span::styled(link, Theme::text_secondary()),
            ]));
        }
    }

    if session.state() == AgentState::PaymentRequired {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Press ", Theme::text_secondary()),
            Span::styled("[a]", Theme::shortcut_key()),
            Span::styled(" to approve the payment", Theme::text_secondary()),
        ]));
    }

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, inner);
}

fn build_progress_line(session: &AgentSession, tick: u64) -> Vec<Span<'static>> {
    let states = step_states(session);
    let mut spans = Vec::new();

    for (i, (step, state)) in FlowStep::ALL.iter().zip(states.iter()).enumerate() {
        let (icon, style) = match state {
            StepState::Complete => (Icons::COMPLETE, Theme::complete()),
            StepState::Active if session.state().is_processing() => {
                (Icons::SPINNER[(tick % 4) as usize], Theme::active())
            }
            StepState::Active => (Icons::ACTIVE, Theme::active()),
            StepState::Pending => (Icons::PENDING, Theme::pending()),
            StepState::Error => (Icons::ERROR, Theme::error()),
        };

        spans.push(Span::styled(format!("{} ", icon), style));
        spans.push(Span::styled(step.label().to_string(), style));

        if i < FlowStep::ALL.len() - 1 {
            spans.push(Span::styled(format!(" {} ", Icons::ARROW), Theme::text_dim()));
        }
    }

    spans
}

/// Where each step stands. A failed session marks the step it failed in,
/// judged by how far the attempt got.
pub fn step_states(session: &AgentSession) -> [StepState; 4] {
    let state = session.state();
    let reached = match state {
        AgentState::Error => {
            let failed = if session.payment().is_none() {
                FlowStep::RequestService
            } else if session.tx_hash().is_none() {
                FlowStep::SendPayment
            } else {
                FlowStep::VerifyAndUnlock
            };
            return FlowStep::ALL.map(|step| {
                if step < failed {
                    StepState::Complete
                } else if step == failed {
                    StepState::Error
                } else {
                    StepState::Pending
                }
            });
        }
        AgentState::Success => return [StepState::Complete; 4],
        other => other.flow_step(),
    };

    FlowStep::ALL.map(|step| match reached {
        Some(current) if step < current => StepState::Complete,
        Some(current) if step == current => StepState::Active,
        _ => StepState::Pending,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentEvent;
    use crate::catalog;
    use crate::payment::{PaymentTerms, ServiceRef, TokenAmount, PAYMENT_REQUIRED_STATUS};
    use crate::wallet::WalletSnapshot;

    const ARC: u64 = 5042002;

    fn quoted_session(balance: &str) -> (AgentSession, WalletSnapshot) {
        let wallet =
            WalletSnapshot::connected("0xpayer", ARC, TokenAmount::parse(balance).unwrap());
        let service = catalog::find_service("code-review").unwrap();
        let mut session = AgentSession::new(ARC, 20);
        session.apply(AgentEvent::SelectService(service.clone()), &wallet);
        session.apply(AgentEvent::RequestService, &wallet);
        session.apply(
            AgentEvent::QuoteReceived {
                request_id: 1,
                descriptor: crate::payment::PaymentDescriptor {
                    status: PAYMENT_REQUIRED_STATUS,
                    service: ServiceRef {
                        id: service.id.clone(),
                        name: service.name.clone(),
                        endpoint: service.endpoint.clone(),
                    },
                    payment: PaymentTerms {
                        amount: TokenAmount::parse(&service.price).unwrap(),
                        currency: "USDC".to_string(),
                        recipient: "0xprovider".to_string(),
                        chain: "Arc Testnet".to_string(),
                        chain_id: ARC,
                        reference: "code-review-1".to_string(),
                    },
                },
            },
            &wallet,
        );
        (session, wallet)
    }

    #[test]
    fn test_idle_is_all_pending() {
        let session = AgentSession::new(ARC, 20);
        assert_eq!(step_states(&session), [StepState::Pending; 4]);
    }

    #[test]
    fn test_payment_required_step() {
        let (session, _) = quoted_session("1.00");
        assert_eq!(
            step_states(&session),
            [
                StepState::Complete,
                StepState::Active,
                StepState::Pending,
                StepState::Pending
            ]
        );
    }

    #[test]
    fn test_insufficient_balance_fails_send_step() {
        let (mut session, wallet) = quoted_session("0.00");
        session.apply(AgentEvent::ApprovePayment, &wallet);
        assert_eq!(session.state(), AgentState::Error);
        assert_eq!(
            step_states(&session),
            [
                StepState::Complete,
                StepState::Complete,
                StepState::Error,
                StepState::Pending
            ]
        );
    }
}
