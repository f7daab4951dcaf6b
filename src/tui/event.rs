//! Event Handling
//!
//! Maps keyboard input and a timer into application actions.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::{FutureExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;

/// Actions that can be performed in the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Quit the application
    Quit,
    /// Force quit (Ctrl+C)
    ForceQuit,
    /// Move the service selection up
    SelectPrev,
    /// Move the service selection down
    SelectNext,
    /// Request the selected service (Enter)
    RequestService,
    ApprovePayment,
    Reset,
    /// Connect or disconnect the wallet
    ToggleWallet,
    /// Switch the wallet to the designated network
    SwitchNetwork,
    /// Make the simulated wallet decline its next transfer
    DeclineNextTransfer,
    ToggleHelp,
    /// Close modals
    Escape,
    /// Timer tick; drives completions and the spinner
    Tick,
}

/// Event handler for the TUI
pub struct EventHandler {
    rx: mpsc::Receiver<AppAction>,
    _tx: mpsc::Sender<AppAction>,
}

impl EventHandler {
    /// Create a new event handler with specified tick rate
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::channel(100);
        let tx_clone = tx.clone();

        tokio::spawn(async move {
            let mut reader = crossterm::event::EventStream::new();
            let mut tick_interval = tokio::time::interval(tick_rate);

            loop {
                let tick = tick_interval.tick();
                let crossterm_event = reader.next().fuse();

                tokio::select! {
                    _ = tick => {
                        if tx_clone.send(AppAction::Tick).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(evt)) = crossterm_event => {
                        if let Some(action) = map_event(evt) {
                            if tx_clone.send(action).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self { rx, _tx: tx }
    }

    /// Wait for the next action
    pub async fn next(&mut self) -> Option<AppAction> {
        self.rx.recv().await
    }
}

/// Map a crossterm event to an app action
pub fn map_event(event: Event) -> Option<AppAction> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => map_key_event(key),
        _ => None,
    }
}

/// Map a key event to an app action
pub fn map_key_event(key: KeyEvent) -> Option<AppAction> {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(AppAction::ForceQuit),
        (KeyModifiers::CONTROL, KeyCode::Char('q')) => Some(AppAction::Quit),

        (KeyModifiers::NONE, code) | (KeyModifiers::SHIFT, code) => match code {
            KeyCode::Esc => Some(AppAction::Escape),
            KeyCode::Enter => Some(AppAction::RequestService),
            KeyCode::Up | KeyCode::Char('k') => Some(AppAction::SelectPrev),
            KeyCode::Down | KeyCode::Char('j') => Some(AppAction::SelectNext),
            KeyCode::Char('a') => Some(AppAction::ApprovePayment),
            KeyCode::Char('r') => Some(AppAction::Reset),
            KeyCode::Char('c') => Some(AppAction::ToggleWallet),
            KeyCode::Char('n') => Some(AppAction::SwitchNetwork),
            KeyCode::Char('d') => Some(AppAction::DeclineNextTransfer),
            KeyCode::Char('q') => Some(AppAction::Quit),
            KeyCode::Char('?') | KeyCode::F(1) => Some(AppAction::ToggleHelp),
            _ => None,
        },

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_flow_keys() {
        assert_eq!(map_key_event(key(KeyCode::Enter)), Some(AppAction::RequestService));
        assert_eq!(map_key_event(key(KeyCode::Char('a'))), Some(AppAction::ApprovePayment));
        assert_eq!(map_key_event(key(KeyCode::Char('r'))), Some(AppAction::Reset));
        assert_eq!(map_key_event(key(KeyCode::Up)), Some(AppAction::SelectPrev));
        assert_eq!(map_key_event(key(KeyCode::Down)), Some(AppAction::SelectNext));
    }

    #[test]
    fn test_help_and_quit_keys() {
        assert_eq!(map_key_event(key(KeyCode::F(1))), Some(AppAction::ToggleHelp));
        assert_eq!(
            map_key_event(KeyEvent::new(KeyCode::Char('?'), KeyModifiers::SHIFT)),
            Some(AppAction::ToggleHelp)
        );
        assert_eq!(
            map_key_event(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL)),
            Some(AppAction::Quit)
        );
        assert_eq!(
            map_key_event(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(AppAction::ForceQuit)
        );
    }

    #[test]
    fn test_unbound_keys_are_ignored() {
        assert_eq!(map_key_event(key(KeyCode::Char('z'))), None);
        assert_eq!(
            map_key_event(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::ALT)),
            None
        );
    }
}
