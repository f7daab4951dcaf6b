//! Application State
//!
//! Holds the agent context plus the view state of the terminal UI, and turns
//! user actions into agent events and wallet operations.

use tracing::{info, warn};

use crate::agent::AgentState;
use crate::catalog::{self, ServiceDescriptor};
use crate::context::AppContext;
use crate::tui::event::AppAction;

/// Current view/screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Main,
    Help,
}

/// Main application state
pub struct App {
    pub context: AppContext,

    // UI State
    pub view: View,
    pub should_quit: bool,
    pub services: Vec<ServiceDescriptor>,
    pub selected: usize,
    /// Result of the last wallet operation, shown in the status bar
    pub notice: Option<String>,
    pub tick: u64,
}

impl App {
    pub fn new(context: AppContext) -> Self {
        let mut app = Self {
            context,
            view: View::Main,
            should_quit: false,
            services: catalog::ai_services(),
            selected: 0,
            notice: None,
            tick: 0,
        };
        app.sync_selection();
        app
    }

    pub fn selected_service(&self) -> Option<&ServiceDescriptor> {
        self.services.get(self.selected)
    }

    /// Apply completions and wallet changes that arrived since the last call
    pub fn poll_events(&mut self) {
        self.context.runtime.observe_wallet();
        self.context.runtime.poll_events();
    }

    /// Handle a user action
    pub async fn handle_action(&mut self, action: AppAction) {
        if self.view == View::Help {
            match action {
                AppAction::Tick => {}
                AppAction::Quit | AppAction::ForceQuit => self.should_quit = true,
                _ => self.view = View::Main,
            }
            if action != AppAction::Tick {
                return;
            }
        }

        match action {
            AppAction::Quit | AppAction::ForceQuit => {
                self.should_quit = true;
            }
            AppAction::SelectPrev => self.move_selection(-1),
            AppAction::SelectNext => self.move_selection(1),
            AppAction::RequestService => {
                if self.context.runtime.session().state().is_terminal() {
                    self.notice = Some("Press [r] to reset before a new request".to_string());
                    return;
                }
                self.sync_selection();
                self.context.runtime.request_service();
            }
            AppAction::ApprovePayment => {
                self.context.runtime.approve_payment();
            }
            AppAction::Reset => {
                self.context.runtime.reset();
                self.sync_selection();
            }
            AppAction::ToggleWallet => self.toggle_wallet().await,
            AppAction::SwitchNetwork => {
                let result = self.context.switch_to_designated_network().await;
                self.report("Network switch", result.map(|_| ()));
            }
            AppAction::DeclineNextTransfer => self.decline_next_transfer().await,
            AppAction::ToggleHelp => {
                self.view = View::Help;
            }
            AppAction::Escape => {
                self.notice = None;
            }
            AppAction::Tick => {
                self.tick = self.tick.wrapping_add(1);
                self.poll_events();
            }
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.services.is_empty() || self.is_busy() {
            return;
        }
        let len = self.services.len() as isize;
        self.selected = (self.selected as isize + delta).rem_euclid(len) as usize;
        self.sync_selection();
    }

    /// Keep the session's selected service in line with the highlighted row
    fn sync_selection(&mut self) {
        if let Some(service) = self.services.get(self.selected).cloned() {
            self.context.runtime.select_service(service);
        }
    }

    fn is_busy(&self) -> bool {
        self.context.runtime.session().state().is_processing()
    }

    async fn toggle_wallet(&mut self) {
        if self.context.runtime.wallet().is_connected() {
            let result = self.context.disconnect_wallet().await;
            self.report("Disconnect", result);
        } else {
            let result = self.context.connect_wallet().await;
            self.report("Connect", result);
        }
    }

    async fn decline_next_transfer(&mut self) {
        match &self.context.wallet.simulated {
            Some(wallet) => {
                wallet.decline_next_transfer().await;
                self.notice = Some("The wallet will decline the next transfer".to_string());
                info!("Simulated wallet will decline the next transfer");
            }
            None => {
                self.notice = Some("Only the simulated wallet can decline on request".to_string());
            }
        }
    }

    fn report(&mut self, operation: &str, result: crate::types::AppResult<()>) {
        match result {
            Ok(()) => self.notice = None,
            Err(e) => {
                warn!("{} failed: {}", operation, e);
                self.notice = Some(format!("{} failed: {}", operation, e));
            }
        }
    }

    /// Only allowed when nothing is in flight
    pub fn confirm_quit(&self) -> bool {
        !matches!(
            self.context.runtime.session().state(),
            AgentState::ProcessingPayment
        )
    }
}
