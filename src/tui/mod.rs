//! Terminal User Interface Module
//!
//! Dashboard for the HTTP 402 payment agent, built with Ratatui.
//!
//! # Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ⚡ Agent402   [SIMULATION]  0x8ba1...BA72  10.00 USDC  Arc      │
//! ├──────────────────────────┬──────────────────────────────────────┤
//! │ Agent Status             │ Payment Flow                         │
//! │ ● Payment Required       │ ✓ Request → ● HTTP 402 → ○ Send → ○  │
//! ├──────────────────────────┤ Amount 0.10 USDC ...                 │
//! │ AI Services              ├──────────────────────────────────────┤
//! │ ▶ GPT-4 API Call  0.10   │ Service Response                     │
//! │   Image Generation 0.25  │ { ... }                              │
//! ├──────────────────────────┴──────────────────────────────────────┤
//! │ Activity (newest first)                                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ [↑/↓] Select [Enter] Request [a] Approve [r] Reset [?] Help     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod event;
pub mod theme;
pub mod ui;
pub mod widgets;

pub use app::{App, View};
pub use event::{AppAction, EventHandler};

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use tracing::{error, info};

use crate::context::AppContext;

/// Type alias for our terminal backend
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Initialize the terminal for TUI mode
pub fn init_terminal() -> anyhow::Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to its original state
pub fn restore_terminal(terminal: &mut Tui) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the TUI application
pub async fn run(context: AppContext) -> anyhow::Result<()> {
    info!("Starting TUI mode");

    let mut terminal = init_terminal()?;
    let mut app = App::new(context);
    let mut events = EventHandler::new(std::time::Duration::from_millis(100));

    let result = run_app(&mut terminal, &mut app, &mut events).await;

    if let Err(e) = restore_terminal(&mut terminal) {
        error!("Failed to restore terminal: {}", e);
    }

    result
}

/// Main application loop
async fn run_app(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> anyhow::Result<()> {
    loop {
        app.poll_events();
        terminal.draw(|frame| ui::render(frame, app))?;

        let Some(action) = events.next().await else {
            break;
        };
        match action {
            AppAction::Quit => {
                if app.confirm_quit() {
                    break;
                }
                app.notice = Some("A payment is being processed - Ctrl+C to force quit".to_string());
            }
            AppAction::ForceQuit => break,
            _ => app.handle_action(action).await,
        }

        if app.should_quit {
            break;
        }
    }

    info!("TUI exited normally");
    Ok(())
}
