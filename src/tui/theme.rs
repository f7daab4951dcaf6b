//! Theme and Styling
//!
//! Colors and styles for the terminal interface.

use ratatui::style::{Color, Modifier, Style};

use crate::agent::{ActivityKind, AgentState, TransactionMode};

/// Application theme
pub struct Theme;

impl Theme {
    // === Primary Colors ===

    /// Primary accent color (cyan/teal)
    pub const ACCENT: Color = Color::Rgb(0, 212, 255);

    pub const SUCCESS: Color = Color::Rgb(34, 197, 94);

    pub const WARNING: Color = Color::Rgb(251, 191, 36);

    pub const ERROR: Color = Color::Rgb(239, 68, 68);

    /// Payment activity (violet)
    pub const PAYMENT: Color = Color::Rgb(167, 139, 250);

    /// User-declined transfers (orange)
    pub const DECLINED: Color = Color::Rgb(251, 146, 60);

    // === Text Colors ===

    pub const TEXT_PRIMARY: Color = Color::Rgb(229, 229, 229);

    pub const TEXT_SECONDARY: Color = Color::Rgb(161, 161, 161);

    pub const TEXT_DIM: Color = Color::Rgb(82, 82, 82);

    // === Border Colors ===

    pub const BORDER: Color = Color::Rgb(51, 51, 51);

    pub const BORDER_FOCUSED: Color = Color::Rgb(59, 130, 246);

    // === Styles ===

    pub fn text() -> Style {
        Style::default().fg(Self::TEXT_PRIMARY)
    }

    pub fn text_secondary() -> Style {
        Style::default().fg(Self::TEXT_SECONDARY)
    }

    pub fn text_dim() -> Style {
        Style::default().fg(Self::TEXT_DIM)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(Self::ACCENT)
            .add_modifier(Modifier::BOLD)
    }

    pub fn heading() -> Style {
        Style::default()
            .fg(Self::TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn success() -> Style {
        Style::default().fg(Self::SUCCESS)
    }

    pub fn warning() -> Style {
        Style::default().fg(Self::WARNING)
    }

    pub fn error() -> Style {
        Style::default().fg(Self::ERROR)
    }

    pub fn border() -> Style {
        Style::default().fg(Self::BORDER)
    }

    pub fn border_focused() -> Style {
        Style::default().fg(Self::BORDER_FOCUSED)
    }

    /// Highlighted service row
    pub fn selected() -> Style {
        Style::default()
            .fg(Self::ACCENT)
            .add_modifier(Modifier::BOLD)
    }

    pub fn shortcut_key() -> Style {
        Style::default()
            .fg(Self::ACCENT)
            .add_modifier(Modifier::BOLD)
    }

    pub fn shortcut_desc() -> Style {
        Style::default().fg(Self::TEXT_SECONDARY)
    }

    /// Active/in-progress indicator
    pub fn active() -> Style {
        Style::default()
            .fg(Self::WARNING)
            .add_modifier(Modifier::BOLD)
    }

    pub fn complete() -> Style {
        Style::default().fg(Self::SUCCESS)
    }

    pub fn pending() -> Style {
        Style::default().fg(Self::TEXT_DIM)
    }

    /// Agent status label color
    pub fn state(state: AgentState) -> Style {
        let color = match state {
            AgentState::Idle => Self::TEXT_SECONDARY,
            AgentState::Success => Self::SUCCESS,
            AgentState::Error => Self::ERROR,
            AgentState::PaymentRequired => Self::WARNING,
            _ => Self::ACCENT,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn activity_kind(kind: ActivityKind) -> Style {
        let color = match kind {
            ActivityKind::Request => Self::ACCENT,
            ActivityKind::Payment => Self::PAYMENT,
            ActivityKind::Declined => Self::DECLINED,
            ActivityKind::Unlock => Self::SUCCESS,
            ActivityKind::Network => Self::TEXT_SECONDARY,
            ActivityKind::Error => Self::ERROR,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    /// Mode badge in the header
    pub fn mode_badge(mode: TransactionMode) -> Style {
        let bg = match mode {
            TransactionMode::Real => Self::SUCCESS,
            TransactionMode::Simulation => Self::WARNING,
        };
        Style::default()
            .fg(Color::Black)
            .bg(bg)
            .add_modifier(Modifier::BOLD)
    }
}

/// Progress stage icons
pub struct Icons;

impl Icons {
    pub const COMPLETE: &'static str = "✓";
    pub const ACTIVE: &'static str = "●";
    pub const PENDING: &'static str = "○";
    pub const ERROR: &'static str = "✗";
    pub const ARROW: &'static str = "→";
    pub const SELECTED: &'static str = "▶";
    pub const SPINNER: [&'static str; 4] = ["◐", "◓", "◑", "◒"];
}
