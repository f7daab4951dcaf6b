//! Service List Widget

use crate::catalog::ServiceDescriptor;
use crate::tui::theme::{Icons, Theme};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Render the service catalog with the highlighted row. `locked` dims the list
/// while a request is in flight.
pub fn render_services(
    frame: &mut Frame,
    area: Rect,
    services: &[ServiceDescriptor],
    selected: usize,
    locked: bool,
) {
    let block = Block::default()
        .title(" AI Services ")
        .borders(Borders::ALL)
        .border_style(if locked {
            Theme::border()
        } else {
            Theme::border_focused()
        });

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = Vec::new();
    for (i, service) in services.iter().enumerate() {
        let is_selected = i == selected;
        let marker = if is_selected { Icons::SELECTED } else { " " };
        let name_style = match (is_selected, locked) {
            (true, false) => Theme::selected(),
            (true, true) => Theme::heading(),
            (false, _) => Theme::text_secondary(),
        };

        lines.push(Line::from(vec![
            Span::styled(format!("{} ", marker), Theme::selected()),
            Span::raw(format!("{} ", service.icon)),
            Span::styled(service.name.clone(), name_style),
            Span::styled(format!("  {} USDC", service.price), Theme::warning()),
        ]));
        if is_selected {
            lines.push(Line::from(vec![
                Span::raw("    "),
                Span::styled(service.description.clone(), Theme::text_dim()),
            ]));
        }
    }

    frame.render_widget(Paragraph::new(lines), inner);
}
