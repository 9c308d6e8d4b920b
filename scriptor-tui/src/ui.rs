//! Frame rendering. Pure functions of [`App`] state.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, List, ListItem, ListState, Paragraph, Wrap};

use crate::ansi::to_line;
use crate::app::{App, PromptModal};

pub fn render(frame: &mut Frame, app: &App) {
    let [main, status] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(frame.area());
    let [list, output] =
        Layout::horizontal([Constraint::Percentage(30), Constraint::Percentage(70)]).areas(main);

    render_scripts(frame, list, app);
    render_output(frame, output, app);
    render_status(frame, status, app);

    if let Some(modal) = &app.modal {
        render_modal(frame, main, modal);
    }
}

fn render_scripts(frame: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .scripts
        .iter()
        .map(|script| {
            let mut spans = vec![Span::raw(script.name.clone())];
            if script.invalid.is_some() {
                spans.push(Span::styled(" (invalid)", Style::default().fg(Color::Red)));
            } else if let Some(description) = &script.description {
                spans.push(Span::styled(
                    format!("  {description}"),
                    Style::default().add_modifier(Modifier::DIM),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();
    let list = List::new(items)
        .block(Block::bordered().title("Scripts"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    let mut state = ListState::default();
    if !app.scripts.is_empty() {
        state.select(Some(app.selected));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_output(frame: &mut Frame, area: Rect, app: &App) {
    let height = usize::from(area.height.saturating_sub(2));
    let (start, end) = visible_range(app.output.len(), app.scroll, height);
    let lines: Vec<Line> = app.output[start..end].iter().map(|l| to_line(l)).collect();
    let title = match &app.running {
        Some(name) => format!("Output ({name})"),
        None => "Output".to_string(),
    };
    let paragraph = Paragraph::new(lines).block(Block::bordered().title(title));
    frame.render_widget(paragraph, area);
}

/// Window of `height` lines ending `scroll` lines above the bottom.
pub fn visible_range(total: usize, scroll: usize, height: usize) -> (usize, usize) {
    let end = total.saturating_sub(scroll);
    (end.saturating_sub(height), end)
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let status =
        Paragraph::new(app.status.as_str()).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status, area);
}

fn render_modal(frame: &mut Frame, area: Rect, modal: &PromptModal) {
    let Some(def) = modal.current() else {
        return;
    };
    let (index, total) = modal.progress();
    let rect = centered(area, 60, 7);
    let body = vec![
        Line::from(def.message.clone()),
        Line::from(""),
        Line::from(format!("> {}", modal.display_input())),
        Line::from(Span::styled(
            "enter: accept  esc: skip",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];
    let dialog = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .block(Block::bordered().title(format!("{} ({index}/{total})", def.name)));
    frame.render_widget(Clear, rect);
    frame.render_widget(dialog, rect);
}

/// A `width`% wide, `height` rows tall rectangle centered in `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [_, row, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height),
        Constraint::Fill(1),
    ])
    .areas(area);
    let [_, cell, _] = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Percentage(width),
        Constraint::Fill(1),
    ])
    .areas(row);
    cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::path::PathBuf;

    use crate::app::ScriptSummary;

    #[test]
    fn visible_range_follows_the_bottom() {
        assert_eq!(visible_range(100, 0, 10), (90, 100));
        assert_eq!(visible_range(100, 5, 10), (85, 95));
        assert_eq!(visible_range(3, 0, 10), (0, 3));
        assert_eq!(visible_range(3, 10, 10), (0, 0));
    }

    #[test]
    fn renders_scripts_and_output() {
        let mut app = App::new();
        app.set_scripts(vec![ScriptSummary {
            name: "deploy".to_string(),
            path: PathBuf::from("scripts/deploy.rhai"),
            description: Some("Ship it".to_string()),
            invalid: None,
        }]);
        app.push_output("\x1b[34mhello\x1b[0m".to_string());

        let mut terminal = Terminal::new(TestBackend::new(80, 12)).expect("terminal");
        terminal.draw(|frame| render(frame, &app)).expect("draw");

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains("deploy"));
        assert!(text.contains("hello"));
        assert!(!text.contains("[34m"));
    }
}
