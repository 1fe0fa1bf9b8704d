pub mod colors;
pub mod graph_view;
pub mod transcript_view;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};

use agentree::app::{App, FilterMode};

pub fn render(f: &mut Frame, app: &App) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),        // graph + transcript
            Constraint::Length(1),     // status bar
        ])
        .split(f.area());

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),  // graph
            Constraint::Percentage(45),  // transcript
        ])
        .split(outer[0]);

    graph_view::render(f, app, top[0]);
    transcript_view::render(f, app, top[1]);
    render_status_bar(f, app, outer[1]);
}

fn render_status_bar(f: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    use ratatui::style::{Color, Style};
    use ratatui::text::{Line, Span};
    use ratatui::widgets::Paragraph;

    let status = if app.prompt_mode {
        Line::from(vec![
            Span::styled(" > ", Style::default().fg(Color::Yellow)),
            Span::raw(&app.prompt_input),
            Span::styled("_", Style::default().fg(Color::Yellow)),
        ])
    } else {
        let current = app.tracker.current_agent_name().unwrap_or("idle");
        let mut spans = vec![
            Span::styled(format!(" {current} "), Style::default().fg(colors::HIGHLIGHT_FG)),
            Span::styled("[q]", Style::default().fg(Color::Gray)),
            Span::raw("uit "),
            Span::styled("[j/k]", Style::default().fg(Color::Gray)),
            Span::raw("nav "),
            Span::styled("[enter/esc]", Style::default().fg(Color::Gray)),
            Span::raw("filter "),
            Span::styled("[s]", Style::default().fg(Color::Gray)),
            Span::raw(match app.filter_mode {
                FilterMode::Agent => "cope:own ",
                FilterMode::Subtree => "cope:tree ",
            }),
            Span::styled("[i]", Style::default().fg(Color::Gray)),
            Span::raw(if app.tracker.has_active_conversation() {
                "continue "
            } else {
                "prompt "
            }),
            Span::styled("[x]", Style::default().fg(Color::Gray)),
            Span::raw("cancel "),
            Span::styled("[tab]", Style::default().fg(Color::Gray)),
            Span::raw("focus "),
        ];
        if let Some(ref source) = app.source_label {
            spans.push(Span::styled(format!(" {source}"), Style::default().fg(Color::Gray)));
        }
        Line::from(spans)
    };

    f.render_widget(
        Paragraph::new(status).style(Style::default().bg(Color::DarkGray).fg(Color::White)),
        area,
    );
}
