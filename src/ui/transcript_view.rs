use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use agentree::app::{App, FilterMode, FocusPanel};
use agentree::transcript::MessageKind;

use super::colors;

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let border_style = if app.focus == FocusPanel::Transcript {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .title(title(app))
        .borders(Borders::ALL)
        .border_style(border_style);

    let messages = app.visible_messages();
    let mut lines: Vec<Line> = Vec::new();
    for msg in &messages {
        let who = msg
            .agent
            .as_ref()
            .map_or("-", |a| a.agent_name.as_str());
        let tag = match msg.kind {
            MessageKind::User => "you",
            MessageKind::SubAgentInvocation => "invoke",
            MessageKind::SubAgentResponse => "return",
            MessageKind::Error => "error",
            MessageKind::System => "system",
            _ => "",
        };
        let header = if tag.is_empty() {
            format!(" [{who}] ")
        } else {
            format!(" [{who}:{tag}] ")
        };

        let color = colors::message_color(msg.kind);
        let mut body = msg.content.lines();
        let first = body.next().unwrap_or("");
        lines.push(Line::from(vec![
            Span::styled(header, Style::default().fg(colors::ACCENT_MUTED)),
            Span::styled(first.to_string(), Style::default().fg(color)),
        ]));
        for rest in body {
            lines.push(Line::from(Span::styled(
                format!("   {rest}"),
                Style::default().fg(color),
            )));
        }
    }

    if lines.is_empty() {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            "  No messages",
            Style::default().fg(Color::DarkGray),
        )))
        .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    // Pin to the bottom, minus however far the user scrolled up.
    let max_lines = area.height.saturating_sub(2) as usize;
    let end = lines.len().saturating_sub(app.transcript_scroll).max(1);
    let start = end.saturating_sub(max_lines);
    let visible: Vec<Line> = lines.drain(start..end).collect();

    f.render_widget(
        Paragraph::new(visible).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn title(app: &App) -> Line<'static> {
    let Some(ref selected) = app.filter_selection else {
        return Line::from(" Transcript ");
    };
    let name = app
        .tracker
        .node(selected)
        .map_or("?", |n| n.agent_name.as_str())
        .to_string();
    let scope = match app.filter_mode {
        FilterMode::Agent => "own",
        FilterMode::Subtree => "tree",
    };
    Line::from(vec![
        Span::raw(" Transcript: "),
        Span::styled(name, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(" ({scope}) ")),
    ])
}
