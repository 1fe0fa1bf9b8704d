use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use agentree::app::{App, FocusPanel};
use agentree::tracking::agents::truncate_chars;

use super::colors;

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let border_style = if app.focus == FocusPanel::Graph {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .title(format!(" Agents ({}){} ", app.tracker.nodes().len(), breadcrumb(app)))
        .borders(Borders::ALL)
        .border_style(border_style);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.tracker.is_empty() {
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "  No agents yet. Press i to send a prompt.",
                Style::default().fg(Color::DarkGray),
            ))),
            inner,
        );
        return;
    }

    let (origin_x, origin_y) = viewport_origin(app, inner);
    let buf = f.buffer_mut();
    let unit = app.layout_config.unit_width;

    // Edges first so node labels draw over them.
    for edge in &app.layout.edges {
        let (Some(parent), Some(child)) = (app.layout.position(&edge.from), app.layout.position(&edge.to)) else {
            continue;
        };
        if child.rank <= parent.rank {
            continue;
        }
        let px = origin_x + parent.x.round() as i32;
        let cx = origin_x + child.x.round() as i32;
        let drop_row = origin_y + parent.y.round() as i32 + 2;
        let bar_row = origin_y + child.y.round() as i32 - 1;
        let edge_style = Style::default().fg(colors::EDGE);

        for row in drop_row..bar_row {
            put(buf, inner, px, row, "│", edge_style);
        }
        for col in px.min(cx)..=px.max(cx) {
            put(buf, inner, col, bar_row, "─", edge_style);
        }
        if px == cx {
            put(buf, inner, cx, bar_row, "│", edge_style);
        } else {
            put(buf, inner, px, bar_row, if cx > px { "└" } else { "┘" }, edge_style);
            put(buf, inner, cx, bar_row, if cx > px { "┐" } else { "┌" }, edge_style);
        }
    }

    let label_width = (unit as usize).saturating_sub(2).max(4);
    for (index, node) in app.tracker.nodes().iter().enumerate() {
        let Some(pos) = app.layout.position(&node.id) else {
            continue;
        };
        let status = app.tracker.visual_status(node);
        let color = colors::status_color(status);

        let orphan = if pos.is_orphan { "?" } else { "" };
        let title = truncate_chars(
            &format!("{} {}{}", status.glyph(), orphan, node.agent_name),
            label_width,
        );
        let subtitle = node.prompt_preview(label_width.saturating_sub(1));

        let mut title_style = Style::default().fg(color).add_modifier(Modifier::BOLD);
        let mut subtitle_style = Style::default().fg(Color::DarkGray);
        if index == app.selected_index {
            title_style = title_style.bg(colors::HIGHLIGHT_BG);
            subtitle_style = subtitle_style.bg(colors::HIGHLIGHT_BG).fg(colors::HIGHLIGHT_FG);
        }
        if app.filter_selection.as_deref() == Some(node.id.as_str()) {
            title_style = title_style.add_modifier(Modifier::UNDERLINED);
        }

        let x = origin_x + pos.x.round() as i32;
        let y = origin_y + pos.y.round() as i32;
        put_centered(buf, inner, x, y, &title, title_style);
        put_centered(buf, inner, x, y + 1, &subtitle, subtitle_style);
    }
}

/// `root › … › selected` for the graph cursor.
fn breadcrumb(app: &App) -> String {
    let Some(selected) = app.selected_node() else {
        return String::new();
    };
    let mut names: Vec<&str> = app
        .tracker
        .ancestors_of(&selected.id)
        .iter()
        .rev()
        .map(|n| n.agent_name.as_str())
        .collect();
    names.push(&selected.agent_name);
    format!(" {}", names.join(" › "))
}

/// Where layout coordinate (0, 0) lands on screen. The graph is centered when
/// it fits, otherwise scrolled to keep the graph cursor in view.
fn viewport_origin(app: &App, inner: Rect) -> (i32, i32) {
    let bounds = app.layout.bounds;
    let width = inner.width as f32;
    let height = inner.height as f32;

    let x = if bounds.width() <= width {
        inner.x as f32 + (width - bounds.width()) / 2.0 - bounds.min_x
    } else {
        let focus_x = app
            .selected_node()
            .and_then(|n| app.layout.position(&n.id))
            .map_or(bounds.min_x, |p| p.x);
        let ideal = inner.x as f32 + width / 2.0 - focus_x;
        let min = inner.x as f32 + width - bounds.max_x;
        let max = inner.x as f32 - bounds.min_x;
        ideal.clamp(min, max)
    };

    let y = if bounds.height() + 1.0 <= height {
        inner.y as f32 - bounds.min_y
    } else {
        let focus_y = app
            .selected_node()
            .and_then(|n| app.layout.position(&n.id))
            .map_or(bounds.min_y, |p| p.y);
        let ideal = inner.y as f32 + height / 2.0 - focus_y;
        let min = inner.y as f32 + height - bounds.max_y - 1.0;
        let max = inner.y as f32 - bounds.min_y;
        ideal.clamp(min, max)
    };

    (x.round() as i32, y.round() as i32)
}

fn put_centered(buf: &mut Buffer, clip: Rect, center_x: i32, y: i32, text: &str, style: Style) {
    let len = text.chars().count() as i32;
    let mut x = center_x - len / 2;
    for ch in text.chars() {
        let mut tmp = [0u8; 4];
        put(buf, clip, x, y, ch.encode_utf8(&mut tmp), style);
        x += 1;
    }
}

/// Write one cell, silently dropping anything outside `clip`.
fn put(buf: &mut Buffer, clip: Rect, x: i32, y: i32, symbol: &str, style: Style) {
    let inside = x >= i32::from(clip.x)
        && x < i32::from(clip.x) + i32::from(clip.width)
        && y >= i32::from(clip.y)
        && y < i32::from(clip.y) + i32::from(clip.height);
    if !inside {
        return;
    }
    if let Some(cell) = buf.cell_mut((x as u16, y as u16)) {
        cell.set_symbol(symbol);
        cell.set_style(style);
    }
}
