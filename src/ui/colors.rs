//! Shared color palette for the TUI.

use ratatui::style::Color;

use agentree::tracking::VisualStatus;
use agentree::transcript::MessageKind;

// ── Node status colors ──────────────────────────────────────────────
pub const STATUS_ACTIVE: Color = Color::Rgb(80, 140, 255);
pub const STATUS_WAITING: Color = Color::Rgb(230, 160, 60);
pub const STATUS_COMPLETED: Color = Color::Rgb(80, 220, 120);
pub const STATUS_ERROR: Color = Color::Rgb(220, 80, 80);

// ── Transcript colors ───────────────────────────────────────────────
pub const MSG_USER: Color = Color::Rgb(255, 220, 150);
pub const MSG_AGENT: Color = Color::White;
pub const MSG_SUB_AGENT: Color = Color::Rgb(120, 160, 220);
pub const MSG_MUTED: Color = Color::Rgb(140, 140, 140);

// ── Accent / chrome ─────────────────────────────────────────────────
pub const ACCENT_MUTED: Color = Color::Rgb(120, 120, 180);
pub const EDGE: Color = Color::Rgb(100, 100, 100);
pub const HIGHLIGHT_BG: Color = Color::Rgb(60, 55, 50);
pub const HIGHLIGHT_FG: Color = Color::Rgb(255, 220, 150);

pub fn status_color(status: VisualStatus) -> Color {
    match status {
        VisualStatus::Active => STATUS_ACTIVE,
        VisualStatus::Waiting => STATUS_WAITING,
        VisualStatus::Completed => STATUS_COMPLETED,
        VisualStatus::Error => STATUS_ERROR,
    }
}

pub fn message_color(kind: MessageKind) -> Color {
    match kind {
        MessageKind::User => MSG_USER,
        MessageKind::Agent => MSG_AGENT,
        MessageKind::SubAgentInvocation | MessageKind::SubAgentResponse => MSG_SUB_AGENT,
        MessageKind::Error => STATUS_ERROR,
        MessageKind::System => STATUS_WAITING,
        MessageKind::Reasoning | MessageKind::Shell | MessageKind::Diff | MessageKind::Text => MSG_MUTED,
    }
}
