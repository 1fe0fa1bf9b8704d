use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use color_eyre::eyre::Result;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::ingest::sidecar::{self, EventTailer};
use crate::ingest::{EventSource, SessionEvent};
use crate::layout::{self, GraphLayout, LayoutConfig};
use crate::tracking::{AgentNode, AgentTracker, Invocation};
use crate::transcript::{AgentFilter, ChatMessage, MessageKind, Transcript};

/// Agent used for a fresh conversation when none is configured.
pub const DEFAULT_AGENT: &str = "code-puppy";

/// Which panel is focused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPanel {
    Graph,
    Transcript,
}

/// How a selected node narrows the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Agent,
    Subtree,
}

pub struct App {
    pub tracker: AgentTracker,
    pub transcript: Transcript,
    pub layout: GraphLayout,
    pub layout_config: LayoutConfig,
    pub should_quit: bool,

    // Agent that runs a brand-new conversation.
    pub agent_name: String,

    // Graph cursor, an index into the tracker's nodes.
    pub selected_index: usize,

    // Transcript filter selection, owned here rather than by the tracker.
    pub filter_selection: Option<String>,
    pub filter_mode: FilterMode,

    pub focus: FocusPanel,
    // Lines scrolled up from the bottom of the transcript.
    pub transcript_scroll: usize,

    // Prompt entry.
    pub prompt_mode: bool,
    pub prompt_input: String,

    // Where events come from, for display.
    pub source_label: Option<String>,

    // Optional event log writer.
    pub event_log: Option<BufWriter<File>>,
}

impl App {
    pub fn new(agent_name: impl Into<String>, event_log: Option<BufWriter<File>>) -> Self {
        Self {
            tracker: AgentTracker::new(),
            transcript: Transcript::new(),
            layout: GraphLayout::default(),
            layout_config: LayoutConfig::default(),
            should_quit: false,
            agent_name: agent_name.into(),
            selected_index: 0,
            filter_selection: None,
            filter_mode: FilterMode::Agent,
            focus: FocusPanel::Graph,
            transcript_scroll: 0,
            prompt_mode: false,
            prompt_input: String::new(),
            source_label: None,
            event_log,
        }
    }

    /// Apply one session event to the tree and transcript.
    pub fn apply(&mut self, event: SessionEvent) {
        tracing::debug!(event = event.name(), "applying session event");
        let name = event.name();

        match event {
            SessionEvent::SubAgentInvocation {
                agent_name,
                session_id,
                prompt,
                is_new_session,
            } => {
                // The invoking agent said this, so stamp before the cursor moves.
                let resumed = if is_new_session { "" } else { " (resumed)" };
                self.push_message(
                    MessageKind::SubAgentInvocation,
                    format!("[{agent_name}]{resumed} {prompt}"),
                );
                self.tracker.record_invocation(Invocation {
                    agent_name,
                    session_id,
                    prompt,
                });
            }
            SessionEvent::SubAgentResponse {
                session_id,
                response,
                ..
            } => {
                // The responding agent said this, so stamp before the cursor pops.
                self.push_message(MessageKind::SubAgentResponse, response);
                self.tracker.record_response(&session_id);
            }
            SessionEvent::TaskComplete => {
                self.tracker.mark_all_running_as_completed();
            }
            SessionEvent::TaskError { message } => {
                self.push_message(MessageKind::Error, message);
                self.tracker.mark_current_as_error();
            }
            SessionEvent::UserCancel => {
                self.push_message(MessageKind::System, "Task cancelled");
                self.tracker.mark_all_running_as_error();
            }
            SessionEvent::UserSendPrompt { text } => {
                if !self.tracker.has_active_conversation() || !self.tracker.continue_conversation() {
                    let agent = self.agent_name.clone();
                    self.tracker.start_new_conversation(&agent, &text);
                    self.filter_selection = None;
                    self.selected_index = 0;
                }
                self.push_message(MessageKind::User, text);
            }
            SessionEvent::Message(msg) => {
                self.push_message(msg.kind, msg.content);
            }
        }

        self.relayout();
        self.log_event(name);
    }

    /// Drain a source and apply everything it produced.
    pub fn drain<S: EventSource>(&mut self, source: &mut S) -> usize {
        let events = source.poll_events();
        let count = events.len();
        for event in events {
            self.apply(event);
        }
        count
    }

    /// Load a capture at startup. When following, the returned tailer has
    /// already applied the existing frames (unless `live_only`) and resumes
    /// from exactly where that read stopped.
    pub fn load_capture(&mut self, path: &Path, follow: bool, live_only: bool) -> Result<Option<EventTailer>> {
        if !follow {
            for event in sidecar::parse_event_file(path)? {
                self.apply(event);
            }
            return Ok(None);
        }
        let mut tailer = EventTailer::new(path.to_path_buf(), !live_only);
        let replayed = self.drain(&mut tailer);
        tracing::info!(path = %path.display(), replayed, "following capture");
        Ok(Some(tailer))
    }

    fn push_message(&mut self, kind: MessageKind, content: impl Into<String>) {
        let stamp = self.tracker.stamp();
        self.transcript.push(kind, content, stamp);
    }

    /// Full recompute; footprints can shift anywhere when a node appears.
    pub fn relayout(&mut self) {
        self.layout = layout::compute(self.tracker.nodes(), &self.layout_config);
        let len = self.tracker.nodes().len();
        if len == 0 {
            self.selected_index = 0;
        } else if self.selected_index >= len {
            self.selected_index = len - 1;
        }
    }

    pub fn selected_node(&self) -> Option<&AgentNode> {
        self.tracker.nodes().get(self.selected_index)
    }

    pub fn active_filter(&self) -> Option<AgentFilter> {
        let id = self.filter_selection.as_ref()?;
        Some(match self.filter_mode {
            FilterMode::Agent => AgentFilter::Agent(id.clone()),
            FilterMode::Subtree => AgentFilter::Subtree(self.tracker.subtree_ids(id)),
        })
    }

    pub fn visible_messages(&self) -> Vec<&ChatMessage> {
        let filter = self.active_filter();
        self.transcript.filtered(filter.as_ref())
    }

    /// Lines the transcript panel draws for the visible messages, before wrapping.
    pub fn transcript_line_count(&self) -> usize {
        self.visible_messages()
            .iter()
            .map(|m| m.content.lines().count().max(1))
            .sum()
    }

    pub fn select_for_filter(&mut self) {
        self.filter_selection = self.selected_node().map(|n| n.id.clone());
        self.transcript_scroll = 0;
    }

    pub fn clear_filter(&mut self) {
        self.filter_selection = None;
        self.transcript_scroll = 0;
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.prompt_mode {
            self.handle_prompt_key(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('g') => self.selected_index = 0,
            KeyCode::Char('G') => self.select_last(),
            KeyCode::Enter => self.select_for_filter(),
            KeyCode::Esc => self.clear_filter(),
            KeyCode::Char('s') => {
                self.filter_mode = match self.filter_mode {
                    FilterMode::Agent => FilterMode::Subtree,
                    FilterMode::Subtree => FilterMode::Agent,
                };
            }
            KeyCode::Char('i') => {
                self.prompt_mode = true;
                self.prompt_input.clear();
            }
            KeyCode::Char('x') => self.apply(SessionEvent::UserCancel),
            KeyCode::Tab => self.cycle_focus(),
            KeyCode::PageUp => self.scroll_transcript(10),
            KeyCode::PageDown => self.scroll_transcript(-10),
            _ => {}
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.scroll_transcript(3),
            MouseEventKind::ScrollDown => self.scroll_transcript(-3),
            _ => {}
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.prompt_mode = false;
                self.prompt_input.clear();
            }
            KeyCode::Enter => {
                self.prompt_mode = false;
                let text = std::mem::take(&mut self.prompt_input);
                if !text.trim().is_empty() {
                    self.apply(SessionEvent::UserSendPrompt { text });
                }
            }
            KeyCode::Backspace => {
                self.prompt_input.pop();
            }
            KeyCode::Char(c) => {
                self.prompt_input.push(c);
            }
            _ => {}
        }
    }

    fn move_selection(&mut self, delta: i32) {
        if self.focus == FocusPanel::Transcript {
            self.scroll_transcript(-delta);
            return;
        }
        let len = self.tracker.nodes().len();
        if len == 0 {
            return;
        }
        let new_idx = self.selected_index as i32 + delta;
        self.selected_index = new_idx.clamp(0, len as i32 - 1) as usize;
    }

    fn select_last(&mut self) {
        let len = self.tracker.nodes().len();
        if len > 0 {
            self.selected_index = len - 1;
        }
    }

    fn scroll_transcript(&mut self, delta: i32) {
        let max = self.transcript_line_count().saturating_sub(1);
        let next = self.transcript_scroll as i64 + i64::from(delta);
        self.transcript_scroll = next.clamp(0, max as i64) as usize;
    }

    fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            FocusPanel::Graph => FocusPanel::Transcript,
            FocusPanel::Transcript => FocusPanel::Graph,
        };
    }

    fn log_event(&mut self, name: &str) {
        let Some(ref mut writer) = self.event_log else {
            return;
        };
        let current = self.tracker.current_agent_id().unwrap_or("-");
        let _ = writeln!(
            writer,
            "[{}] event={} current={} nodes={} stack={}",
            chrono::Utc::now().to_rfc3339(),
            name,
            current,
            self.tracker.nodes().len(),
            self.tracker.ancestor_stack().len(),
        );
        let _ = writer.flush();
    }
}

#[cfg(test)]
#[path = "../tests/helpers/mod.rs"]
#[allow(dead_code)]
mod helpers;
