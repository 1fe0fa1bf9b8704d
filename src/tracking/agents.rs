use chrono::{DateTime, Utc};

/// Lifecycle state of one agent execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentStatus {
    Running,
    Completed,
    Error,
}

impl AgentStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, AgentStatus::Running)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Running => write!(f, "running"),
            AgentStatus::Completed => write!(f, "completed"),
            AgentStatus::Error => write!(f, "error"),
        }
    }
}

/// One execution of one agent (the root conversation or a sub-agent invocation).
#[derive(Debug, Clone, PartialEq)]
pub struct AgentNode {
    pub id: String,
    /// Backend session identifier this node was invoked under. For the root
    /// this equals `id`; for a re-invoked session `id` carries a `#n` suffix.
    pub session_id: String,
    pub agent_name: String,
    pub parent_id: Option<String>,
    pub status: AgentStatus,
    pub prompt: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl AgentNode {
    pub fn new(
        id: String,
        session_id: String,
        agent_name: String,
        parent_id: Option<String>,
        prompt: String,
    ) -> Self {
        Self {
            id,
            session_id,
            agent_name,
            parent_id,
            status: AgentStatus::Running,
            prompt,
            start_time: Utc::now(),
            end_time: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Move a running node into a terminal state. Terminal nodes are left alone.
    pub(crate) fn finish(&mut self, status: AgentStatus) -> bool {
        if !self.status.is_running() {
            return false;
        }
        self.status = status;
        self.end_time = Some(Utc::now());
        true
    }

    /// Wall-clock run time, up to now while the node is still running.
    pub fn elapsed(&self) -> chrono::Duration {
        self.end_time.unwrap_or_else(Utc::now) - self.start_time
    }

    /// Prompt shortened for display, cut on a char boundary.
    pub fn prompt_preview(&self, max_chars: usize) -> String {
        truncate_chars(&self.prompt, max_chars)
    }
}

/// Truncate to at most `max_chars` characters, appending `…` when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let single_line = text.lines().next().unwrap_or("");
    let mut chars = single_line.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() || single_line.len() < text.trim_end().len() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_only_moves_running_nodes() {
        let mut node = AgentNode::new("a".into(), "a".into(), "coder".into(), None, "p".into());
        assert!(node.finish(AgentStatus::Completed));
        assert!(node.end_time.is_some());
        assert!(!node.finish(AgentStatus::Error));
        assert_eq!(node.status, AgentStatus::Completed);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo…");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("line one\nline two", 20), "line one…");
    }
}
