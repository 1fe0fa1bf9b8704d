//! Chat transcript with per-message agent attribution.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::tracking::AgentStamp;

/// What produced a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    User,
    Agent,
    Reasoning,
    SubAgentInvocation,
    SubAgentResponse,
    Shell,
    Diff,
    Text,
    System,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub kind: MessageKind,
    pub content: String,
    /// Agent that was current when the message was created. Copied, never
    /// looked up again, so clearing the tree does not rewrite history.
    pub agent: Option<AgentStamp>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(kind: MessageKind, content: impl Into<String>, agent: Option<AgentStamp>) -> Self {
        Self {
            kind,
            content: content.into(),
            agent,
            timestamp: Utc::now(),
        }
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent.as_ref().map(|a| a.agent_id.as_str())
    }
}

/// How a node selection narrows the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentFilter {
    /// Only messages stamped with exactly this agent.
    Agent(String),
    /// Messages stamped with any agent in the set (a node and its descendants).
    Subtree(HashSet<String>),
}

/// Messages stamped with `selected`, in original order. No selection is the identity.
pub fn filter_by_agent<'a>(messages: &'a [ChatMessage], selected: Option<&str>) -> Vec<&'a ChatMessage> {
    match selected {
        None => messages.iter().collect(),
        Some(id) => messages.iter().filter(|m| m.agent_id() == Some(id)).collect(),
    }
}

pub fn apply_filter<'a>(messages: &'a [ChatMessage], filter: Option<&AgentFilter>) -> Vec<&'a ChatMessage> {
    match filter {
        None => messages.iter().collect(),
        Some(AgentFilter::Agent(id)) => filter_by_agent(messages, Some(id)),
        Some(AgentFilter::Subtree(ids)) => messages
            .iter()
            .filter(|m| m.agent_id().is_some_and(|id| ids.contains(id)))
            .collect(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: MessageKind, content: impl Into<String>, agent: Option<AgentStamp>) {
        self.messages.push(ChatMessage::new(kind, content, agent));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn filtered(&self, filter: Option<&AgentFilter>) -> Vec<&ChatMessage> {
        apply_filter(&self.messages, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(id: &str) -> Option<AgentStamp> {
        Some(AgentStamp {
            agent_id: id.to_string(),
            agent_name: format!("agent-{id}"),
        })
    }

    fn sample() -> Vec<ChatMessage> {
        vec![
            ChatMessage::new(MessageKind::User, "0", stamp("a")),
            ChatMessage::new(MessageKind::Agent, "1", stamp("b")),
            ChatMessage::new(MessageKind::Text, "2", None),
            ChatMessage::new(MessageKind::Agent, "3", stamp("a")),
            ChatMessage::new(MessageKind::Agent, "4", stamp("c")),
            ChatMessage::new(MessageKind::Agent, "5", stamp("a")),
        ]
    }

    fn contents(msgs: &[&ChatMessage]) -> Vec<String> {
        msgs.iter().map(|m| m.content.clone()).collect()
    }

    #[test]
    fn filter_returns_ordered_subsequence() {
        let msgs = sample();
        assert_eq!(contents(&filter_by_agent(&msgs, Some("a"))), vec!["0", "3", "5"]);
        assert_eq!(contents(&filter_by_agent(&msgs, Some("c"))), vec!["4"]);
        assert!(filter_by_agent(&msgs, Some("zzz")).is_empty());
    }

    #[test]
    fn no_selection_is_identity() {
        let msgs = sample();
        let all = filter_by_agent(&msgs, None);
        assert_eq!(all.len(), msgs.len());
        assert!(all.iter().zip(msgs.iter()).all(|(a, b)| *a == b));
    }

    #[test]
    fn subtree_filter_matches_any_member() {
        let msgs = sample();
        let ids: HashSet<String> = ["b", "c"].iter().map(|s| s.to_string()).collect();
        let filter = AgentFilter::Subtree(ids);
        assert_eq!(contents(&apply_filter(&msgs, Some(&filter))), vec!["1", "4"]);
    }
}
