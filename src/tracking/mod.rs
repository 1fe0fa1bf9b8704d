pub mod agents;
pub mod status;

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, warn};

pub use agents::{AgentNode, AgentStatus};
pub use status::VisualStatus;

/// Point-in-time copy of the current agent, attached to transcript messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStamp {
    pub agent_id: String,
    pub agent_name: String,
}

/// Payload of a sub-agent invocation event.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub agent_name: String,
    pub session_id: String,
    pub prompt: String,
}

/// Live tree of agent executions plus the "current agent" cursor.
///
/// Nodes are kept in insertion order. The cursor moves down on every
/// invocation (the previous current agent is pushed on the ancestor stack)
/// and back up on every response (the stack is popped).
#[derive(Debug, Clone, Default)]
pub struct AgentTracker {
    nodes: Vec<AgentNode>,
    current_agent_id: Option<String>,
    ancestor_stack: Vec<String>,
}

impl AgentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[AgentNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&AgentNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn current_agent_id(&self) -> Option<&str> {
        self.current_agent_id.as_deref()
    }

    pub fn ancestor_stack(&self) -> &[String] {
        &self.ancestor_stack
    }

    /// Drop the whole tree and start over with a fresh root.
    pub fn start_new_conversation(&mut self, agent_name: &str, prompt: &str) -> &AgentNode {
        self.nodes.clear();
        self.ancestor_stack.clear();

        let id = uuid::Uuid::new_v4().to_string();
        debug!(root = %id, agent = agent_name, "starting new conversation");
        self.current_agent_id = Some(id.clone());
        self.push_node(AgentNode::new(
            id.clone(),
            id,
            agent_name.to_string(),
            None,
            prompt.to_string(),
        ))
    }

    /// Reopen the completed root for a follow-up prompt. Returns `false` when
    /// there is no root, or the root ended in error (a terminal state).
    pub fn continue_conversation(&mut self) -> bool {
        let Some(root) = self.nodes.iter_mut().find(|n| n.is_root()) else {
            debug!("continue_conversation with empty tree");
            return false;
        };
        if root.status == AgentStatus::Error {
            warn!(root = %root.id, "refusing to continue a conversation whose root failed");
            return false;
        }

        root.status = AgentStatus::Running;
        root.end_time = None;
        root.start_time = Utc::now();
        self.current_agent_id = Some(root.id.clone());
        self.ancestor_stack.clear();
        debug!(root = %root.id, "continuing conversation");
        true
    }

    /// Enter a sub-agent: the new node hangs under the current agent, which
    /// now waits on it.
    pub fn record_invocation(&mut self, invocation: Invocation) -> &AgentNode {
        let parent_id = self.current_agent_id.take();
        if parent_id.is_none() {
            warn!(
                session = %invocation.session_id,
                "sub-agent invoked with no current agent; recording as a root"
            );
        }

        let id = self.unique_id_for(&invocation.session_id);
        if let Some(ref parent) = parent_id {
            self.ancestor_stack.push(parent.clone());
        }
        self.current_agent_id = Some(id.clone());
        debug!(node = %id, agent = %invocation.agent_name, parent = ?parent_id, "sub-agent invoked");

        self.push_node(AgentNode::new(
            id,
            invocation.session_id,
            invocation.agent_name,
            parent_id,
            invocation.prompt,
        ))
    }

    /// Return from a sub-agent. The ancestor stack is popped even when the
    /// session is unknown so that an out-of-order event cannot strand the cursor.
    pub fn record_response(&mut self, session_id: &str) {
        match self.response_target(session_id) {
            Some(idx) => {
                let node = &mut self.nodes[idx];
                if node.finish(AgentStatus::Completed) {
                    debug!(node = %node.id, "sub-agent responded");
                } else {
                    debug!(node = %node.id, status = %node.status, "response for a finished node");
                }
            }
            None => warn!(session = session_id, "response for unknown session"),
        }
        self.current_agent_id = self.ancestor_stack.pop();
    }

    pub fn mark_current_as_error(&mut self) {
        let Some(current) = self.current_agent_id.clone() else {
            return;
        };
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == current) {
            if node.finish(AgentStatus::Error) {
                debug!(node = %node.id, "current agent failed");
            }
        }
    }

    /// Every open node is a casualty of a cancellation, not just the innermost.
    pub fn mark_all_running_as_error(&mut self) -> usize {
        self.finish_all_running(AgentStatus::Error)
    }

    /// Close out every node still open when the backend reports completion.
    pub fn mark_all_running_as_completed(&mut self) -> usize {
        self.finish_all_running(AgentStatus::Completed)
    }

    pub fn root_agent_id(&self) -> Option<&str> {
        self.root().map(|n| n.id.as_str())
    }

    pub fn root(&self) -> Option<&AgentNode> {
        self.nodes.iter().find(|n| n.is_root())
    }

    pub fn current_agent(&self) -> Option<&AgentNode> {
        self.current_agent_id.as_deref().and_then(|id| self.node(id))
    }

    pub fn current_agent_name(&self) -> Option<&str> {
        self.current_agent().map(|n| n.agent_name.as_str())
    }

    /// True when there is a finished conversation that a new prompt can resume.
    pub fn has_active_conversation(&self) -> bool {
        self.root()
            .is_some_and(|root| root.status == AgentStatus::Completed)
    }

    /// Snapshot of the current agent for stamping transcript messages.
    pub fn stamp(&self) -> Option<AgentStamp> {
        self.current_agent().map(|n| AgentStamp {
            agent_id: n.id.clone(),
            agent_name: n.agent_name.clone(),
        })
    }

    pub fn visual_status(&self, node: &AgentNode) -> VisualStatus {
        VisualStatus::project(node.status, self.current_agent_id() == Some(node.id.as_str()))
    }

    pub fn children_of(&self, agent_id: &str) -> Vec<&AgentNode> {
        self.nodes
            .iter()
            .filter(|n| n.parent_id.as_deref() == Some(agent_id))
            .collect()
    }

    /// The node and all of its descendants. Walks with an explicit frontier
    /// and visited set, so a cyclic `parent_id` chain still terminates.
    pub fn subtree_ids(&self, agent_id: &str) -> HashSet<String> {
        let mut visited = HashSet::new();
        if self.node(agent_id).is_none() {
            return visited;
        }
        let mut frontier = vec![agent_id.to_string()];
        while let Some(id) = frontier.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            for child in self.children_of(&id) {
                if !visited.contains(&child.id) {
                    frontier.push(child.id.clone());
                }
            }
        }
        visited
    }

    /// Chain of ancestors from the node's parent up to its root, stopping at a
    /// dangling parent or a repeated id.
    pub fn ancestors_of(&self, agent_id: &str) -> Vec<&AgentNode> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(agent_id.to_string());
        let mut cursor = self.node(agent_id).and_then(|n| n.parent_id.as_deref());
        while let Some(parent_id) = cursor {
            if !visited.insert(parent_id.to_string()) {
                break;
            }
            let Some(parent) = self.node(parent_id) else {
                break;
            };
            chain.push(parent);
            cursor = parent.parent_id.as_deref();
        }
        chain
    }

    fn finish_all_running(&mut self, status: AgentStatus) -> usize {
        let count = self
            .nodes
            .iter_mut()
            .map(|n| n.finish(status))
            .filter(|changed| *changed)
            .count();
        debug!(count, %status, "bulk transition of running agents");
        count
    }

    fn push_node(&mut self, node: AgentNode) -> &AgentNode {
        self.nodes.push(node);
        &self.nodes[self.nodes.len() - 1]
    }

    /// Session ids are reused when the backend resumes an existing sub-agent
    /// session; later runs get a `#n` suffix so node ids stay unique.
    fn unique_id_for(&self, session_id: &str) -> String {
        if self.node(session_id).is_none() {
            return session_id.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{session_id}#{n}");
            if self.node(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Most recent running node for the session, else the most recent node.
    fn response_target(&self, session_id: &str) -> Option<usize> {
        let matching = || {
            self.nodes
                .iter()
                .enumerate()
                .rev()
                .filter(|(_, n)| n.session_id == session_id)
        };
        matching()
            .find(|(_, n)| n.status.is_running())
            .or_else(|| matching().next())
            .map(|(idx, _)| idx)
    }
}
