use crate::ingest::{BackendMessage, EventSource, SessionEvent};
use crate::transcript::MessageKind;

/// A user prompt event.
pub fn prompt(text: &str) -> SessionEvent {
    SessionEvent::UserSendPrompt {
        text: text.to_string(),
    }
}

/// A fresh sub-agent invocation.
pub fn invocation(agent: &str, session: &str, prompt: &str) -> SessionEvent {
    SessionEvent::SubAgentInvocation {
        agent_name: agent.to_string(),
        session_id: session.to_string(),
        prompt: prompt.to_string(),
        is_new_session: true,
    }
}

pub fn response(session: &str, text: &str) -> SessionEvent {
    SessionEvent::SubAgentResponse {
        agent_name: None,
        session_id: session.to_string(),
        response: text.to_string(),
    }
}

/// A plain agent response message.
pub fn agent_text(text: &str) -> SessionEvent {
    SessionEvent::Message(BackendMessage {
        kind: MessageKind::Agent,
        content: text.to_string(),
    })
}

/// Hands out its events once, then nothing.
pub struct VecSource(pub Vec<SessionEvent>);

impl EventSource for VecSource {
    fn poll_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.0)
    }
}

/// Build a sidecar `message` frame with a sub_agent payload.
pub fn frame_sub_agent(agent: &str, session: &str, prompt: &str) -> String {
    format!(
        r#"{{"event":"message","data":{{"type":"sub_agent","agent_name":"{agent}","prompt":"{prompt}","session_id":"{session}","is_new_session":true,"content":"[{agent}] {prompt}..."}}}}"#
    )
}

/// Build a sidecar `message` frame with a sub_agent_response payload.
pub fn frame_sub_agent_response(agent: &str, session: &str, response: &str) -> String {
    format!(
        r#"{{"event":"message","data":{{"type":"sub_agent_response","agent_name":"{agent}","session_id":"{session}","response":"{response}","content":"{response}"}}}}"#
    )
}
