pub mod sidecar;

use thiserror::Error;

use crate::transcript::MessageKind;

/// One decoded event from the backend socket or from the local user.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SubAgentInvocation {
        agent_name: String,
        session_id: String,
        prompt: String,
        is_new_session: bool,
    },
    SubAgentResponse {
        agent_name: Option<String>,
        session_id: String,
        response: String,
    },
    TaskComplete,
    TaskError {
        message: String,
    },
    UserCancel,
    UserSendPrompt {
        text: String,
    },
    /// Any other chat message; it flows to the transcript, not the tree.
    Message(BackendMessage),
}

impl SessionEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SubAgentInvocation { .. } => "sub_agent_invocation",
            SessionEvent::SubAgentResponse { .. } => "sub_agent_response",
            SessionEvent::TaskComplete => "task_complete",
            SessionEvent::TaskError { .. } => "task_error",
            SessionEvent::UserCancel => "user_cancel",
            SessionEvent::UserSendPrompt { .. } => "user_send_prompt",
            SessionEvent::Message(_) => "message",
        }
    }
}

/// A transcript-only message from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendMessage {
    pub kind: MessageKind,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty line")]
    Empty,

    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame has no event name")]
    MissingEventName,

    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    #[error("malformed '{event}' payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{event}' frame is missing '{field}'")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },

    #[error("message of type '{0}' has nothing to display")]
    NoContent(String),
}

/// Something that yields newly arrived events when polled.
pub trait EventSource {
    fn poll_events(&mut self) -> Vec<SessionEvent>;
}
