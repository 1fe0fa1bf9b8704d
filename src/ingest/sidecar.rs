use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use serde::Deserialize;
use serde_json::Value;

use crate::transcript::MessageKind;

use super::{BackendMessage, DecodeError, EventSource, SessionEvent};

/// Frame as captured from the sidecar socket: `{"event": ..., "data": {...}}`.
#[derive(Debug, Deserialize)]
struct Frame {
    event: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct SubAgentPayload {
    agent_name: String,
    session_id: String,
    #[serde(default)]
    prompt: String,
    #[serde(default = "default_true")]
    is_new_session: bool,
}

#[derive(Debug, Deserialize)]
struct SubAgentResponsePayload {
    #[serde(default)]
    agent_name: Option<String>,
    session_id: String,
    #[serde(default)]
    response: String,
}

fn default_true() -> bool {
    true
}

/// Decode a single JSONL frame.
pub fn decode_event(line: &str) -> Result<SessionEvent, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(DecodeError::Empty);
    }
    let frame: Frame = serde_json::from_str(line)?;
    let event = frame.event.ok_or(DecodeError::MissingEventName)?;

    match event.as_str() {
        "message" => decode_message(frame.data),
        "sub_agent_invocation" => decode_invocation(frame.data),
        "sub_agent_response" => decode_response(frame.data),
        "task_complete" => Ok(SessionEvent::TaskComplete),
        "error" | "task_error" => {
            let message = str_field(&frame.data, "message")
                .unwrap_or("Unknown error")
                .to_string();
            Ok(SessionEvent::TaskError { message })
        }
        "prompt" | "user_send_prompt" => {
            let text = str_field(&frame.data, "text").ok_or(DecodeError::MissingField {
                event: "user_send_prompt",
                field: "text",
            })?;
            Ok(SessionEvent::UserSendPrompt {
                text: text.to_string(),
            })
        }
        "cancel" | "user_cancel" => Ok(SessionEvent::UserCancel),
        _ => Err(DecodeError::UnknownEvent(event)),
    }
}

fn decode_invocation(data: Value) -> Result<SessionEvent, DecodeError> {
    let p: SubAgentPayload = serde_json::from_value(data).map_err(|source| DecodeError::Payload {
        event: "sub_agent_invocation",
        source,
    })?;
    Ok(SessionEvent::SubAgentInvocation {
        agent_name: p.agent_name,
        session_id: p.session_id,
        prompt: p.prompt,
        is_new_session: p.is_new_session,
    })
}

fn decode_response(data: Value) -> Result<SessionEvent, DecodeError> {
    let p: SubAgentResponsePayload =
        serde_json::from_value(data).map_err(|source| DecodeError::Payload {
            event: "sub_agent_response",
            source,
        })?;
    Ok(SessionEvent::SubAgentResponse {
        agent_name: p.agent_name,
        session_id: p.session_id,
        response: p.response,
    })
}

/// Map a `message` frame by its `data.type`.
fn decode_message(data: Value) -> Result<SessionEvent, DecodeError> {
    let msg_type = str_field(&data, "type").unwrap_or("text").to_string();
    let content = str_field(&data, "content").map(str::to_string);

    let (kind, content) = match msg_type.as_str() {
        "sub_agent" => return decode_invocation(data),
        "sub_agent_response" => return decode_response(data),

        "text" => {
            let kind = match str_field(&data, "level") {
                Some("error") => MessageKind::Error,
                _ => MessageKind::Text,
            };
            (kind, content)
        }
        "agent_response" => (MessageKind::Agent, content),
        "reasoning" => {
            let steps = str_field(&data, "next_steps").filter(|s| !s.is_empty());
            let body = match (content, steps) {
                (Some(c), Some(s)) => Some(format!("{c}\n\nNext: {s}")),
                (c, _) => c,
            };
            (MessageKind::Reasoning, body)
        }
        "shell_start" => {
            let command = str_field(&data, "command").unwrap_or("");
            (MessageKind::Shell, Some(format!("$ {command}")))
        }
        "shell_output" => {
            let stdout = str_field(&data, "stdout").unwrap_or("");
            let stderr = str_field(&data, "stderr").unwrap_or("");
            let body = content.unwrap_or_else(|| format!("{stdout}{stderr}"));
            (MessageKind::Shell, Some(body))
        }
        "diff" => {
            let path = str_field(&data, "path").unwrap_or("?");
            let body = content.map(|c| format!("{path}\n{c}"));
            (MessageKind::Diff, body)
        }
        "status" => (MessageKind::System, content),
        "grep_result" => {
            let term = str_field(&data, "search_term").unwrap_or("");
            let dir = str_field(&data, "directory").unwrap_or(".");
            let matches = num_field(&data, "total_matches");
            let files = num_field(&data, "files_searched");
            (
                MessageKind::Shell,
                Some(format!("grep '{term}' in {dir}: {matches} matches in {files} files")),
            )
        }
        "file_listing" => {
            let dir = str_field(&data, "directory").unwrap_or(".");
            let files = num_field(&data, "file_count");
            let dirs = num_field(&data, "dir_count");
            (MessageKind::Shell, Some(format!("ls {dir}: {files} files, {dirs} dirs")))
        }
        "status_panel" => (MessageKind::System, status_panel_text(&data)),
        "divider" => (MessageKind::Text, Some("─".repeat(40))),
        // Spinner frames are UI chatter, not transcript content.
        "spinner" => (MessageKind::Text, None),
        _ => {
            let fallback = content.or_else(|| str_field(&data, "text").map(str::to_string));
            (MessageKind::Text, fallback)
        }
    };

    match content {
        Some(content) if !content.is_empty() => Ok(SessionEvent::Message(BackendMessage { kind, content })),
        _ => Err(DecodeError::NoContent(msg_type)),
    }
}

fn str_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(|v| v.as_str())
}

fn num_field(data: &Value, key: &str) -> u64 {
    data.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// Title line followed by one `key: value` line per field.
fn status_panel_text(data: &Value) -> Option<String> {
    let mut lines: Vec<String> = str_field(data, "title").map(str::to_string).into_iter().collect();
    if let Some(fields) = data.get("fields").and_then(Value::as_object) {
        for (key, value) in fields {
            match value.as_str() {
                Some(text) => lines.push(format!("{key}: {text}")),
                None => lines.push(format!("{key}: {value}")),
            }
        }
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// Parse every decodable event from a capture file, in file order.
pub fn parse_event_file(path: &Path) -> Result<Vec<SessionEvent>> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read event capture {}", path.display()))?;
    Ok(decode_lines(&text))
}

fn decode_lines(text: &str) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    for (n, line) in text.lines().enumerate() {
        match decode_event(line) {
            Ok(event) => events.push(event),
            Err(DecodeError::Empty) => {}
            Err(e) => tracing::debug!(line = n + 1, error = %e, "skipping frame"),
        }
    }
    events
}

/// Incrementally tails an event capture, tracking the read position.
///
/// Only newline-terminated lines are decoded; a trailing partial frame is
/// held back until the writer finishes it.
pub struct EventTailer {
    path: PathBuf,
    position: u64,
    // Raw bytes after the last newline; may end inside a UTF-8 sequence.
    pending: Vec<u8>,
}

impl EventTailer {
    /// Start at the beginning of the file (replay) or at its current end
    /// (only frames written from now on).
    pub fn new(path: PathBuf, from_start: bool) -> Self {
        let position = if from_start {
            0
        } else {
            fs::metadata(&path).map(|m| m.len()).unwrap_or(0)
        };
        Self {
            path,
            position,
            pending: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode whatever complete frames arrived since the last call.
    pub fn read_new_events(&mut self) -> Vec<SessionEvent> {
        let current_len = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(_) => return Vec::new(),
        };

        if current_len < self.position {
            tracing::info!(path = %self.path.display(), "capture truncated, rereading from start");
            self.position = 0;
            self.pending.clear();
        }
        if current_len == self.position {
            return Vec::new();
        }

        let mut file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot open capture");
                return Vec::new();
            }
        };
        if file.seek(SeekFrom::Start(self.position)).is_err() {
            return Vec::new();
        }
        let mut chunk = Vec::new();
        let read = match file.take(current_len - self.position).read_to_end(&mut chunk) {
            Ok(n) => n,
            Err(_) => return Vec::new(),
        };
        self.position += read as u64;
        self.pending.extend_from_slice(&chunk);

        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
        match String::from_utf8(complete) {
            Ok(text) => decode_lines(&text),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "capture holds invalid UTF-8");
                decode_lines(&String::from_utf8_lossy(e.as_bytes()))
            }
        }
    }
}

impl EventSource for EventTailer {
    fn poll_events(&mut self) -> Vec<SessionEvent> {
        self.read_new_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn decodes_sub_agent_message() {
        let line = r#"{"event":"message","data":{"type":"sub_agent","agent_name":"coder","prompt":"write tests","session_id":"s-1","is_new_session":false,"content":"[coder] write tests..."}}"#;
        let event = decode_event(line).unwrap();
        assert_eq!(
            event,
            SessionEvent::SubAgentInvocation {
                agent_name: "coder".into(),
                session_id: "s-1".into(),
                prompt: "write tests".into(),
                is_new_session: false,
            }
        );
    }

    #[test]
    fn decodes_direct_response_frame() {
        let line = r#"{"event":"sub_agent_response","data":{"session_id":"s-1","response":"done"}}"#;
        match decode_event(line).unwrap() {
            SessionEvent::SubAgentResponse { session_id, response, agent_name } => {
                assert_eq!(session_id, "s-1");
                assert_eq!(response, "done");
                assert!(agent_name.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decodes_control_frames() {
        assert_eq!(decode_event(r#"{"event":"task_complete","data":{}}"#).unwrap(), SessionEvent::TaskComplete);
        assert_eq!(decode_event(r#"{"event":"cancel"}"#).unwrap(), SessionEvent::UserCancel);
        assert_eq!(
            decode_event(r#"{"event":"error","data":{"message":"boom"}}"#).unwrap(),
            SessionEvent::TaskError { message: "boom".into() }
        );
        assert_eq!(
            decode_event(r#"{"event":"prompt","data":{"text":"hi","images":[]}}"#).unwrap(),
            SessionEvent::UserSendPrompt { text: "hi".into() }
        );
    }

    #[test]
    fn maps_message_kinds() {
        let shell = decode_event(r#"{"event":"message","data":{"type":"shell_start","command":"ls"}}"#).unwrap();
        assert_eq!(
            shell,
            SessionEvent::Message(BackendMessage { kind: MessageKind::Shell, content: "$ ls".into() })
        );
        let err = decode_event(r#"{"event":"message","data":{"type":"text","content":"bad","level":"error"}}"#).unwrap();
        assert!(matches!(err, SessionEvent::Message(BackendMessage { kind: MessageKind::Error, .. })));
        let generic = decode_event(r#"{"event":"message","data":{"type":"custom_widget","text":"hello"}}"#).unwrap();
        assert!(matches!(generic, SessionEvent::Message(BackendMessage { kind: MessageKind::Text, .. })));
    }

    #[test]
    fn summarises_structured_tool_frames() {
        let grep = r#"{"event":"message","data":{"type":"grep_result","search_term":"fn main","directory":"src","matches":[{"file_path":"src/main.rs","line_number":1,"line_content":"fn main() {"}],"total_matches":1,"files_searched":12}}"#;
        assert_eq!(
            decode_event(grep).unwrap(),
            SessionEvent::Message(BackendMessage {
                kind: MessageKind::Shell,
                content: "grep 'fn main' in src: 1 matches in 12 files".into(),
            })
        );

        let listing = r#"{"event":"message","data":{"type":"file_listing","directory":"src","files":[],"recursive":true,"total_size":2048,"dir_count":2,"file_count":7}}"#;
        assert_eq!(
            decode_event(listing).unwrap(),
            SessionEvent::Message(BackendMessage {
                kind: MessageKind::Shell,
                content: "ls src: 7 files, 2 dirs".into(),
            })
        );

        let panel = r#"{"event":"message","data":{"type":"status_panel","title":"Model","fields":{"name":"gpt","tokens":120}}}"#;
        match decode_event(panel).unwrap() {
            SessionEvent::Message(BackendMessage { kind, content }) => {
                assert_eq!(kind, MessageKind::System);
                assert_eq!(content, "Model\nname: gpt\ntokens: 120");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_frames() {
        assert!(matches!(decode_event("   "), Err(DecodeError::Empty)));
        assert!(matches!(decode_event("{not json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode_event(r#"{"data":{}}"#), Err(DecodeError::MissingEventName)));
        assert!(matches!(decode_event(r#"{"event":"oauth_status"}"#), Err(DecodeError::UnknownEvent(_))));
        assert!(matches!(
            decode_event(r#"{"event":"sub_agent_response","data":{"response":"x"}}"#),
            Err(DecodeError::Payload { .. })
        ));
        assert!(matches!(
            decode_event(r#"{"event":"message","data":{"type":"spinner","action":"start"}}"#),
            Err(DecodeError::NoContent(_))
        ));
        assert!(matches!(
            decode_event(r#"{"event":"prompt","data":{}}"#),
            Err(DecodeError::MissingField { .. })
        ));
    }

    #[test]
    fn parse_event_file_skips_garbage() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, r#"{{"event":"prompt","data":{{"text":"go"}}}}"#).unwrap();
        writeln!(tmp, "garbage").unwrap();
        writeln!(tmp).unwrap();
        writeln!(tmp, r#"{{"event":"task_complete","data":{{}}}}"#).unwrap();
        tmp.flush().unwrap();

        let events = parse_event_file(tmp.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert!(parse_event_file(Path::new("/definitely/not/here.jsonl")).is_err());
    }

    #[test]
    fn tailer_holds_back_partial_lines() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, r#"{{"event":"prompt","data":{{"text":"old"}}}}"#).unwrap();
        tmp.flush().unwrap();

        let mut tailer = EventTailer::new(tmp.path().to_path_buf(), false);
        assert!(tailer.read_new_events().is_empty());

        write!(tmp, r#"{{"event":"task_com"#).unwrap();
        tmp.flush().unwrap();
        assert!(tailer.read_new_events().is_empty());

        writeln!(tmp, r#"plete","data":{{}}}}"#).unwrap();
        tmp.flush().unwrap();
        assert_eq!(tailer.poll_events(), vec![SessionEvent::TaskComplete]);
        assert!(tailer.read_new_events().is_empty());
    }

    #[test]
    fn tailer_keeps_multibyte_chars_split_across_polls() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let mut tailer = EventTailer::new(tmp.path().to_path_buf(), true);

        let frame = "{\"event\":\"prompt\",\"data\":{\"text\":\"h\u{e9}llo\"}}\n".as_bytes();
        let split = frame.iter().position(|&b| b == 0xC3).unwrap() + 1;
        tmp.write_all(&frame[..split]).unwrap();
        tmp.flush().unwrap();
        assert!(tailer.read_new_events().is_empty());

        tmp.write_all(&frame[split..]).unwrap();
        tmp.flush().unwrap();
        assert_eq!(
            tailer.read_new_events(),
            vec![SessionEvent::UserSendPrompt { text: "héllo".into() }]
        );
    }

    #[test]
    fn tailer_from_start_replays() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, r#"{{"event":"prompt","data":{{"text":"old"}}}}"#).unwrap();
        tmp.flush().unwrap();
        let mut tailer = EventTailer::new(tmp.path().to_path_buf(), true);
        assert_eq!(tailer.read_new_events().len(), 1);
    }
}
