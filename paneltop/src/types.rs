//! Types that mirror the daemon's WebSocket frames.
//! Frames are `{"event": "<name>", "args": [...]}`; everything is decoded into
//! [`ServerEvent`] here so malformed data never reaches the components.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event `{0}` is missing its argument")]
    MissingArg(&'static str),
    #[error("argument of `{0}` is not a string")]
    NotAString(&'static str),
    #[error("unknown power state `{0}`")]
    UnknownState(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Stats,
    ConsoleOutput,
    InstallOutput,
    InstallStarted,
    InstallCompleted,
    TransferLogs,
    TransferStatus,
    DaemonMessage,
    DaemonError,
    Status,
    AuthSuccess,
    TokenExpiring,
    TokenExpired,
    JwtError,
}

impl EventKind {
    pub fn from_wire(name: &str) -> Option<Self> {
        Some(match name {
            "stats" => Self::Stats,
            "console output" => Self::ConsoleOutput,
            "install output" => Self::InstallOutput,
            "install started" => Self::InstallStarted,
            "install completed" => Self::InstallCompleted,
            "transfer logs" => Self::TransferLogs,
            "transfer status" => Self::TransferStatus,
            "daemon message" => Self::DaemonMessage,
            "daemon error" => Self::DaemonError,
            "status" => Self::Status,
            "auth success" => Self::AuthSuccess,
            "token expiring" => Self::TokenExpiring,
            "token expired" => Self::TokenExpired,
            "jwt error" => Self::JwtError,
            _ => return None,
        })
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Stats => "stats",
            Self::ConsoleOutput => "console output",
            Self::InstallOutput => "install output",
            Self::InstallStarted => "install started",
            Self::InstallCompleted => "install completed",
            Self::TransferLogs => "transfer logs",
            Self::TransferStatus => "transfer status",
            Self::DaemonMessage => "daemon message",
            Self::DaemonError => "daemon error",
            Self::Status => "status",
            Self::AuthSuccess => "auth success",
            Self::TokenExpiring => "token expiring",
            Self::TokenExpired => "token expired",
            Self::JwtError => "jwt error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerStatus {
    Offline,
    Starting,
    Running,
    Stopping,
}

impl PowerStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "offline" => Some(Self::Offline),
            "starting" => Some(Self::Starting),
            "running" => Some(Self::Running),
            "stopping" => Some(Self::Stopping),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkCounters {
    // cumulative totals since the container started; consumers diff to get rates
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Body of a `stats` event. The daemon sends it JSON-encoded inside the
/// event argument.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StatsPayload {
    pub memory_bytes: u64,
    pub cpu_absolute: f64,
    pub disk_bytes: u64,
    pub network: NetworkCounters,
    #[serde(default)]
    pub uptime: u64,
}

impl StatsPayload {
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    Failure,
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Stats(StatsPayload),
    ConsoleOutput(String),
    InstallOutput(String),
    InstallStarted,
    InstallCompleted,
    TransferLogs(String),
    TransferStatus(TransferStatus),
    DaemonMessage(String),
    DaemonError(String),
    Status(PowerStatus),
    AuthSuccess,
    TokenExpiring,
    TokenExpired,
    JwtError(String),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    args: Vec<Value>,
}

fn string_arg(args: &[Value], event: &'static str) -> Result<String, DecodeError> {
    match args.first() {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(DecodeError::NotAString(event)),
        None => Err(DecodeError::MissingArg(event)),
    }
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Stats(_) => EventKind::Stats,
            Self::ConsoleOutput(_) => EventKind::ConsoleOutput,
            Self::InstallOutput(_) => EventKind::InstallOutput,
            Self::InstallStarted => EventKind::InstallStarted,
            Self::InstallCompleted => EventKind::InstallCompleted,
            Self::TransferLogs(_) => EventKind::TransferLogs,
            Self::TransferStatus(_) => EventKind::TransferStatus,
            Self::DaemonMessage(_) => EventKind::DaemonMessage,
            Self::DaemonError(_) => EventKind::DaemonError,
            Self::Status(_) => EventKind::Status,
            Self::AuthSuccess => EventKind::AuthSuccess,
            Self::TokenExpiring => EventKind::TokenExpiring,
            Self::TokenExpired => EventKind::TokenExpired,
            Self::JwtError(_) => EventKind::JwtError,
        }
    }

    /// Decode one text frame. `Ok(None)` means a well-formed frame for an
    /// event this client does not handle.
    pub fn decode(text: &str) -> Result<Option<Self>, DecodeError> {
        let frame: RawFrame = serde_json::from_str(text)?;
        let Some(kind) = EventKind::from_wire(&frame.event) else {
            return Ok(None);
        };
        let args = &frame.args;
        let ev = match kind {
            EventKind::Stats => {
                Self::Stats(StatsPayload::parse(&string_arg(args, "stats")?)?)
            }
            EventKind::ConsoleOutput => Self::ConsoleOutput(string_arg(args, "console output")?),
            EventKind::InstallOutput => Self::InstallOutput(string_arg(args, "install output")?),
            EventKind::InstallStarted => Self::InstallStarted,
            EventKind::InstallCompleted => Self::InstallCompleted,
            EventKind::TransferLogs => Self::TransferLogs(string_arg(args, "transfer logs")?),
            EventKind::TransferStatus => {
                let s = string_arg(args, "transfer status")?;
                Self::TransferStatus(if s == "failure" {
                    TransferStatus::Failure
                } else {
                    TransferStatus::Other(s)
                })
            }
            EventKind::DaemonMessage => Self::DaemonMessage(string_arg(args, "daemon message")?),
            EventKind::DaemonError => Self::DaemonError(string_arg(args, "daemon error")?),
            EventKind::Status => {
                let s = string_arg(args, "status")?;
                Self::Status(PowerStatus::parse(&s).ok_or(DecodeError::UnknownState(s))?)
            }
            EventKind::AuthSuccess => Self::AuthSuccess,
            EventKind::TokenExpiring => Self::TokenExpiring,
            EventKind::TokenExpired => Self::TokenExpired,
            EventKind::JwtError => Self::JwtError(string_arg(args, "jwt error").unwrap_or_default()),
        };
        Ok(Some(ev))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Start,
    Stop,
    Restart,
    Kill,
}

impl PowerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Kill => "kill",
        }
    }
}

/// Requests the client sends to the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundRequest {
    Auth(String),
    SendStats,
    SendLogs,
    SendCommand(String),
    SetState(PowerAction),
}

#[derive(Serialize)]
struct OutFrame<'a> {
    event: &'a str,
    args: [Option<&'a str>; 1],
}

impl OutboundRequest {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::SendStats => "send stats",
            Self::SendLogs => "send logs",
            Self::SendCommand(_) => "send command",
            Self::SetState(_) => "set state",
        }
    }

    pub fn encode(&self) -> String {
        let arg = match self {
            Self::Auth(t) => Some(t.as_str()),
            Self::SendCommand(c) => Some(c.as_str()),
            Self::SetState(a) => Some(a.as_str()),
            Self::SendStats | Self::SendLogs => None,
        };
        let frame = OutFrame {
            event: self.event_name(),
            args: [arg],
        };
        // Serializing a struct of &str never fails
        serde_json::to_string(&frame).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_stats_with_nested_json() {
        let inner = r#"{"memory_bytes":1048576,"cpu_absolute":12.5,"disk_bytes":2048,"network":{"rx_bytes":10,"tx_bytes":20},"uptime":5000}"#;
        let frame = serde_json::json!({"event": "stats", "args": [inner]}).to_string();
        let ev = ServerEvent::decode(&frame).unwrap().unwrap();
        match ev {
            ServerEvent::Stats(p) => {
                assert_eq!(p.memory_bytes, 1_048_576);
                assert_eq!(p.network.tx_bytes, 20);
                assert_eq!(p.uptime, 5000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_stats_missing_field() {
        let inner = r#"{"memory_bytes":1,"cpu_absolute":1.0,"network":{"rx_bytes":1,"tx_bytes":1}}"#;
        let frame = serde_json::json!({"event": "stats", "args": [inner]}).to_string();
        assert!(ServerEvent::decode(&frame).is_err());
    }

    #[test]
    fn decodes_status_and_rejects_unknown_state() {
        let ok = r#"{"event":"status","args":["stopping"]}"#;
        assert_eq!(
            ServerEvent::decode(ok).unwrap(),
            Some(ServerEvent::Status(PowerStatus::Stopping))
        );
        let bad = r#"{"event":"status","args":["exploded"]}"#;
        assert!(matches!(
            ServerEvent::decode(bad),
            Err(DecodeError::UnknownState(_))
        ));
    }

    #[test]
    fn unknown_event_is_ignored() {
        assert_eq!(ServerEvent::decode(r#"{"event":"mystery","args":[]}"#).unwrap(), None);
        assert_eq!(
            ServerEvent::decode(r#"{"event":"backup completed","args":["{}"]}"#).unwrap(),
            None
        );
    }

    #[test]
    fn install_lifecycle_events_decode() {
        assert_eq!(
            ServerEvent::decode(r#"{"event":"install started"}"#).unwrap(),
            Some(ServerEvent::InstallStarted)
        );
        assert_eq!(
            ServerEvent::decode(r#"{"event":"install completed","args":[]}"#).unwrap(),
            Some(ServerEvent::InstallCompleted)
        );
    }

    #[test]
    fn transfer_status_failure() {
        let f = r#"{"event":"transfer status","args":["failure"]}"#;
        assert_eq!(
            ServerEvent::decode(f).unwrap(),
            Some(ServerEvent::TransferStatus(TransferStatus::Failure))
        );
    }

    #[test]
    fn encodes_outbound_frames() {
        assert_eq!(
            OutboundRequest::SendCommand("say hi".into()).encode(),
            r#"{"event":"send command","args":["say hi"]}"#
        );
        assert_eq!(
            OutboundRequest::SendStats.encode(),
            r#"{"event":"send stats","args":[null]}"#
        );
        assert_eq!(
            OutboundRequest::SetState(PowerAction::Kill).encode(),
            r#"{"event":"set state","args":["kill"]}"#
        );
    }
}
