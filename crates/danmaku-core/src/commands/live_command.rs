//! Tagged union over the `cmd` field of a live room packet

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::entities::DanmakuRecord;

/// Chat message command
pub const CMD_DANMU_MSG: &str = "DANMU_MSG";
/// Viewer count change command
pub const CMD_WATCHED_CHANGE: &str = "WATCHED_CHANGE";
/// Viewer interaction (enter room, follow, share) command
pub const CMD_INTERACT_WORD: &str = "INTERACT_WORD";

/// Errors while interpreting a packet body
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Packet is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed {cmd} packet: {reason}")]
    Malformed { cmd: &'static str, reason: &'static str },
}

/// A chat message sent by a viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanmakuMessage {
    pub sender_uid: i64,
    pub sender_name: String,
    pub content: String,
    /// Send time in seconds since the Unix epoch
    pub timestamp: i64,
}

/// Viewer count update
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchedChange {
    #[serde(default)]
    pub num: u64,
    #[serde(default)]
    pub text_small: String,
    #[serde(default)]
    pub text_large: String,
}

/// Viewer interaction notice
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InteractWord {
    #[serde(default)]
    pub uid: i64,
    #[serde(default)]
    pub uname: String,
    #[serde(default)]
    pub roomid: i64,
    #[serde(default)]
    pub msg_type: i64,
    #[serde(default)]
    pub timestamp: i64,
}

/// Known live room commands
#[derive(Debug, Clone, PartialEq)]
pub enum LiveCommand {
    Danmaku(DanmakuMessage),
    WatchedChange(WatchedChange),
    InteractWord(InteractWord),
    /// Any other command, or a known command without the expected `data` shape
    Unrecognized { cmd: Option<String>, raw: String },
}

impl LiveCommand {
    /// Parse a raw packet body
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value, raw)
    }

    /// Interpret an already parsed packet body.
    ///
    /// Only chat messages are strict: a `DANMU_MSG` whose `info` array does not
    /// carry sender and content is an error, since those fields are persisted.
    pub fn from_value(value: &Value, raw: &str) -> Result<Self, CommandError> {
        let Some(cmd) = value.get("cmd").and_then(Value::as_str) else {
            return Ok(Self::unrecognized(None, raw));
        };

        if is_danmaku_cmd(cmd) {
            return DanmakuMessage::from_info(value.get("info")).map(Self::Danmaku);
        }

        let data = value.get("data").cloned().unwrap_or(Value::Null);
        let parsed = match cmd {
            CMD_WATCHED_CHANGE => serde_json::from_value(data).ok().map(Self::WatchedChange),
            CMD_INTERACT_WORD => serde_json::from_value(data).ok().map(Self::InteractWord),
            _ => None,
        };

        Ok(parsed.unwrap_or_else(|| Self::unrecognized(Some(cmd), raw)))
    }

    fn unrecognized(cmd: Option<&str>, raw: &str) -> Self {
        Self::Unrecognized {
            cmd: cmd.map(str::to_string),
            raw: raw.to_string(),
        }
    }

    /// Command name for logging
    pub fn cmd(&self) -> &str {
        match self {
            Self::Danmaku(_) => CMD_DANMU_MSG,
            Self::WatchedChange(_) => CMD_WATCHED_CHANGE,
            Self::InteractWord(_) => CMD_INTERACT_WORD,
            Self::Unrecognized { cmd, .. } => cmd.as_deref().unwrap_or("<none>"),
        }
    }

    /// Check if this is a chat message
    #[inline]
    pub fn is_danmaku(&self) -> bool {
        matches!(self, Self::Danmaku(_))
    }
}

/// The gateway may suffix the command with protocol flags, e.g. `DANMU_MSG:4:0:2:2:2:0`
fn is_danmaku_cmd(cmd: &str) -> bool {
    cmd == CMD_DANMU_MSG
        || cmd
            .strip_prefix(CMD_DANMU_MSG)
            .is_some_and(|rest| rest.starts_with(':'))
}

impl DanmakuMessage {
    // info[1] = content, info[2] = [uid, uname, ...], info[9] = { ts, ct }
    fn from_info(info: Option<&Value>) -> Result<Self, CommandError> {
        let malformed = |reason| CommandError::Malformed {
            cmd: CMD_DANMU_MSG,
            reason,
        };

        let info = info
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("missing info array"))?;

        let content = info
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("info[1] is not a string"))?;

        let sender = info
            .get(2)
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("info[2] is not an array"))?;

        let sender_uid = sender
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| malformed("info[2][0] is not an integer"))?;

        let sender_name = sender
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("info[2][1] is not a string"))?;

        let timestamp = info
            .get(9)
            .and_then(|meta| meta.get("ts"))
            .and_then(Value::as_i64)
            .ok_or_else(|| malformed("info[9].ts is not an integer"))?;

        Ok(Self {
            sender_uid,
            sender_name: sender_name.to_string(),
            content: content.to_string(),
            timestamp,
        })
    }

    /// Build the persisted record for this message
    pub fn into_record(self, room_id: i64, raw: impl Into<String>) -> DanmakuRecord {
        DanmakuRecord {
            room_id,
            sender_uid: self.sender_uid,
            sender_name: self.sender_name,
            content: self.content,
            timestamp: self.timestamp,
            raw: raw.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn danmaku_packet() -> String {
        json!({
            "cmd": "DANMU_MSG",
            "info": [
                [0, 1, 25, 16_777_215, 1_700_000_000_123_i64, 0, 0, "abcd", 0, 0, 0, "", 0, "{}", "{}", {}],
                "hello world",
                [12345, "viewer", 0, 0, 0, 10000, 1, ""],
                [],
                [0, 0, 9_868_950, ">50000", 0],
                ["", ""],
                0,
                0,
                null,
                { "ts": 1_700_000_000, "ct": "ABCDEF" },
                0,
                0
            ]
        })
        .to_string()
    }

    #[test]
    fn test_parse_danmaku() {
        let raw = danmaku_packet();
        let command = LiveCommand::parse(&raw).unwrap();

        let LiveCommand::Danmaku(message) = command else {
            panic!("expected danmaku, got {command:?}");
        };
        assert_eq!(message.sender_uid, 12345);
        assert_eq!(message.sender_name, "viewer");
        assert_eq!(message.content, "hello world");
        assert_eq!(message.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_parse_danmaku_with_suffixed_cmd() {
        let raw = danmaku_packet().replace("\"DANMU_MSG\"", "\"DANMU_MSG:4:0:2:2:2:0\"");
        assert!(LiveCommand::parse(&raw).unwrap().is_danmaku());

        let lookalike = json!({"cmd": "DANMU_MSG_EXTRA", "info": []}).to_string();
        assert!(!LiveCommand::parse(&lookalike).unwrap().is_danmaku());
    }

    #[test]
    fn test_parse_malformed_danmaku() {
        let raw = json!({"cmd": "DANMU_MSG", "info": [[], "content only"]}).to_string();
        let err = LiveCommand::parse(&raw).unwrap_err();

        assert!(matches!(err, CommandError::Malformed { cmd: CMD_DANMU_MSG, .. }));
    }

    #[test]
    fn test_parse_watched_change() {
        let raw = json!({
            "cmd": "WATCHED_CHANGE",
            "data": {"num": 1234, "text_small": "1234", "text_large": "1234人看过"}
        })
        .to_string();

        let command = LiveCommand::parse(&raw).unwrap();
        assert_eq!(
            command,
            LiveCommand::WatchedChange(WatchedChange {
                num: 1234,
                text_small: "1234".to_string(),
                text_large: "1234人看过".to_string(),
            })
        );
        assert_eq!(command.cmd(), CMD_WATCHED_CHANGE);
    }

    #[test]
    fn test_parse_interact_word() {
        let raw = json!({
            "cmd": "INTERACT_WORD",
            "data": {"uid": 7, "uname": "someone", "roomid": 35298, "msg_type": 1, "timestamp": 1_700_000_000}
        })
        .to_string();

        let LiveCommand::InteractWord(word) = LiveCommand::parse(&raw).unwrap() else {
            panic!("expected interact word");
        };
        assert_eq!(word.uid, 7);
        assert_eq!(word.uname, "someone");
        assert_eq!(word.roomid, 35298);
    }

    #[test]
    fn test_unknown_cmd_preserves_raw() {
        let raw = r#"{"cmd":"SEND_GIFT","data":{"giftName":"x"}}"#;
        let command = LiveCommand::parse(raw).unwrap();

        assert_eq!(
            command,
            LiveCommand::Unrecognized {
                cmd: Some("SEND_GIFT".to_string()),
                raw: raw.to_string(),
            }
        );
        assert_eq!(command.cmd(), "SEND_GIFT");
    }

    #[test]
    fn test_missing_cmd_is_unrecognized() {
        let command = LiveCommand::parse(r#"{"code":0}"#).unwrap();
        assert_eq!(command.cmd(), "<none>");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            LiveCommand::parse("{not json").unwrap_err(),
            CommandError::Json(_)
        ));
    }

    #[test]
    fn test_into_record() {
        let message = DanmakuMessage {
            sender_uid: 1,
            sender_name: "a".to_string(),
            content: "b".to_string(),
            timestamp: 2,
        };
        let record = message.into_record(99, "{}");

        assert_eq!(record.room_id, 99);
        assert_eq!(record.sender_uid, 1);
        assert_eq!(record.raw, "{}");
    }
}
