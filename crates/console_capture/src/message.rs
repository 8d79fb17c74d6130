use serde::{Deserialize, Serialize};

/// Placeholder content reported for writes that carried no text.
pub const EMPTY_LINE: &str = "<empty line>";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Output,
    Error,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Output => "output",
            Channel::Error => "error",
        }
    }
}

/// One report message handed to the transport per flushed batch (or per
/// record when trace capture is on).
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConsoleLog {
    pub channel: Channel,
    pub content: String,
    pub task_id: String,
    /// Milliseconds since the Unix epoch.
    pub time: u64,
    /// Record count for coalesced messages, character count in trace mode.
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_field_names() {
        let log = UserConsoleLog {
            channel: Channel::Error,
            content: "boom".to_string(),
            task_id: "suite-1".to_string(),
            time: 42,
            size: 1,
            origin: None,
        };

        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value["channel"], "error");
        assert_eq!(value["taskId"], "suite-1");
        assert_eq!(value["time"], 42);
        assert!(value.get("origin").is_none());
    }

    #[test]
    fn origin_is_present_when_captured() {
        let log = UserConsoleLog {
            channel: Channel::Output,
            content: "hi".to_string(),
            task_id: "t".to_string(),
            time: 1,
            size: 2,
            origin: Some("    at caller (src/lib.rs:1:1)".to_string()),
        };

        let text = serde_json::to_string(&log).unwrap();
        assert!(text.contains(r#""origin":"    at caller (src/lib.rs:1:1)""#));
        assert!(text.contains(r#""channel":"output""#));
    }
}
