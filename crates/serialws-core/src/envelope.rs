//! Outbound envelopes written back to clients.
//!
//! Two shapes besides [`crate::SerialEvent`]:
//!
//! - `{"type": "result", "action", "success", "msg"}` answers every command.
//! - `{"type": "error", "msg"}` reports protocol failures (bad JSON, socket errors).

use serde::{Deserialize, Serialize};

/// Synchronous receipt of a session operation.
///
/// `success: true` only means the request was submitted; completion is
/// reported later through the event stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether the request passed its preconditions.
    pub success: bool,
    /// Human-readable status or error detail.
    pub msg: String,
}

impl CommandResult {
    /// A submitted request.
    pub fn accepted(msg: impl Into<String>) -> Self {
        Self {
            success: true,
            msg: msg.into(),
        }
    }

    /// A request rejected before any side effect.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: msg.into(),
        }
    }
}

/// `{"type": "result", ...}` reply to one command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    #[serde(rename = "type")]
    kind: String,
    /// Echo of the request's `action`; absent when the request had none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// See [`CommandResult::success`].
    pub success: bool,
    /// See [`CommandResult::msg`].
    pub msg: String,
}

impl ResultEnvelope {
    /// Wrap a receipt, echoing the request's action.
    pub fn new(action: Option<String>, result: CommandResult) -> Self {
        Self {
            kind: "result".into(),
            action,
            success: result.success,
            msg: result.msg,
        }
    }

    /// Serialize to the outbound JSON text.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// `{"type": "error", "msg"}` protocol failure notice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "type")]
    kind: String,
    /// Error detail.
    pub msg: String,
}

impl ErrorEnvelope {
    /// Build an error notice.
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            kind: "error".into(),
            msg: msg.into(),
        }
    }

    /// Serialize to the outbound JSON text.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_envelope_shape() {
        let env = ResultEnvelope::new(Some("open".into()), CommandResult::accepted("opening..."));
        let value: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "result", "action": "open", "success": true, "msg": "opening..."})
        );
    }

    #[test]
    fn result_envelope_without_action_omits_field() {
        let env = ResultEnvelope::new(None, CommandResult::rejected("unknown action"));
        let value = serde_json::to_value(&env).unwrap();
        assert!(value.get("action").is_none());
        assert_eq!(value["success"], false);
    }

    #[test]
    fn error_envelope_shape() {
        let env = ErrorEnvelope::new("expected value at line 1 column 1");
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(
            value,
            json!({"type": "error", "msg": "expected value at line 1 column 1"})
        );
    }

    #[test]
    fn command_result_constructors() {
        assert!(CommandResult::accepted("ok").success);
        assert!(!CommandResult::rejected("no").success);
    }
}
