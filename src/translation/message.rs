//! 运行时消息
//!
//! 宿主发送 `{"action": "convert"}` 要求立即重新执行一次完整激活。

use serde::{Deserialize, Serialize};

/// 手动触发的动作名
pub const CONVERT_ACTION: &str = "convert";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuntimeMessage {
    pub action: String,
}

impl RuntimeMessage {
    pub fn convert() -> Self {
        Self {
            action: CONVERT_ACTION.to_string(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_convert(&self) -> bool {
        self.action == CONVERT_ACTION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convert() {
        let message = RuntimeMessage::from_json(r#"{"action":"convert"}"#).unwrap();
        assert!(message.is_convert());
        assert_eq!(message, RuntimeMessage::convert());
    }

    #[test]
    fn test_other_actions() {
        let message = RuntimeMessage::from_json(r#"{"action":"toggle","extra":1}"#).unwrap();
        assert!(!message.is_convert());
        assert!(RuntimeMessage::from_json(r#"{"kind":"convert"}"#).is_err());
    }
}
