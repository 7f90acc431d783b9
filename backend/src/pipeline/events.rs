use serde::{Deserialize, Serialize};

/// One line of the streamed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Text of one chunk, exactly as the engine produced it.
    Chunk { index: usize, text: String },
    Complete,
    Error { message: String },
}

impl ProgressEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk { .. })
    }

    /// Serialize as one newline-terminated JSON object.
    pub fn to_ndjson_line(&self) -> String {
        // A tagged enum of strings and integers always serializes
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            log::error!("Failed to serialize progress event: {}", e);
            r#"{"type":"error","message":"serialization failure"}"#.to_string()
        });
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shapes() {
        let chunk = ProgressEvent::Chunk {
            index: 2,
            text: " bonjour".to_string(),
        };
        assert_eq!(
            chunk.to_ndjson_line(),
            "{\"type\":\"chunk\",\"index\":2,\"text\":\" bonjour\"}\n"
        );
        assert_eq!(ProgressEvent::Complete.to_ndjson_line(), "{\"type\":\"complete\"}\n");
        assert_eq!(
            ProgressEvent::error("Aucun segment audio détecté.").to_ndjson_line(),
            "{\"type\":\"error\",\"message\":\"Aucun segment audio détecté.\"}\n"
        );
    }

    #[test]
    fn test_parses_client_lines() {
        let event: ProgressEvent =
            serde_json::from_str(r#"{"type":"error","message":"boom"}"#).unwrap();
        assert_eq!(event, ProgressEvent::error("boom"));
        assert!(event.is_terminal());
        assert!(!ProgressEvent::Chunk { index: 1, text: String::new() }.is_terminal());
    }
}
