use crate::Event;
use bytes::Bytes;

/// Keepalive comment line understood by every SSE client.
pub const KEEPALIVE_PACKET: &str = ": keepalive\n\n";

#[derive(Debug, thiserror::Error)]
#[error("failed to encode {event_type} event: {source}")]
pub struct EncodeError {
    pub event_type: &'static str,
    #[source]
    pub source: serde_json::Error,
}

/// Turns protocol events into transport packets.
pub trait StreamEncoder: Send + Sync {
    /// MIME type of the produced stream.
    fn content_type(&self) -> &'static str {
        "text/event-stream"
    }

    /// Encode one event.
    fn encode(&self, event: &Event) -> Result<Bytes, EncodeError>;

    /// Out-of-band packet that keeps an idle connection open.
    fn encode_keepalive(&self) -> Bytes {
        Bytes::from_static(KEEPALIVE_PACKET.as_bytes())
    }
}

/// Server-Sent Events framing: `data: <json>\n\n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SseEncoder;

impl StreamEncoder for SseEncoder {
    fn encode(&self, event: &Event) -> Result<Bytes, EncodeError> {
        let json = serde_json::to_string(event).map_err(|source| {
            tracing::warn!(error = %source, event_type = event.type_name(), "failed to serialize SSE protocol event");
            EncodeError {
                event_type: event.type_name(),
                source,
            }
        })?;
        Ok(Bytes::from(format!("data: {json}\n\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn frames_event_as_sse_data_line() {
        let packet = SseEncoder.encode(&Event::text_message_end("m1")).unwrap();
        assert_eq!(
            packet,
            Bytes::from("data: {\"type\":\"TEXT_MESSAGE_END\",\"messageId\":\"m1\"}\n\n")
        );
    }

    #[test]
    fn text_content_decodes_back_from_data_payload() {
        let packet = SseEncoder
            .encode(&Event::text_message_content("m1", "héllo \"world\"\n"))
            .unwrap();
        let text = std::str::from_utf8(&packet).unwrap();
        let payload = text
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .expect("packet must be a single data frame");
        let decoded: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(decoded["type"], "TEXT_MESSAGE_CONTENT");
        assert_eq!(decoded["delta"], "héllo \"world\"\n");
    }

    #[test]
    fn keepalive_is_a_comment_line() {
        assert_eq!(SseEncoder.encode_keepalive(), Bytes::from(": keepalive\n\n"));
    }

    #[test]
    fn null_fields_are_excluded() {
        let packet = SseEncoder.encode(&Event::run_error("boom", None)).unwrap();
        let text = std::str::from_utf8(&packet).unwrap();
        assert!(!text.contains("code"));
        assert!(!text.contains("null"));
        let decoded: Value = serde_json::from_str(&text[6..text.len() - 2]).unwrap();
        assert_eq!(decoded, json!({"type": "RUN_ERROR", "message": "boom"}));
    }
}
