//! Client-daemon wire protocol for notefan
//!
//! Clients talk to the daemon over a Unix stream socket. Each message is a
//! 4-byte big-endian length prefix followed by exactly that many bytes of
//! UTF-8 encoded JSON. A connection carries one request and one reply.
//!
//! Requests are JSON objects carrying a `Command` field:
//!
//! ```json
//! { "Command": "set-fan-speed", "Fan": 0, "Speed": 55.0 }
//! { "Command": "status" }
//! ```
//!
//! Replies are `{"Status":"OK"}`, a status object, or `{"Error":"..."}`.

use nf_error::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum accepted message payload (64 KiB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Size of the big-endian length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Command names understood by the daemon
pub const CMD_SET_FAN_SPEED: &str = "set-fan-speed";
pub const CMD_STATUS: &str = "status";

// ============================================================================
// Framing
// ============================================================================

/// Read one length-prefixed message payload from `reader`.
///
/// Frames longer than [`MAX_MESSAGE_SIZE`] and frames shorter than their
/// declared length are rejected.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    reader
        .read_exact(&mut prefix)
        .await
        .map_err(|e| Error::protocol(format!("failed to read message length: {e}")))?;

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(Error::MessageTooLarge {
            size: len,
            max_size: MAX_MESSAGE_SIZE,
        });
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| Error::protocol(format!("truncated message: {e}")))?;

    Ok(payload)
}

/// Write one length-prefixed message payload to `writer`.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(Error::MessageTooLarge {
            size: payload.len(),
            max_size: MAX_MESSAGE_SIZE,
        });
    }

    writer
        .write_all(&(payload.len() as u32).to_be_bytes())
        .await
        .map_err(|e| Error::protocol(format!("failed to write message length: {e}")))?;
    writer
        .write_all(payload)
        .await
        .map_err(|e| Error::protocol(format!("failed to write message: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::protocol(format!("failed to flush message: {e}")))?;

    Ok(())
}

/// Serialize `value` as JSON and send it as one framed message.
pub async fn send_json<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(value)?;
    write_message(writer, &payload).await
}

// ============================================================================
// Replies (Daemon -> Client)
// ============================================================================

/// Success acknowledgement: `{"Status":"OK"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkReply {
    #[serde(rename = "Status")]
    pub status: String,
}

impl OkReply {
    pub fn ok() -> Self {
        Self {
            status: "OK".to_string(),
        }
    }
}

/// Failure reply: `{"Error":"outer: inner: root"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    #[serde(rename = "Error")]
    pub error: String,
}

impl ErrorReply {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Reply to the `status` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReply {
    #[serde(rename = "PID")]
    pub pid: u32,
    #[serde(rename = "SelectedConfigId")]
    pub selected_config_id: String,
    #[serde(rename = "ReadOnly")]
    pub read_only: bool,
    #[serde(rename = "Fans")]
    pub fans: Vec<FanStatus>,
}

/// Per-fan entry in a [`StatusReply`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanStatus {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Temperature")]
    pub temperature: f64,
    #[serde(rename = "AutoMode")]
    pub auto_mode: bool,
    #[serde(rename = "Critical")]
    pub critical: bool,
    #[serde(rename = "CurrentSpeed")]
    pub current_speed: f32,
    #[serde(rename = "TargetSpeed")]
    pub target_speed: f32,
    #[serde(rename = "RequestedSpeed")]
    pub requested_speed: f32,
    #[serde(rename = "SpeedSteps")]
    pub speed_steps: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_framing_round_trip() {
        let payload = br#"{"Command":"status"}"#;

        let mut wire: Vec<u8> = Vec::new();
        write_message(&mut wire, payload).await.unwrap();

        assert_eq!(&wire[..4], &(payload.len() as u32).to_be_bytes());

        let mut reader = wire.as_slice();
        let decoded = read_message(&mut reader).await.unwrap();
        assert_eq!(decoded, payload);
    }

    #[tokio::test]
    async fn test_oversize_frame_rejected() {
        let mut wire: Vec<u8> = Vec::new();
        wire.extend_from_slice(&((MAX_MESSAGE_SIZE as u32) + 1).to_be_bytes());
        wire.extend_from_slice(&[0u8; 16]);

        let mut reader = wire.as_slice();
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, nf_error::Error::MessageTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_truncated_frame_rejected() {
        let mut wire: Vec<u8> = Vec::new();
        wire.extend_from_slice(&32u32.to_be_bytes());
        wire.extend_from_slice(b"short");

        let mut reader = wire.as_slice();
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[tokio::test]
    async fn test_oversize_payload_not_sent() {
        let payload = vec![0u8; MAX_MESSAGE_SIZE + 1];
        let mut wire: Vec<u8> = Vec::new();
        let err = write_message(&mut wire, &payload).await.unwrap_err();
        assert!(matches!(err, nf_error::Error::MessageTooLarge { .. }));
        assert!(wire.is_empty());
    }

    #[test]
    fn test_ok_reply_shape() {
        let json = serde_json::to_string(&OkReply::ok()).unwrap();
        assert_eq!(json, r#"{"Status":"OK"}"#);
    }

    #[test]
    fn test_error_reply_shape() {
        let json = serde_json::to_string(&ErrorReply::new("Speed: Invalid value")).unwrap();
        assert_eq!(json, r#"{"Error":"Speed: Invalid value"}"#);
    }

    #[test]
    fn test_status_reply_field_names() {
        let reply = StatusReply {
            pid: 1234,
            selected_config_id: "Acme Laptop 15".to_string(),
            read_only: false,
            fans: vec![FanStatus {
                name: "Fan #0".to_string(),
                temperature: 54.5,
                auto_mode: true,
                critical: false,
                current_speed: 40.0,
                target_speed: 50.0,
                requested_speed: 0.0,
                speed_steps: 255,
            }],
        };

        let json: serde_json::Value = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["PID"], 1234);
        assert_eq!(json["SelectedConfigId"], "Acme Laptop 15");
        assert_eq!(json["ReadOnly"], false);
        let fan = &json["Fans"][0];
        for key in [
            "Name",
            "Temperature",
            "AutoMode",
            "Critical",
            "CurrentSpeed",
            "TargetSpeed",
            "RequestedSpeed",
            "SpeedSteps",
        ] {
            assert!(fan.get(key).is_some(), "missing field {key}");
        }
    }
}
