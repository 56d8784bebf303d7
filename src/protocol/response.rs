//! Response frames delivered through write-acknowledgements and
//! notifications.

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Outcome reported on the write-acknowledgement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStatus {
    Success,
    Error,
}

/// One complete response: status plus payload bytes.
///
/// The same payload travels on both delivery channels; the acknowledgement
/// additionally carries the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub status: WriteStatus,
    pub payload: Vec<u8>,
}

impl ResponseFrame {
    pub fn success(payload: Vec<u8>) -> Self {
        Self {
            status: WriteStatus::Success,
            payload,
        }
    }

    /// Single failure frame: Error status with a human-readable diagnostic.
    pub fn failure(err: &GatewayError) -> Self {
        Self {
            status: WriteStatus::Error,
            payload: err.to_string().into_bytes(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == WriteStatus::Error
    }

    /// Payload as text, for logging and the relay framing.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
