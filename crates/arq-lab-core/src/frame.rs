//! Text wire format shared by both protocol pairs.
//!
//! Frames are human-inspectable and stable for interoperability:
//!
//! | Frame          | Encoding             |
//! |----------------|----------------------|
//! | Data           | `<seq>:<payload>`    |
//! | Cumulative ACK | `ACK:<seq>`          |
//! | Selective ACK  | `SR_ACK:<seq>`       |
//!
//! Payloads are opaque tokens: nonempty, no embedded `:` and no whitespace.
//! A datagram that fails to decode is discarded by the caller and recovered
//! by the peer's retransmission timer.

use thiserror::Error;

const ACK_PREFIX: &str = "ACK:";
const SR_ACK_PREFIX: &str = "SR_ACK:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty datagram")]
    Empty,
    #[error("missing ':' separator in {0:?}")]
    MissingSeparator(String),
    #[error("invalid sequence number {0:?}")]
    InvalidSeq(String),
    #[error("payload must be a nonempty token without ':' or whitespace")]
    InvalidPayload,
    #[error("datagram is not valid UTF-8")]
    NotUtf8,
}

/// A single unit on the wire: a data packet or one of the two ACK kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Sender → receiver payload, owned by the sender until acknowledged.
    Data { seq: u32, payload: Vec<u8> },
    /// Go-Back-N cumulative acknowledgment: everything through `seq`.
    Ack { seq: u32 },
    /// Selective-Repeat individual acknowledgment: exactly `seq`.
    SrAck { seq: u32 },
}

impl Frame {
    pub fn seq(&self) -> u32 {
        match self {
            Frame::Data { seq, .. } | Frame::Ack { seq } | Frame::SrAck { seq } => *seq,
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Frame::Ack { .. } | Frame::SrAck { .. })
    }

    /// Encode into wire bytes.
    ///
    /// Fails only for data frames whose payload is not a valid token; ACK
    /// frames always encode.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        match self {
            Frame::Data { seq, payload } => {
                if !payload_is_token(payload) {
                    return Err(FrameError::InvalidPayload);
                }
                let mut out = format!("{seq}:").into_bytes();
                out.extend_from_slice(payload);
                Ok(out)
            }
            Frame::Ack { seq } => Ok(format!("{ACK_PREFIX}{seq}").into_bytes()),
            Frame::SrAck { seq } => Ok(format!("{SR_ACK_PREFIX}{seq}").into_bytes()),
        }
    }

    /// Decode a received datagram.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.is_empty() {
            return Err(FrameError::Empty);
        }
        let text = str::from_utf8(bytes).map_err(|_| FrameError::NotUtf8)?;

        // SR_ACK must be checked before the bare-number data form; its prefix
        // would otherwise fail the seq parse with a worse error.
        if let Some(rest) = text.strip_prefix(SR_ACK_PREFIX) {
            return Ok(Frame::SrAck {
                seq: parse_seq(rest)?,
            });
        }
        if let Some(rest) = text.strip_prefix(ACK_PREFIX) {
            return Ok(Frame::Ack {
                seq: parse_seq(rest)?,
            });
        }

        let (seq_text, payload) = text
            .split_once(':')
            .ok_or_else(|| FrameError::MissingSeparator(text.to_string()))?;
        let seq = parse_seq(seq_text)?;
        let payload = payload.as_bytes().to_vec();
        if !payload_is_token(&payload) {
            return Err(FrameError::InvalidPayload);
        }
        Ok(Frame::Data { seq, payload })
    }
}

fn parse_seq(text: &str) -> Result<u32, FrameError> {
    text.parse::<u32>()
        .map_err(|_| FrameError::InvalidSeq(text.to_string()))
}

fn payload_is_token(payload: &[u8]) -> bool {
    !payload.is_empty()
        && !payload
            .iter()
            .any(|b| *b == b':' || b.is_ascii_whitespace())
}
