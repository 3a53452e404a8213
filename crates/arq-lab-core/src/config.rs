//! Transfer and channel configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    Gbn,
    Sr,
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolKind::Gbn => write!(f, "gbn"),
            ProtocolKind::Sr => write!(f, "sr"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    WindowTooSmall,
    #[error("GBN window {window} must be smaller than the sequence modulus {modulus}")]
    GbnWindowTooLarge { window: u32, modulus: u32 },
    #[error("SR window {window} must be at most half the sequence modulus {modulus}")]
    SrWindowTooLarge { window: u32, modulus: u32 },
    #[error("sequence modulus must be at least 2")]
    ModulusTooSmall,
    #[error("loss rate must lie in [0, 1)")]
    LossRateOutOfRange,
}

/// Knobs for one sender/receiver pair.
///
/// Defaults match the classic lab setup: window 4, ten packets, a two-second
/// retransmission timeout, sequence numbers modulo 8, and 20% simulated loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArqConfig {
    pub window_size: u32,
    pub total_packets: u32,
    pub timeout_ms: u64,
    pub seq_modulus: u32,
    pub loss_rate: f64,
    pub seed: u64,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            window_size: 4,
            total_packets: 10,
            timeout_ms: 2000,
            seq_modulus: 8,
            loss_rate: 0.2,
            seed: 0,
        }
    }
}

impl ArqConfig {
    /// Check the window/modulus relationship required by `kind`.
    ///
    /// A GBN window must leave at least one unused sequence number so a
    /// cumulative ACK is unambiguous; an SR window must not exceed half the
    /// modulus or a retransmission is indistinguishable from a new packet.
    pub fn validate(&self, kind: ProtocolKind) -> Result<(), ConfigError> {
        if self.seq_modulus < 2 {
            return Err(ConfigError::ModulusTooSmall);
        }
        if self.window_size < 1 {
            return Err(ConfigError::WindowTooSmall);
        }
        if !(0.0..1.0).contains(&self.loss_rate) {
            return Err(ConfigError::LossRateOutOfRange);
        }
        match kind {
            ProtocolKind::Gbn if self.window_size >= self.seq_modulus => {
                Err(ConfigError::GbnWindowTooLarge {
                    window: self.window_size,
                    modulus: self.seq_modulus,
                })
            }
            ProtocolKind::Sr if self.window_size > self.seq_modulus / 2 => {
                Err(ConfigError::SrWindowTooLarge {
                    window: self.window_size,
                    modulus: self.seq_modulus,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Simulated-channel parameters for the event-queue simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub loss_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            min_latency: 10,
            max_latency: 100,
            seed: 0,
        }
    }
}
