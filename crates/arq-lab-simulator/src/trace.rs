use serde::Serialize;

use arq_lab_core::ChannelConfig;

use crate::engine::LinkEventSummary;

/// Serializable snapshot of a finished simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: ChannelConfig,
    pub duration_ms: u64,
    pub delivered_data: Vec<Vec<u8>>,
    pub sender_frame_count: u32,
    pub acks_sent: Vec<u32>,
    pub link_events: Vec<LinkEventSummary>,
}
