//! Recording context for protocol unit tests.

use arq_lab_core::{ArqContext, Frame};

/// Captures everything an endpoint does during one callback sequence.
#[derive(Default)]
pub struct RecordingContext {
    pub sent: Vec<Frame>,
    pub timers_started: Vec<(u64, u32)>,
    pub timers_cancelled: Vec<u32>,
    pub delivered: Vec<Vec<u8>>,
    pub logs: Vec<String>,
    pub now: u64,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence numbers of the data frames sent so far.
    pub fn data_seqs(&self) -> Vec<u32> {
        self.sent
            .iter()
            .filter_map(|f| match f {
                Frame::Data { seq, .. } => Some(*seq),
                _ => None,
            })
            .collect()
    }

    /// Sequence numbers of all ACK frames (either kind) sent so far.
    pub fn ack_seqs(&self) -> Vec<u32> {
        self.sent
            .iter()
            .filter_map(|f| match f {
                Frame::Ack { seq } | Frame::SrAck { seq } => Some(*seq),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
        self.timers_started.clear();
        self.timers_cancelled.clear();
        self.delivered.clear();
        self.logs.clear();
    }
}

impl ArqContext for RecordingContext {
    fn send_frame(&mut self, frame: Frame) {
        self.sent.push(frame);
    }

    fn start_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.timers_started.push((delay_ms, timer_id));
    }

    fn cancel_timer(&mut self, timer_id: u32) {
        self.timers_cancelled.push(timer_id);
    }

    fn deliver(&mut self, payload: &[u8]) {
        self.delivered.push(payload.to_vec());
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }
}
