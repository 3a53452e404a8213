//! Go-Back-N receive-side state machine.
//!
//! The receiver accepts only the exact next expected sequence number and
//! never buffers anything else. Any other arrival re-emits the last
//! cumulative ACK, so the sender learns how far delivery actually got.

use arq_lab_core::{ArqConfig, ArqContext, ArqEndpoint, Frame, SeqSpace};

#[derive(Debug)]
pub struct GbnReceiver {
    space: SeqSpace,
    expected: u32,
    delivered: u32,
    total_packets: u32,
}

impl GbnReceiver {
    pub fn new(config: &ArqConfig) -> Self {
        Self {
            space: SeqSpace::new(config.seq_modulus),
            expected: 0,
            delivered: 0,
            total_packets: config.total_packets,
        }
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn delivered(&self) -> u32 {
        self.delivered
    }
}

impl ArqEndpoint for GbnReceiver {
    fn on_frame(&mut self, ctx: &mut dyn ArqContext, frame: Frame) {
        let Frame::Data { seq, payload } = frame else {
            ctx.log(&format!("GBN receiver ignoring non-data frame {frame:?}"));
            return;
        };
        if seq == self.expected {
            ctx.log(&format!("GBN deliver seq={seq}"));
            ctx.deliver(&payload);
            ctx.send_frame(Frame::Ack { seq: self.expected });
            self.expected = self.space.next(self.expected);
            self.delivered += 1;
        } else {
            // No out-of-order acceptance: repeat the last cumulative ACK.
            let last_acked = self.space.prev(self.expected);
            ctx.log(&format!(
                "GBN out-of-order seq={seq}, re-acking {last_acked}"
            ));
            ctx.send_frame(Frame::Ack { seq: last_acked });
        }
    }

    fn on_timer(&mut self, _ctx: &mut dyn ArqContext, _timer_id: u32) {
        // The GBN receiver keeps no timers.
    }

    fn on_app_data(&mut self, _ctx: &mut dyn ArqContext, _data: &[u8]) {
        // Receivers do not originate data.
    }

    fn is_complete(&self) -> bool {
        self.delivered >= self.total_packets
    }
}
