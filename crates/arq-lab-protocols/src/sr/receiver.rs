//! Selective-Repeat receive-side state machine.
//!
//! Arrivals inside `[expected, expected + window)` are buffered and
//! individually acknowledged; once `expected` itself arrives, the contiguous
//! prefix drains to the application in order. Arrivals in the window behind
//! `expected` were already delivered and only need their ACK repeated (the
//! original ACK may have been lost). Anything else is silently ignored.
//!
//! With the window capped at half the modulus, the ahead- and behind-window
//! ranges never overlap, so a retransmitted old frame can never masquerade
//! as a new one across the wraparound boundary.

use std::collections::HashMap;

use arq_lab_core::{ArqConfig, ArqContext, ArqEndpoint, Frame, SeqSpace};

#[derive(Debug)]
pub struct SrReceiver {
    space: SeqSpace,
    window_size: u32,
    expected: u32,
    /// Reorder buffer; keys stay strictly within `[expected, expected + window)`.
    buffer: HashMap<u32, Vec<u8>>,
    delivered: u32,
    total_packets: u32,
}

impl SrReceiver {
    pub fn new(config: &ArqConfig) -> Self {
        Self {
            space: SeqSpace::new(config.seq_modulus),
            window_size: config.window_size,
            expected: 0,
            buffer: HashMap::new(),
            delivered: 0,
            total_packets: config.total_packets,
        }
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn delivered(&self) -> u32 {
        self.delivered
    }

    fn drain(&mut self, ctx: &mut dyn ArqContext) {
        while let Some(payload) = self.buffer.remove(&self.expected) {
            ctx.log(&format!("SR deliver seq={}", self.expected));
            ctx.deliver(&payload);
            self.expected = self.space.next(self.expected);
            self.delivered += 1;
        }
    }
}

impl ArqEndpoint for SrReceiver {
    fn on_frame(&mut self, ctx: &mut dyn ArqContext, frame: Frame) {
        let Frame::Data { seq, payload } = frame else {
            ctx.log(&format!("SR receiver ignoring non-data frame {frame:?}"));
            return;
        };
        if self.space.in_window(self.expected, self.window_size, seq) {
            // Idempotent buffering: a retransmission never overwrites.
            self.buffer.entry(seq).or_insert(payload);
            ctx.send_frame(Frame::SrAck { seq });
            if seq == self.expected {
                self.drain(ctx);
            }
        } else if self.space.distance(seq, self.expected) <= self.window_size {
            // Already delivered; the sender is retransmitting because our
            // ACK was lost. Repeat it, deliver nothing.
            ctx.log(&format!("SR already-delivered seq={seq}, re-acking"));
            ctx.send_frame(Frame::SrAck { seq });
        } else {
            ctx.log(&format!("SR seq={seq} beyond window, ignored"));
        }
    }

    fn on_timer(&mut self, _ctx: &mut dyn ArqContext, _timer_id: u32) {
        // The SR receiver keeps no timers.
    }

    fn on_app_data(&mut self, _ctx: &mut dyn ArqContext, _data: &[u8]) {
        // Receivers do not originate data.
    }

    fn is_complete(&self) -> bool {
        self.delivered >= self.total_packets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::RecordingContext;

    fn receiver() -> SrReceiver {
        SrReceiver::new(&ArqConfig {
            window_size: 4,
            seq_modulus: 8,
            total_packets: 10,
            ..Default::default()
        })
    }

    fn data(seq: u32) -> Frame {
        Frame::Data {
            seq,
            payload: format!("Packet-{seq}").into_bytes(),
        }
    }

    #[test]
    fn buffers_gap_then_drains_in_one_pass() {
        // Packet 1 lost while 0, 2, 3 arrive.
        let mut r = receiver();
        let mut ctx = RecordingContext::new();
        r.on_frame(&mut ctx, data(0));
        r.on_frame(&mut ctx, data(2));
        r.on_frame(&mut ctx, data(3));
        assert_eq!(ctx.delivered, vec![b"Packet-0".to_vec()]);
        assert_eq!(r.buffered(), 2);
        assert_eq!(ctx.ack_seqs(), vec![0, 2, 3]);

        // Retransmitted 1 arrives: 1, 2, 3 drain together.
        r.on_frame(&mut ctx, data(1));
        assert_eq!(
            ctx.delivered,
            vec![
                b"Packet-0".to_vec(),
                b"Packet-1".to_vec(),
                b"Packet-2".to_vec(),
                b"Packet-3".to_vec()
            ]
        );
        assert_eq!(r.buffered(), 0);
        assert_eq!(r.expected(), 4);
    }

    #[test]
    fn duplicate_in_window_frame_acked_once_more_but_buffered_once() {
        let mut r = receiver();
        let mut ctx = RecordingContext::new();
        r.on_frame(&mut ctx, data(2));
        r.on_frame(&mut ctx, data(2));
        assert_eq!(ctx.ack_seqs(), vec![2, 2]);
        assert_eq!(r.buffered(), 1);
        assert!(ctx.delivered.is_empty());
    }

    #[test]
    fn already_delivered_frame_reacked_without_redelivery() {
        let mut r = receiver();
        let mut ctx = RecordingContext::new();
        r.on_frame(&mut ctx, data(0));
        assert_eq!(ctx.delivered.len(), 1);

        r.on_frame(&mut ctx, data(0)); // sender retransmitted; our ACK was lost
        assert_eq!(ctx.ack_seqs(), vec![0, 0]);
        assert_eq!(ctx.delivered.len(), 1);
        assert_eq!(r.expected(), 1);
    }

    #[test]
    fn frame_beyond_window_silently_ignored() {
        let mut r = receiver();
        let mut ctx = RecordingContext::new();
        r.on_frame(&mut ctx, data(5)); // window is [0, 4)
        assert!(ctx.ack_seqs().is_empty());
        assert!(ctx.delivered.is_empty());
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn any_window_permutation_delivers_in_sequence_order() {
        let mut r = receiver();
        let mut ctx = RecordingContext::new();
        for seq in [3, 1, 0, 2] {
            r.on_frame(&mut ctx, data(seq));
        }
        assert_eq!(
            ctx.delivered,
            vec![
                b"Packet-0".to_vec(),
                b"Packet-1".to_vec(),
                b"Packet-2".to_vec(),
                b"Packet-3".to_vec()
            ]
        );
    }

    #[test]
    fn wraparound_distinguishes_stale_retransmission_from_new_frame() {
        let mut r = receiver();
        let mut ctx = RecordingContext::new();
        // Deliver 0..=7 in order; expected wraps back to 0.
        for seq in 0..8 {
            r.on_frame(&mut ctx, data(seq));
        }
        assert_eq!(r.expected(), 0);
        ctx.clear();

        // A stale retransmission of seq 5 sits behind the window: re-ack only.
        r.on_frame(&mut ctx, data(5));
        assert_eq!(ctx.ack_seqs(), vec![5]);
        assert!(ctx.delivered.is_empty());

        // A genuinely new round of seq 0 is accepted and delivered.
        r.on_frame(&mut ctx, data(0));
        assert_eq!(ctx.delivered.len(), 1);
        assert_eq!(r.expected(), 1);
    }
}
