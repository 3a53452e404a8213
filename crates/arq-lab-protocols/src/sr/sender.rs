//! Selective-Repeat send-side state machine.
//!
//! Each in-flight frame carries its own timer (`timer_id == seq`) and its
//! own acknowledged flag. A timeout retransmits exactly one frame; an ACK
//! settles exactly one frame and slides `base` over the acknowledged prefix.

use std::collections::VecDeque;

use arq_lab_core::{ArqConfig, ArqContext, ArqEndpoint, Frame, SeqSpace};

/// One window slot: `NotSent` payloads live in `pending`, so a slot is
/// always either sent-unacked or acked.
#[derive(Debug)]
struct Slot {
    seq: u32,
    payload: Vec<u8>,
    acked: bool,
}

#[derive(Debug)]
pub struct SrSender {
    space: SeqSpace,
    window_size: u32,
    timeout_ms: u64,
    base: u32,
    next_seq: u32,
    pending: VecDeque<Vec<u8>>,
    /// Slots for `base..next_seq`, front = oldest.
    slots: VecDeque<Slot>,
}

impl SrSender {
    pub fn new(config: &ArqConfig) -> Self {
        Self {
            space: SeqSpace::new(config.seq_modulus),
            window_size: config.window_size,
            timeout_ms: config.timeout_ms,
            base: 0,
            next_seq: 0,
            pending: VecDeque::new(),
            slots: VecDeque::new(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn in_flight(&self) -> u32 {
        self.slots.len() as u32
    }

    fn fill_window(&mut self, ctx: &mut dyn ArqContext) {
        while self.in_flight() < self.window_size {
            let Some(payload) = self.pending.pop_front() else {
                break;
            };
            let seq = self.next_seq;
            ctx.log(&format!("SR send seq={seq}"));
            ctx.send_frame(Frame::Data {
                seq,
                payload: payload.clone(),
            });
            // One timer per packet, keyed by its sequence number.
            ctx.start_timer(self.timeout_ms, seq);
            self.slots.push_back(Slot {
                seq,
                payload,
                acked: false,
            });
            self.next_seq = self.space.next(seq);
        }
    }

    fn on_ack(&mut self, ctx: &mut dyn ArqContext, seq: u32) {
        if !self.space.in_window(self.base, self.in_flight(), seq) {
            ctx.log(&format!("SR out-of-window ACK {seq} ignored"));
            return;
        }
        let idx = self.space.distance(self.base, seq) as usize;
        if self.slots[idx].acked {
            ctx.log(&format!("SR duplicate ACK {seq} ignored"));
            return;
        }
        self.slots[idx].acked = true;
        ctx.cancel_timer(seq);

        // Slide the window over the acknowledged prefix.
        while self.slots.front().is_some_and(|slot| slot.acked) {
            self.slots.pop_front();
            self.base = self.space.next(self.base);
        }
        ctx.log(&format!("SR ACK {seq}: base now {}", self.base));
        self.fill_window(ctx);
    }
}

impl ArqEndpoint for SrSender {
    fn on_frame(&mut self, ctx: &mut dyn ArqContext, frame: Frame) {
        match frame {
            Frame::SrAck { seq } => self.on_ack(ctx, seq),
            other => ctx.log(&format!("SR sender ignoring unexpected frame {other:?}")),
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn ArqContext, timer_id: u32) {
        // Retransmit only the frame whose timer fired, if still unacked.
        let Some(slot) = self
            .slots
            .iter()
            .find(|slot| slot.seq == timer_id && !slot.acked)
        else {
            return;
        };
        ctx.log(&format!("SR timeout: resending seq={}", slot.seq));
        ctx.send_frame(Frame::Data {
            seq: slot.seq,
            payload: slot.payload.clone(),
        });
        ctx.start_timer(self.timeout_ms, slot.seq);
    }

    fn on_app_data(&mut self, ctx: &mut dyn ArqContext, data: &[u8]) {
        self.pending.push_back(data.to_vec());
        self.fill_window(ctx);
    }

    fn is_complete(&self) -> bool {
        self.pending.is_empty() && self.slots.is_empty()
    }
}
