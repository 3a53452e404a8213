//! Go-Back-N send-side state machine.
//!
//! One cumulative-ACK sliding window with a single timer covering the front
//! of the window:
//!
//! ```text
//!   base              next_seq
//!     │                  │
//! ────┼──────────────────┼─────────▶ seq space (mod N)
//!     │ ◀── in flight ──▶│ ◀─ admissible ─▶
//! ```
//!
//! - ACKs acknowledge everything through their sequence number.
//! - The window timer runs iff at least one frame is outstanding; it is
//!   restarted when `base` advances without emptying the window and
//!   cancelled entirely when the window empties.
//! - On timeout **every** in-flight frame is retransmitted.

use std::collections::VecDeque;

use arq_lab_core::{ArqConfig, ArqContext, ArqEndpoint, Frame, SeqSpace};

use super::WINDOW_TIMER;

/// Go-Back-N sender. Application payloads queue in `pending` until a window
/// slot opens; `in_flight` holds the payloads for `base..next_seq` in order.
#[derive(Debug)]
pub struct GbnSender {
    space: SeqSpace,
    window_size: u32,
    timeout_ms: u64,
    base: u32,
    next_seq: u32,
    pending: VecDeque<Vec<u8>>,
    in_flight: VecDeque<Vec<u8>>,
}

impl GbnSender {
    pub fn new(config: &ArqConfig) -> Self {
        Self {
            space: SeqSpace::new(config.seq_modulus),
            window_size: config.window_size,
            timeout_ms: config.timeout_ms,
            base: 0,
            next_seq: 0,
            pending: VecDeque::new(),
            in_flight: VecDeque::new(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// Number of frames currently awaiting acknowledgment.
    pub fn in_flight(&self) -> u32 {
        self.in_flight.len() as u32
    }

    /// Admit pending payloads while the window has room, transmitting each.
    fn fill_window(&mut self, ctx: &mut dyn ArqContext) {
        while self.in_flight() < self.window_size {
            let Some(payload) = self.pending.pop_front() else {
                break;
            };
            let seq = self.next_seq;
            ctx.log(&format!("GBN send seq={seq}"));
            ctx.send_frame(Frame::Data {
                seq,
                payload: payload.clone(),
            });
            if self.in_flight.is_empty() {
                // First outstanding frame: arm the window timer.
                ctx.start_timer(self.timeout_ms, WINDOW_TIMER);
            }
            self.in_flight.push_back(payload);
            self.next_seq = self.space.next(seq);
        }
    }

    fn on_ack(&mut self, ctx: &mut dyn ArqContext, seq: u32) {
        // Progress only when the ACK covers at least the frame at `base`.
        if !self.space.in_window(self.base, self.in_flight(), seq) {
            ctx.log(&format!("GBN duplicate/out-of-range ACK {seq} ignored"));
            return;
        }
        let newly_acked = self.space.distance(self.base, seq) + 1;
        for _ in 0..newly_acked {
            self.in_flight.pop_front();
        }
        self.base = self.space.next(seq);
        ctx.log(&format!(
            "GBN ACK {seq}: base advances to {} ({} newly acked)",
            self.base, newly_acked
        ));
        if self.in_flight.is_empty() {
            ctx.cancel_timer(WINDOW_TIMER);
        } else {
            ctx.start_timer(self.timeout_ms, WINDOW_TIMER);
        }
        self.fill_window(ctx);
    }
}

impl ArqEndpoint for GbnSender {
    fn on_frame(&mut self, ctx: &mut dyn ArqContext, frame: Frame) {
        match frame {
            Frame::Ack { seq } => self.on_ack(ctx, seq),
            other => ctx.log(&format!("GBN sender ignoring unexpected frame {other:?}")),
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn ArqContext, timer_id: u32) {
        if timer_id != WINDOW_TIMER || self.in_flight.is_empty() {
            return;
        }
        ctx.log(&format!(
            "GBN timeout: resending window {}..{}",
            self.base, self.next_seq
        ));
        let mut seq = self.base;
        for payload in &self.in_flight {
            ctx.send_frame(Frame::Data {
                seq,
                payload: payload.clone(),
            });
            seq = self.space.next(seq);
        }
        ctx.start_timer(self.timeout_ms, WINDOW_TIMER);
    }

    fn on_app_data(&mut self, ctx: &mut dyn ArqContext, data: &[u8]) {
        self.pending.push_back(data.to_vec());
        self.fill_window(ctx);
    }

    fn is_complete(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}
