//! The seam between a protocol state machine and whatever drives it.
//!
//! A sender or receiver never touches a socket or a clock directly: every
//! callback receives an [`ArqContext`] and expresses its effects through it.
//! The same state machine therefore runs unchanged under the event-queue
//! simulator and the real UDP control loops, and all window/timer state is
//! touched by exactly one logical thread of control.

use crate::frame::Frame;

/// Capabilities the driver provides to a protocol endpoint.
pub trait ArqContext {
    /// Hand a frame to the (unreliable) channel.
    fn send_frame(&mut self, frame: Frame);

    /// Start a timer. `timer_id` identifies it on expiry and cancellation;
    /// senders use either a single window timer (GBN) or one id per
    /// sequence number (SR). Starting an id that is already running
    /// supersedes the earlier deadline.
    fn start_timer(&mut self, delay_ms: u64, timer_id: u32);

    /// Cancel a running timer. Cancelling an id that is not running is a
    /// no-op.
    fn cancel_timer(&mut self, timer_id: u32);

    /// Deliver a payload to the application layer, in order.
    fn deliver(&mut self, payload: &[u8]);

    /// Log through the driver (the simulator timestamps these).
    fn log(&mut self, message: &str);

    /// Current driver time in milliseconds.
    fn now(&self) -> u64;
}

/// One half of a protocol pair: a sender or a receiver state machine.
pub trait ArqEndpoint: Send {
    /// Called once before any other callback.
    fn init(&mut self, _ctx: &mut dyn ArqContext) {}

    /// A frame arrived from the channel (already past loss simulation).
    fn on_frame(&mut self, ctx: &mut dyn ArqContext, frame: Frame);

    /// A previously started timer expired.
    fn on_timer(&mut self, ctx: &mut dyn ArqContext, timer_id: u32);

    /// The application wants `data` transferred reliably. Receivers ignore
    /// this.
    fn on_app_data(&mut self, ctx: &mut dyn ArqContext, data: &[u8]);

    /// `true` once this endpoint has nothing left outstanding: for a sender,
    /// every admitted payload is acknowledged; for a receiver, the fixed
    /// transfer total has been delivered. Drivers poll this to terminate.
    fn is_complete(&self) -> bool {
        false
    }
}
