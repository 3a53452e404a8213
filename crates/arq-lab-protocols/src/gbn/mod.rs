pub mod receiver;
pub mod sender;

pub use receiver::GbnReceiver;
pub use sender::GbnSender;

/// Timer id of the single Go-Back-N window timer.
///
/// Kept out of the sequence-number range so drivers that key timers by id
/// can never collide with a Selective-Repeat per-packet timer.
pub const WINDOW_TIMER: u32 = u32::MAX;
