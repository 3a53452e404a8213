//! The two ARQ protocol pairs.
//!
//! Both pairs implement [`arq_lab_core::ArqEndpoint`] and differ only in
//! their acknowledgment and retransmission policy:
//!
//! - [`gbn`]: Go-Back-N. Cumulative ACKs, one timer for the whole window,
//!   whole-window retransmission on timeout, no out-of-order acceptance.
//! - [`sr`]: Selective-Repeat. Individual ACKs, one timer per in-flight
//!   packet, single-packet retransmission, receiver-side reorder buffer.

pub mod gbn;
pub mod sr;

pub use gbn::{GbnReceiver, GbnSender};
pub use sr::{SrReceiver, SrSender};

#[cfg(test)]
pub(crate) mod test_util;
