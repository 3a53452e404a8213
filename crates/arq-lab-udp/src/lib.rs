//! Real-transport drivers: the same protocol state machines that run under
//! the simulator, driven by a UDP socket with deadline-bounded reads.

pub mod driver;
pub mod timers;
pub mod transport;

pub use driver::{run_receiver, run_sender, stop_channel, StopHandle};
pub use timers::TimerTable;
pub use transport::{RecvOutcome, TransportError, UdpTransport};
