pub mod receiver;
pub mod sender;

pub use receiver::SrReceiver;
pub use sender::SrSender;
