pub mod config;
pub mod context;
pub mod frame;
pub mod loss;
pub mod seq;

pub use config::{ArqConfig, ChannelConfig, ConfigError, ProtocolKind};
pub use context::{ArqContext, ArqEndpoint};
pub use frame::{Frame, FrameError};
pub use loss::LossSimulator;
pub use seq::SeqSpace;
