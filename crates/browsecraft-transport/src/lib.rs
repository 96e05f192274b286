//! Framed BiDi transport: command/response correlation, event dispatch, and
//! timeout handling over a real or virtual duplex channel.

pub mod channel;
pub mod error;
pub mod transport;

pub use channel::{ws_channel, virtual_channel, ChannelHalves, Direction, OutboundSink, VirtualInboundFeed};
pub use error::TransportError;
pub use transport::{EventHandler, RawMessageHook, Transport, TransportOptions, Unsubscribe, DEFAULT_COMMAND_TIMEOUT};
