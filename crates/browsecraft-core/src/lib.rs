//! Shared wire types, the closed BiDi error-code enumeration, and recursive
//! payload redaction used by every other Browsecraft crate.

pub mod message;
pub mod protocol_error;
pub mod redact;

pub use message::{Command, InboundMessage, JsonMap};
pub use protocol_error::{ErrCode, ProtocolError};
pub use redact::redact;
