//! `Session`: the BiDi-command-module facade over a browser connection.

pub mod error;
pub mod modules;
pub mod session;

pub use error::SessionError;
pub use modules::{BrowsingContext, Input, Network, Script, Storage};
pub use session::{Session, SessionLaunchOptions};
