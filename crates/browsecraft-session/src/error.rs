use browsecraft_core::ProtocolError;
use browsecraft_launcher::LaunchError;
use browsecraft_transport::error::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("no active session")]
    NotConnected,
}
