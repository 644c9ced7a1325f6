//! Error types returned by the client.

use std::io;
use thiserror::Error as ThisError;

/// Every failure the client surfaces to its caller.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Network failure, timeout or a server that does not behave like one.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server sent bytes that are not valid RESP.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An operation needing a live session was attempted without one.
    #[error("not connected")]
    NotConnected,

    /// A blank command line was submitted.
    #[error("empty command")]
    EmptyCommand,

    /// A command could not be written in wire format.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The command line could not be split into arguments.
    #[error("invalid command line: {0}")]
    Syntax(String),
}

impl Error {
    /// Returns `true` if the error leaves the byte stream unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Protocol(_))
    }
}

impl From<io::Error> for Error {
    fn from(src: io::Error) -> Error {
        Error::Connection(src.to_string())
    }
}
