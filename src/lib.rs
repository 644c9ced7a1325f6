//! A small interactive client for Redis-compatible servers.
//!
//! The crate owns a single session with a server: it opens the connection,
//! validates it with `PING`, sends raw command lines and renders the decoded
//! replies as text for whatever display sits on top of it.

pub mod cmd;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod manager;
pub mod session;

#[doc(inline)]
pub use cmd::{dispatch, execute, spawn_dispatch, Command};

#[doc(inline)]
pub use config::ConnectOptions;

#[doc(inline)]
pub use connection::Connection;

#[doc(inline)]
pub use error::Error;

#[doc(inline)]
pub use frame::Frame;

#[doc(inline)]
pub use manager::ConnectionManager;

#[doc(inline)]
pub use session::{Session, Status};

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
