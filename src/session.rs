//! Metadata of the active session with a server.

use crate::ConnectOptions;

use std::fmt;

/// Lifecycle of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Disconnected,
    Connecting,
    Connected,
}

/// The client-side record of the current connection parameters.
///
/// Only the `ConnectionManager` mutates a session. Callers get snapshots.
#[derive(Clone)]
pub struct Session {
    name: String,
    address: String,
    password: Option<String>,
    use_tls: bool,
    cluster: bool,
    status: Status,
}

impl Session {
    pub(crate) fn new(address: &str, opts: &ConnectOptions) -> Session {
        Session {
            name: opts.name.clone(),
            address: address.to_string(),
            password: opts.password.clone(),
            use_tls: opts.use_tls,
            cluster: opts.cluster,
            status: Status::Connecting,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `host:port` the session was opened against.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    pub fn cluster(&self) -> bool {
        self.cluster
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Drop the stored password.
    pub(crate) fn clear_credentials(&mut self) {
        self.password = None;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Session")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("use_tls", &self.use_tls)
            .field("cluster", &self.cluster)
            .field("status", &self.status)
            .finish()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Disconnected => "disconnected".fmt(fmt),
            Status::Connecting => "connecting".fmt(fmt),
            Status::Connected => "connected".fmt(fmt),
        }
    }
}
