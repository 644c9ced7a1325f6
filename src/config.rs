//! Connection parameters supplied by the caller at connect time.

use std::time::Duration;

/// Address used when the caller does not supply one.
pub const DEFAULT_ADDR: &str = "localhost:6379";

/// How long establishing the TCP connection may take.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a single write or read of one reply may block.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum nesting of array replies.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Maximum number of buffered bytes for a single reply.
pub const DEFAULT_MAX_REPLY_SIZE: usize = 512 * 1024 * 1024;

/// Options for `ConnectionManager::connect`.
#[derive(Clone)]
pub struct ConnectOptions {
    /// Display name of the session.
    pub name: String,

    /// Sent with `AUTH` before the liveness check when present.
    pub password: Option<String>,

    /// Reserved. Connecting with TLS requested fails until it is supported.
    pub use_tls: bool,

    /// Reserved. Cluster topology discovery is not performed.
    pub cluster: bool,

    pub connect_timeout: Duration,

    pub io_timeout: Duration,

    pub max_depth: usize,

    pub max_reply_size: usize,
}

impl ConnectOptions {
    /// Set the password used to authenticate the session.
    pub fn password(mut self, password: impl ToString) -> ConnectOptions {
        self.password = Some(password.to_string());
        self
    }

    pub fn name(mut self, name: impl ToString) -> ConnectOptions {
        self.name = name.to_string();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> ConnectOptions {
        self.connect_timeout = timeout;
        self
    }

    pub fn io_timeout(mut self, timeout: Duration) -> ConnectOptions {
        self.io_timeout = timeout;
        self
    }
}

impl Default for ConnectOptions {
    fn default() -> ConnectOptions {
        ConnectOptions {
            name: "redesk".to_string(),
            password: None,
            use_tls: false,
            cluster: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            max_depth: DEFAULT_MAX_DEPTH,
            max_reply_size: DEFAULT_MAX_REPLY_SIZE,
        }
    }
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("ConnectOptions")
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("use_tls", &self.use_tls)
            .field("cluster", &self.cluster)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .field("max_depth", &self.max_depth)
            .field("max_reply_size", &self.max_reply_size)
            .finish()
    }
}
