//! Owner of the single session with a server.

use crate::{Command, ConnectOptions, Connection, Error, Frame, Session, Status};

use bytes::Bytes;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::time;
use tracing::{debug, info, instrument, warn};

/// Drives the `Disconnected -> Connecting -> Connected -> Disconnected` lifecycle.
///
/// All operations go through one lock, so at most one command is in flight and
/// `connect`, `send` and `disconnect` never interleave. The status is also
/// published on a `watch` channel so a display can read it without waiting
/// behind a slow command.
#[derive(Debug)]
pub struct ConnectionManager {
    inner: Mutex<Inner>,
    status: watch::Sender<Status>,
}

#[derive(Debug)]
struct Inner {
    connection: Option<Connection>,
    session: Option<Session>,
    io_timeout: Duration,
}

impl ConnectionManager {
    pub fn new() -> ConnectionManager {
        let (status, _) = watch::channel(Status::Disconnected);

        ConnectionManager {
            inner: Mutex::new(Inner {
                connection: None,
                session: None,
                io_timeout: crate::config::DEFAULT_IO_TIMEOUT,
            }),
            status,
        }
    }

    /// Current status. Never blocks.
    pub fn status(&self) -> Status {
        *self.status.borrow()
    }

    /// Returns a receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    /// Returns a snapshot of the current session, if one was opened.
    pub async fn session(&self) -> Option<Session> {
        self.inner.lock().await.session.clone()
    }

    /// Open a session with the server at `address`.
    ///
    /// The connection is only considered live once the server answered `PING`
    /// with exactly `PONG`. An existing session is closed first.
    #[instrument(skip(self, opts), fields(name = %opts.name))]
    pub async fn connect(&self, address: &str, opts: ConnectOptions) -> crate::Result<Session> {
        let mut inner = self.inner.lock().await;

        if inner.connection.is_some() {
            debug!("replacing existing session");
            self.teardown(&mut inner).await;
        }

        let mut session = Session::new(address, &opts);
        inner.session = Some(session.clone());
        self.set_status(&mut inner, Status::Connecting);

        match establish(address, &opts).await {
            Ok(connection) => {
                inner.connection = Some(connection);
                inner.io_timeout = opts.io_timeout;
                self.set_status(&mut inner, Status::Connected);

                info!("connected");

                session.set_status(Status::Connected);
                Ok(session)
            }
            Err(err) => {
                warn!(cause = %err, "failed to connect");

                if let Some(session) = inner.session.as_mut() {
                    session.clear_credentials();
                }
                self.set_status(&mut inner, Status::Disconnected);

                Err(err)
            }
        }
    }

    /// Send one command and wait for its reply.
    ///
    /// A server error reply is returned as `Frame::Error`. Any failure of the
    /// stream itself closes the session before the error is returned.
    #[instrument(skip(self, cmd), fields(cmd = cmd.name().unwrap_or("")))]
    pub async fn send(&self, cmd: Command) -> crate::Result<Frame> {
        let mut inner = self.inner.lock().await;

        if self.status() != Status::Connected {
            return Err(Error::NotConnected);
        }

        let io_timeout = inner.io_timeout;
        let connection = match inner.connection.as_mut() {
            Some(connection) => connection,
            None => return Err(Error::NotConnected),
        };

        let frame = cmd.into_frame();

        match round_trip(connection, &frame, io_timeout).await {
            Ok(response) => Ok(response),
            Err(err) => {
                if err.is_fatal() {
                    warn!(cause = %err, "closing session");
                    self.teardown(&mut inner).await;
                }

                Err(err)
            }
        }
    }

    /// Close the session. Calling this while disconnected does nothing.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;

        if inner.connection.is_some() {
            info!("disconnecting");
        }

        self.teardown(&mut inner).await;
    }

    async fn teardown(&self, inner: &mut Inner) {
        if let Some(mut connection) = inner.connection.take() {
            if let Err(err) = connection.shutdown().await {
                debug!(cause = %err, "socket shutdown failed");
            }
        }

        if let Some(session) = inner.session.as_mut() {
            session.clear_credentials();
        }

        self.set_status(inner, Status::Disconnected);
    }

    fn set_status(&self, inner: &mut Inner, status: Status) {
        if let Some(session) = inner.session.as_mut() {
            session.set_status(status);
        }

        self.status.send_replace(status);
    }
}

impl Default for ConnectionManager {
    fn default() -> ConnectionManager {
        ConnectionManager::new()
    }
}

/// Open the socket, authenticate if asked to, and check liveness.
async fn establish(address: &str, opts: &ConnectOptions) -> crate::Result<Connection> {
    if opts.use_tls {
        return Err(Error::Connection("TLS connections are not implemented".into()));
    }

    if opts.cluster {
        warn!("cluster mode is not implemented, using a standalone connection");
    }

    let socket = time::timeout(opts.connect_timeout, TcpStream::connect(address))
        .await
        .map_err(|_| {
            Error::Connection(format!(
                "timed out connecting to {} after {:?}",
                address, opts.connect_timeout
            ))
        })??;

    socket.set_nodelay(true)?;

    let mut connection = Connection::with_limits(socket, opts.max_depth, opts.max_reply_size);

    if let Some(password) = &opts.password {
        let auth = Command::new(vec!["AUTH".to_string(), password.clone()]).into_frame();

        match round_trip(&mut connection, &auth, opts.io_timeout).await? {
            Frame::Simple(response) if response == "OK" => {}
            frame => {
                return Err(Error::Connection(format!(
                    "authentication failed: {}",
                    frame
                )))
            }
        }
    }

    let mut ping = Frame::array();
    ping.push_bulk(Bytes::from_static(b"PING"));

    match round_trip(&mut connection, &ping, opts.io_timeout).await? {
        Frame::Simple(response) if response == "PONG" => Ok(connection),
        frame => Err(Error::Connection(format!(
            "did not receive good PING response, got {}",
            frame
        ))),
    }
}

/// Write `frame` and read exactly one reply, each step bounded by `io_timeout`.
async fn round_trip(
    connection: &mut Connection,
    frame: &Frame,
    io_timeout: Duration,
) -> crate::Result<Frame> {
    // Only the command name is logged, arguments may hold credentials.
    debug!(request = command_name(frame));

    time::timeout(io_timeout, connection.write_frame(frame))
        .await
        .map_err(|_| Error::Connection(format!("write timed out after {:?}", io_timeout)))??;

    let response = time::timeout(io_timeout, connection.read_frame())
        .await
        .map_err(|_| Error::Connection(format!("read timed out after {:?}", io_timeout)))??;

    debug!(?response);

    match response {
        Some(frame) => Ok(frame),
        // `None` here indicates the server has closed the connection without sending a frame.
        None => Err(Error::Connection("connection reset by server".into())),
    }
}

fn command_name(frame: &Frame) -> &str {
    match frame {
        Frame::Array(parts) => match parts.first() {
            Some(Frame::Bulk(name)) => std::str::from_utf8(name).unwrap_or("?"),
            _ => "?",
        },
        _ => "?",
    }
}
