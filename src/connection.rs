use crate::config::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_REPLY_SIZE};
use crate::frame::{self, Frame};

use bytes::{Buf, BytesMut};
use std::io::Cursor;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

/// Send and receive `Frame`s from a remote peer.
#[derive(Debug)]
pub struct Connection {
    /// The `TcpStream`. It uses `BufWriter` for write level buffering.
    stream: BufWriter<TcpStream>,

    /// The internal buffer for reading frames.
    buffer: BytesMut,

    /// Maximum nesting of array frames.
    max_depth: usize,

    /// Maximum number of bytes buffered while waiting for one frame.
    max_frame_size: usize,
}

impl Connection {
    /// Create a new `Connection` with the default limits.
    pub fn new(socket: TcpStream) -> Connection {
        Connection::with_limits(socket, DEFAULT_MAX_DEPTH, DEFAULT_MAX_REPLY_SIZE)
    }

    pub fn with_limits(socket: TcpStream, max_depth: usize, max_frame_size: usize) -> Connection {
        Connection {
            stream: BufWriter::new(socket),
            buffer: BytesMut::with_capacity(4 * 1024),
            max_depth,
            max_frame_size,
        }
    }

    /// Tries to parse a frame from the buffer.
    ///
    /// If the buffer contains enough data, the frame is returned and exactly its bytes are
    /// removed from the buffer. If not enough data has been buffered yet, `Ok(None)` is
    /// returned. If the buffered data does not represent a valid frame, `Err` is returned.
    pub fn parse_frame(&mut self) -> crate::Result<Option<Frame>> {
        use frame::Error::Incomplete;

        let mut buf = Cursor::new(&self.buffer[..]);

        // check if enough data has been buffered to parse a single frame.
        match Frame::check(&mut buf, self.max_depth) {
            Ok(_) => {
                // remember the length of the frame.
                let len = buf.position() as usize;

                if len > self.max_frame_size {
                    return Err(crate::Error::Protocol(format!(
                        "reply exceeds {} bytes",
                        self.max_frame_size
                    )));
                }

                // reset the position to zero.
                buf.set_position(0);

                let frame = Frame::parse(&mut buf)?;

                // remove the parsed data from the buffer.
                self.buffer.advance(len);

                Ok(Some(frame))
            }
            // There is not enough data present in the read buffer to parse a single frame.
            Err(Incomplete) => Ok(None),
            // An error was encountered while parsing the frame.
            Err(e) => Err(e.into()),
        }
    }

    /// Read a single `Frame` value from the underlying stream.
    ///
    /// On success, the received frame is returned. If the `TcpStream` is closed in a way that
    /// doesn't break a frame in half, `None` is returned. Otherwise, an error is returned.
    pub async fn read_frame(&mut self) -> crate::Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            // Still incomplete with the limit already buffered.
            if self.buffer.len() >= self.max_frame_size {
                return Err(crate::Error::Protocol(format!(
                    "reply exceeds {} bytes",
                    self.max_frame_size
                )));
            }

            // `0` indicates "end of stream".
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                } else {
                    return Err(crate::Error::Connection(
                        "connection reset by peer in the middle of a frame".into(),
                    ));
                }
            }
        }
    }

    /// Write a single `Frame` value to the underlying stream.
    pub async fn write_frame(&mut self, frame: &Frame) -> crate::Result<()> {
        let mut dst = BytesMut::new();

        // Encode fully before touching the socket so a failed encoding leaves the
        // stream untouched.
        frame.encode(&mut dst)?;

        self.stream.write_all(&dst).await?;
        self.stream.flush().await?;

        Ok(())
    }

    /// Shut down the write half of the socket and drop any buffered input.
    pub async fn shutdown(&mut self) -> crate::Result<()> {
        self.buffer.clear();
        self.stream.shutdown().await?;
        Ok(())
    }
}
