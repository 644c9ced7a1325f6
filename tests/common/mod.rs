#![allow(dead_code)]

use bytes::{Buf, BytesMut};
use redesk::frame::{self, Frame};
use std::io::Cursor;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// What the mock server does with a request.
pub enum Reply {
    /// Write these bytes back.
    Raw(&'static [u8]),
    /// Write an owned byte string back.
    Owned(Vec<u8>),
    /// Never answer.
    Hang,
    /// Close the socket.
    Close,
    /// Write these bytes, then close the socket.
    Truncate(&'static [u8]),
}

/// Start a server that accepts one client and answers each request with `handler`.
///
/// `PING` is answered with `+PONG` unless the handler says otherwise first.
pub async fn mock_server<F>(mut handler: F) -> SocketAddr
where
    F: FnMut(&[String]) -> Option<Reply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(_) => return,
        };
        let mut buffer = BytesMut::new();

        loop {
            let mut cursor = Cursor::new(&buffer[..]);

            match Frame::check(&mut cursor, 8) {
                Ok(()) => {
                    let len = cursor.position() as usize;
                    cursor.set_position(0);
                    let request = Frame::parse(&mut cursor).unwrap();
                    buffer.advance(len);

                    let args = to_args(request);
                    let reply = match handler(&args) {
                        Some(reply) => reply,
                        None if args[0] == "PING" => Reply::Raw(b"+PONG\r\n"),
                        None => Reply::Raw(b"-ERR unknown command\r\n"),
                    };

                    match reply {
                        Reply::Raw(bytes) => socket.write_all(bytes).await.unwrap(),
                        Reply::Owned(bytes) => socket.write_all(&bytes).await.unwrap(),
                        Reply::Hang => {}
                        Reply::Close => return,
                        Reply::Truncate(bytes) => {
                            let _ = socket.write_all(bytes).await;
                            return;
                        }
                    }
                }
                Err(frame::Error::Incomplete) => {
                    match socket.read_buf(&mut buffer).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) => {}
                    }
                }
                Err(err) => panic!("bad request: {}", err),
            }
        }
    });

    addr
}

fn to_args(frame: Frame) -> Vec<String> {
    match frame {
        Frame::Array(parts) => parts.iter().map(|part| part.to_string()).collect(),
        frame => panic!("request is not an array: {:?}", frame),
    }
}
