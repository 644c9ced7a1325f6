//! Provides a type representing a Redis protocol frame.
//!
//! The Redis protocol can be found at <https://redis.io/topics/protocol>

use atoi::FromRadix10SignedChecked;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::io::{Cursor, Write};
use std::num::TryFromIntError;
use std::string::FromUtf8Error;

/// A frame in the Redis protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

#[derive(Debug)]
pub enum Error {
    /// Not enough data is available to parse a frame.
    Incomplete,

    /// The buffered bytes are not a valid frame.
    Invalid(String),
}

const ERROR_INVALID_FRAME: &str = "invalid frame format";

impl Frame {
    /// Returns an empty array frame.
    pub fn array() -> Frame {
        Frame::Array(vec![])
    }

    /// Pushes a "bulk" frame into the array.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not an array.
    pub fn push_bulk(&mut self, bytes: Bytes) {
        match self {
            Frame::Array(vec) => vec.push(Frame::Bulk(bytes)),
            _ => panic!("not an array frame"),
        }
    }

    /// Checks if an entire message can be decoded from `src`.
    ///
    /// Arrays may nest at most `depth` levels. On success the cursor is left
    /// right after the last byte of the frame.
    pub fn check(src: &mut Cursor<&[u8]>, depth: usize) -> Result<(), Error> {
        match eat_u8(src)? {
            // "+OK\r\n"
            b'+' => {
                eat_line(src)?;
                Ok(())
            }
            // "-Error message\r\n"
            b'-' => {
                eat_line(src)?;
                Ok(())
            }
            // ":1000\r\n"
            b':' => {
                eat_decimal(src)?;
                Ok(())
            }
            // "$-1\r\n" (Null)
            // "$6\r\nfoobar\r\n"
            b'$' => {
                let len = eat_decimal(src)?;

                if len < 0 {
                    return Ok(());
                }

                // skip the body, then require the trailing \r\n
                skip(src, len.try_into()?)?;
                eat_crlf(src)
            }
            // "*-1\r\n" (Null)
            // "*2\r\n:1\r\n$3\r\nfoo\r\n"
            b'*' => {
                let len = eat_decimal(src)?;

                if len < 0 {
                    return Ok(());
                }

                if depth == 0 {
                    return Err("array nesting exceeds the maximum depth".into());
                }

                // check each entry, one level deeper
                for _ in 0..len {
                    Frame::check(src, depth - 1)?;
                }

                Ok(())
            }
            other => Err(format!("invalid frame type byte `0x{:02x}`", other).into()),
        }
    }

    /// Parses the message into a `Frame`.
    ///
    /// The message should be validated with `check()` before calling this function.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, Error> {
        match eat_u8(src)? {
            b'+' => {
                let line = eat_line(src)?.to_vec();
                let string = String::from_utf8(line)?;

                Ok(Frame::Simple(string))
            }
            b'-' => {
                let line = eat_line(src)?.to_vec();
                let string = String::from_utf8(line)?;

                Ok(Frame::Error(string))
            }
            b':' => {
                let int = eat_decimal(src)?;
                Ok(Frame::Integer(int))
            }
            b'$' => {
                let len = eat_decimal(src)?;

                // Null bulk strings carry neither a body nor a trailing CRLF.
                if len < 0 {
                    return Ok(Frame::Null);
                }

                let len: usize = len.try_into()?;

                if src.remaining() < len {
                    return Err(Error::Incomplete);
                }

                // read the bulk string
                let data = Bytes::copy_from_slice(&src.chunk()[..len]);

                // skip the number of bytes + 2 (\r\n)
                skip(src, len)?;
                eat_crlf(src)?;

                Ok(Frame::Bulk(data))
            }
            b'*' => {
                let len = eat_decimal(src)?;

                if len < 0 {
                    return Ok(Frame::Null);
                }

                let len: usize = len.try_into()?;
                // the length comes from the peer, so cap the preallocation
                let mut out = Vec::with_capacity(len.min(1024));

                for _ in 0..len {
                    out.push(Frame::parse(src)?);
                }

                Ok(Frame::Array(out))
            }
            other => Err(format!("invalid frame type byte `0x{:02x}`", other).into()),
        }
    }

    /// Writes the wire representation of the frame into `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> crate::Result<()> {
        match self {
            Frame::Simple(val) => {
                dst.put_u8(b'+');
                dst.put_slice(val.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Error(val) => {
                dst.put_u8(b'-');
                dst.put_slice(val.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Integer(val) => {
                dst.put_u8(b':');
                put_decimal(dst, *val)?;
            }
            Frame::Bulk(val) => {
                dst.put_u8(b'$');
                put_decimal(dst, len_to_i64(val.len())?)?;
                dst.put_slice(val);
                dst.put_slice(b"\r\n");
            }
            Frame::Null => {
                dst.put_slice(b"$-1\r\n");
            }
            Frame::Array(val) => {
                dst.put_u8(b'*');
                put_decimal(dst, len_to_i64(val.len())?)?;

                for entry in val {
                    entry.encode(dst)?;
                }
            }
        }

        Ok(())
    }
}

fn eat_u8(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }

    Ok(src.get_u8())
}

fn eat_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    match buf[start..].windows(2).position(|w| w == b"\r\n") {
        Some(offset) => {
            let end = start + offset;

            // found a line, update the position to be **after** the \n
            src.set_position((end + 2) as u64);

            Ok(&buf[start..end])
        }
        None => Err(Error::Incomplete),
    }
}

fn eat_crlf(src: &mut Cursor<&[u8]>) -> Result<(), Error> {
    if src.remaining() < 2 {
        return Err(Error::Incomplete);
    }

    if &src.chunk()[..2] != b"\r\n" {
        return Err("missing CRLF terminator".into());
    }

    src.advance(2);
    Ok(())
}

fn skip(src: &mut Cursor<&[u8]>, n: usize) -> Result<(), Error> {
    if src.remaining() < n {
        return Err(Error::Incomplete);
    }

    src.advance(n);
    Ok(())
}

fn eat_decimal(src: &mut Cursor<&[u8]>) -> Result<i64, Error> {
    let line = eat_line(src)?;

    // An optional `-` followed by at least one digit. RESP never sends `+`.
    let digits = line.strip_prefix(b"-").unwrap_or(line);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(format!("{}: bad decimal {:?}", ERROR_INVALID_FRAME, Bytes::copy_from_slice(line)).into());
    }

    match i64::from_radix_10_signed_checked(line) {
        (Some(n), used) if used == line.len() => Ok(n),
        _ => Err(format!("{}: bad decimal {:?}", ERROR_INVALID_FRAME, Bytes::copy_from_slice(line)).into()),
    }
}

/// Write a decimal followed by CRLF.
fn put_decimal(dst: &mut BytesMut, val: i64) -> crate::Result<()> {
    let mut buf = [0u8; 20];
    let mut buf = Cursor::new(&mut buf[..]);

    write!(&mut buf, "{}", val).map_err(|e| crate::Error::Encoding(e.to_string()))?;

    let pos = buf.position() as usize;
    dst.put_slice(&buf.get_ref()[..pos]);
    dst.put_slice(b"\r\n");

    Ok(())
}

fn len_to_i64(len: usize) -> crate::Result<i64> {
    len.try_into()
        .map_err(|_| crate::Error::Encoding(format!("length {} does not fit a frame header", len)))
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Incomplete => "stream ended early".fmt(fmt),
            Error::Invalid(msg) => msg.fmt(fmt),
        }
    }
}

impl From<String> for Error {
    fn from(src: String) -> Error {
        Error::Invalid(src)
    }
}

impl From<&str> for Error {
    fn from(src: &str) -> Error {
        src.to_string().into()
    }
}

impl From<FromUtf8Error> for Error {
    fn from(_src: FromUtf8Error) -> Error {
        "invalid UTF-8 in line".into()
    }
}

impl From<TryFromIntError> for Error {
    fn from(_src: TryFromIntError) -> Error {
        ERROR_INVALID_FRAME.into()
    }
}

impl From<Error> for crate::Error {
    fn from(src: Error) -> crate::Error {
        match src {
            // Running out of bytes is only observable once the peer has closed
            // the stream mid-frame.
            Error::Incomplete => crate::Error::Connection("stream ended early".to_string()),
            Error::Invalid(msg) => crate::Error::Protocol(msg),
        }
    }
}

/// Renders a reply the way the console shows it.
impl fmt::Display for Frame {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use std::str;

        match self {
            Frame::Simple(response) => response.fmt(fmt),
            Frame::Error(msg) => write!(fmt, "(error) {}", msg),
            Frame::Integer(num) => num.fmt(fmt),
            Frame::Bulk(msg) => match str::from_utf8(msg) {
                Ok(string) => string.fmt(fmt),
                Err(_) => write!(fmt, "{:?}", msg),
            },
            Frame::Null => "(nil)".fmt(fmt),
            Frame::Array(parts) => {
                write!(fmt, "[")?;

                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(fmt, ",")?;
                    }
                    part.fmt(fmt)?;
                }

                write!(fmt, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(data: &[u8]) -> Result<(Frame, usize), Error> {
        let mut cursor = Cursor::new(data);
        Frame::check(&mut cursor, 32)?;
        let len = cursor.position() as usize;

        cursor.set_position(0);
        let frame = Frame::parse(&mut cursor)?;
        assert_eq!(cursor.position() as usize, len);

        Ok((frame, len))
    }

    #[test]
    fn parse_simple_and_error() {
        assert_eq!(decode(b"+OK\r\n").unwrap().0, Frame::Simple("OK".into()));
        assert_eq!(
            decode(b"-ERR unknown command\r\n").unwrap().0,
            Frame::Error("ERR unknown command".into())
        );
    }

    #[test]
    fn parse_integers() {
        for n in [0i64, 1, -1, 1000, i64::MAX, i64::MIN] {
            let data = format!(":{}\r\n", n);
            assert_eq!(decode(data.as_bytes()).unwrap().0, Frame::Integer(n));
        }
    }

    #[test]
    fn null_bulk_does_not_read_body() {
        let (frame, len) = decode(b"$-1\r\n+next\r\n").unwrap();

        assert_eq!(frame, Frame::Null);
        assert_eq!(len, 5);
    }

    #[test]
    fn null_array() {
        assert_eq!(decode(b"*-1\r\n").unwrap().0, Frame::Null);
    }

    #[test]
    fn nested_array() {
        let (frame, _) = decode(b"*2\r\n*1\r\n+OK\r\n:5\r\n").unwrap();

        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::Array(vec![Frame::Simple("OK".into())]),
                Frame::Integer(5),
            ])
        );
    }

    #[test]
    fn consumes_exactly_one_frame() {
        let (frame, len) = decode(b"$3\r\nfoo\r\n:1\r\n").unwrap();

        assert_eq!(frame, Frame::Bulk(Bytes::from("foo")));
        assert_eq!(len, 9);
    }

    #[test]
    fn incomplete_frames() {
        let cases: [&[u8]; 6] = [b"", b"+OK", b"$3\r\nfo", b"$3\r\nfoo", b"*2\r\n:1\r\n", b":12"];

        for data in cases {
            assert!(matches!(decode(data), Err(Error::Incomplete)), "{:?}", data);
        }
    }

    #[test]
    fn malformed_frames() {
        let cases: [&[u8]; 13] = [
            b"?what\r\n",
            b":-\r\n",
            b":+\r\n",
            b":+5\r\n",
            b"$-\r\n\r\n",
            b"$+\r\n\r\n",
            b"*+\r\n",
            b"*-\r\n",
            b"$abc\r\n",
            b"$3\r\nfooXY",
            b":12x\r\n",
            b":\r\n",
            b"*z\r\n",
        ];

        for data in cases {
            assert!(matches!(decode(data), Err(Error::Invalid(_))), "{:?}", data);
        }
    }

    #[test]
    fn depth_is_bounded() {
        let mut data = Vec::new();
        for _ in 0..4 {
            data.extend_from_slice(b"*1\r\n");
        }
        data.extend_from_slice(b":1\r\n");

        let mut cursor = Cursor::new(&data[..]);
        assert!(Frame::check(&mut cursor, 4).is_ok());

        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(Frame::check(&mut cursor, 3), Err(Error::Invalid(_))));
    }

    #[test]
    fn encode_array_of_bulks() {
        let mut frame = Frame::array();
        frame.push_bulk(Bytes::from("SET"));
        frame.push_bulk(Bytes::from("a"));

        let mut dst = BytesMut::new();
        frame.encode(&mut dst).unwrap();

        assert_eq!(&dst[..], b"*2\r\n$3\r\nSET\r\n$1\r\na\r\n");
    }

    #[test]
    fn encode_nested_and_decode_back() {
        let frame = Frame::Array(vec![
            Frame::Integer(-7),
            Frame::Null,
            Frame::Array(vec![Frame::Simple("x".into()), Frame::Error("bad".into())]),
        ]);

        let mut dst = BytesMut::new();
        frame.encode(&mut dst).unwrap();

        assert_eq!(decode(&dst).unwrap().0, frame);
    }

    #[test]
    fn display_formats_replies() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("a")),
            Frame::Integer(2),
            Frame::Array(vec![Frame::Simple("x".into()), Frame::Null]),
        ]);

        assert_eq!(frame.to_string(), "[a,2,[x,(nil)]]");
        assert_eq!(Frame::Error("ERR no".into()).to_string(), "(error) ERR no");
        assert_eq!(Frame::Array(vec![]).to_string(), "[]");
    }
}
