//! Turns typed command lines into requests and replies into display text.

use crate::{ConnectionManager, Error, Frame};

use bytes::{Bytes, BytesMut};
use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info_span};
use tracing_futures::Instrument;

/// A request as an ordered list of arguments. The first one is the command name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<String>,
}

impl Command {
    /// Create a new `Command` from its arguments.
    pub fn new<I, S>(args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a command line into arguments.
    ///
    /// Arguments are separated by whitespace. An argument may be wrapped in double
    /// quotes, which understand `\n`, `\r`, `\t`, `\\` and `\"`, or in single quotes,
    /// which only understand `\'`. A blank line gives a command without arguments.
    pub fn parse(line: &str) -> crate::Result<Command> {
        let mut args = Vec::new();
        let mut chars = line.chars().peekable();

        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}

            let arg = match chars.peek() {
                None => return Ok(Command { args }),
                Some('"') => quoted(&mut chars, '"')?,
                Some('\'') => quoted(&mut chars, '\'')?,
                Some(_) => {
                    let mut arg = String::new();
                    while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                        arg.push(c);
                    }
                    arg
                }
            };

            args.push(arg);
        }
    }

    /// The command name, if any.
    pub fn name(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Converts the command into an array of bulk strings.
    pub fn into_frame(self) -> Frame {
        let mut frame = Frame::array();
        for arg in self.args {
            frame.push_bulk(Bytes::from(arg.into_bytes()));
        }
        frame
    }

    /// Returns the wire encoding of the command.
    pub fn encode(&self) -> crate::Result<Bytes> {
        let mut dst = BytesMut::new();
        self.clone().into_frame().encode(&mut dst)?;
        Ok(dst.freeze())
    }
}

/// Reads one quoted argument. The opening quote is still in `chars`.
fn quoted(chars: &mut Peekable<Chars<'_>>, quote: char) -> crate::Result<String> {
    chars.next();

    let mut arg = String::new();

    loop {
        match chars.next() {
            None => return Err(Error::Syntax("unbalanced quotes".into())),
            Some(c) if c == quote => break,
            Some('\\') if quote == '"' => match chars.next() {
                Some('n') => arg.push('\n'),
                Some('r') => arg.push('\r'),
                Some('t') => arg.push('\t'),
                Some(c) => arg.push(c),
                None => return Err(Error::Syntax("unbalanced quotes".into())),
            },
            Some('\\') if chars.peek() == Some(&'\'') => {
                chars.next();
                arg.push('\'');
            }
            Some(c) => arg.push(c),
        }
    }

    match chars.peek() {
        Some(c) if !c.is_whitespace() => Err(Error::Syntax(
            "closing quote must be followed by a space".into(),
        )),
        _ => Ok(arg),
    }
}

/// Parse `line` and send it, returning the decoded reply.
///
/// Blank lines are rejected with `Error::EmptyCommand` before anything is sent.
pub async fn execute(line: &str, conn: &ConnectionManager) -> crate::Result<Frame> {
    let cmd = Command::parse(line)?;

    if cmd.is_empty() {
        return Err(Error::EmptyCommand);
    }

    debug!(cmd = cmd.name().unwrap_or(""), args = cmd.args().len());

    conn.send(cmd).await
}

/// Parse `line`, send it and render the outcome as text.
///
/// Server error replies render as `(error) ...`. Failures on the client side
/// render as `(client error) ...` so a display can tell them apart.
pub async fn dispatch(line: &str, conn: &ConnectionManager) -> String {
    match execute(line, conn).await {
        Ok(reply) => reply.to_string(),
        Err(err) => format!("(client error) {}", err),
    }
}

/// Run `dispatch` on a background task, so the caller's loop stays responsive.
pub fn spawn_dispatch(line: String, conn: Arc<ConnectionManager>) -> JoinHandle<String> {
    let name = line.split_whitespace().next().unwrap_or("").to_string();
    let span = info_span!("dispatch", cmd = %name);

    tokio::spawn(async move { dispatch(&line, &conn).await }.instrument(span))
}
