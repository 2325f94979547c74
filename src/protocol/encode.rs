//! Command encoding

use super::constants::CRLF;
use super::message::Command;
use bytes::{BufMut, BytesMut};
use std::io;

/// Encode a command into a CRLF-terminated line
///
/// Arguments containing CR or LF are rejected: they would let a path smuggle
/// a second command onto the control connection.
pub fn encode_command(cmd: &Command) -> io::Result<BytesMut> {
    let verb = cmd.verb();
    let arg = cmd.argument();

    if let Some(arg) = arg {
        if arg.bytes().any(|b| b == b'\r' || b == b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} argument contains a line break", verb),
            ));
        }
    }

    let len = verb.len() + arg.map_or(0, |a| a.len() + 1) + CRLF.len();
    let mut buf = BytesMut::with_capacity(len);

    buf.put(verb.as_bytes());
    if let Some(arg) = arg {
        buf.put_u8(b' ');
        buf.put(arg.as_bytes());
    }
    buf.put(CRLF);

    Ok(buf)
}
