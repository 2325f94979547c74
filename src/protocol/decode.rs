//! Reply decoding
//!
//! Replies arrive on the control connection as one or more CRLF-terminated
//! lines. A single-line reply is `ddd text`; a multi-line reply starts with
//! `ddd-text` and ends at the first line that starts with the same code
//! followed by a space.

use super::constants::codes;
use super::message::Reply;
use bytes::BytesMut;
use chrono::NaiveDateTime;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};

/// Maximum size of a single reply (1 MiB). `STAT` on a large directory is the
/// only reply that legitimately approaches this.
const MAX_REPLY_LENGTH: usize = 1024 * 1024;

/// Decode a reply from the front of `data` without consuming it
///
/// # Returns
/// `Ok((reply, consumed))` - Reply and number of bytes it occupied
/// `Err(e)` - `UnexpectedEof` if the reply is incomplete, `InvalidData` if it
/// is malformed
pub fn decode_reply(data: &BytesMut) -> io::Result<(Reply, usize)> {
    let mut offset = 0;
    let mut lines = Vec::new();
    let mut code: Option<u16> = None;

    loop {
        let rest = &data[offset..];
        let Some(end) = rest.windows(2).position(|w| w == b"\r\n") else {
            if data.len() > MAX_REPLY_LENGTH {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "reply length exceeds maximum allowed {}",
                        MAX_REPLY_LENGTH
                    ),
                ));
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "incomplete reply line",
            ));
        };

        let line = String::from_utf8_lossy(&rest[..end]).into_owned();
        offset += end + 2;

        match code {
            None => {
                let parsed = parse_code(&line).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("reply does not start with a code: {:?}", line),
                    )
                })?;
                let multiline = line.as_bytes().get(3) == Some(&b'-');
                lines.push(line);
                if !multiline {
                    return Ok((Reply::new(parsed, lines), offset));
                }
                code = Some(parsed);
            }
            Some(expected) => {
                let terminal = parse_code(&line) == Some(expected)
                    && matches!(line.as_bytes().get(3), None | Some(b' '));
                lines.push(line);
                if terminal {
                    return Ok((Reply::new(expected, lines), offset));
                }
            }
        }
    }
}

fn parse_code(line: &str) -> Option<u16> {
    let digits = line.get(..3)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match line.as_bytes().get(3) {
        None | Some(b' ') | Some(b'-') => digits.parse().ok(),
        _ => None,
    }
}

/// Extract the data connection address from a `227 Entering Passive Mode
/// (h1,h2,h3,h4,p1,p2)` reply
pub fn parse_pasv(reply: &Reply) -> Option<SocketAddrV4> {
    if reply.code != codes::ENTERING_PASSIVE_MODE {
        return None;
    }
    let text = reply.lines.first()?;

    // The numbers may or may not be wrapped in parentheses, so scan for the
    // first run of six comma separated integers after the code.
    let body = text.get(4..)?;
    let begin = body.find(|c: char| c.is_ascii_digit())?;
    let numbers: Vec<u8> = body[begin..]
        .split(|c: char| !(c.is_ascii_digit() || c == ','))
        .next()?
        .split(',')
        .map(|n| n.parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;

    if numbers.len() != 6 {
        return None;
    }

    let ip = Ipv4Addr::new(numbers[0], numbers[1], numbers[2], numbers[3]);
    let port = (numbers[4] as u16) << 8 | numbers[5] as u16;
    Some(SocketAddrV4::new(ip, port))
}

/// Extract the path from a `257 "path" ...` reply; embedded quotes are
/// doubled on the wire
pub fn parse_pwd(reply: &Reply) -> Option<String> {
    if reply.code != codes::PATHNAME_CREATED {
        return None;
    }
    let text = reply.lines.first()?.get(4..)?;
    let mut chars = text.chars().skip_while(|c| *c != '"');
    chars.next()?;

    let mut path = String::new();
    loop {
        match chars.next()? {
            '"' => {
                let mut peek = chars.clone();
                if peek.next() == Some('"') {
                    path.push('"');
                    chars.next();
                } else {
                    return Some(path);
                }
            }
            c => path.push(c),
        }
    }
}

/// Feature names from a `211` `FEAT` reply, upper-cased, without parameters
pub fn parse_features(reply: &Reply) -> Vec<String> {
    if reply.code != codes::SYSTEM_STATUS || reply.lines.len() < 2 {
        return Vec::new();
    }
    reply.lines[1..reply.lines.len() - 1]
        .iter()
        .filter_map(|line| line.split_whitespace().next())
        .map(|feature| feature.to_ascii_uppercase())
        .collect()
}

/// Parse a `213` `SIZE` reply
pub fn parse_size(reply: &Reply) -> Option<u64> {
    if reply.code != codes::FILE_STATUS {
        return None;
    }
    reply.text().trim().parse().ok()
}

/// Parse an RFC 3659 time-val (`YYYYMMDDHHMMSS[.sss]`, always UTC)
pub fn parse_time_val(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    let whole = value.split('.').next()?;
    if whole.len() != 14 {
        return None;
    }
    NaiveDateTime::parse_from_str(whole, "%Y%m%d%H%M%S").ok()
}
