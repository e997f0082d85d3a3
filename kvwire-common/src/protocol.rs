//! # RESP2 Encoding and Parsing
//!
//! Purpose: Encode client commands and parse server replies with explicit
//! byte lengths, keeping allocations under control.
//!
//! ## Design Principles
//! 1. **State-Free Parsing**: Replies are parsed top-down by recursive descent.
//! 2. **Buffer Reuse**: Caller provides buffers to avoid per-call allocations.
//! 3. **Binary-Safe**: Bulk strings are raw bytes; nothing is escaped.
//! 4. **Fail Fast**: Invalid framing returns errors immediately.
//!
//! ## Frame Layout
//!
//! ```text
//! request:  *<argc+1>\r\n $<len>\r\n<id>\r\n ($<len>\r\n<arg>\r\n)*
//! replies:  +<status>\r\n
//!           -<error>\r\n
//!           :<integer>\r\n
//!           $<len>\r\n<len bytes>\r\n     ($-1\r\n is nil)
//!           *<count>\r\n<count replies>   (*-1\r\n is nil)
//! ```

use std::io::{self, BufRead, Read};

use bytes::Bytes;

use crate::error::DecodeError;
use crate::reply::{ErrorReply, Reply};

/// Largest bulk payload accepted from a peer (the server's own default cap).
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

const PREALLOC_LIMIT: u64 = 64 * 1024;

/// Encodes a command as a RESP2 array of bulk strings into `out`.
///
/// The command id occupies slot 0, so the array header is `args.len() + 1`.
pub fn encode_command<A: AsRef<[u8]>>(id: &[u8], args: &[A], out: &mut Vec<u8>) {
    out.push(b'*');
    push_usize(out, args.len() + 1);
    out.extend_from_slice(b"\r\n");
    push_bulk(out, id);
    for arg in args {
        push_bulk(out, arg.as_ref());
    }
}

/// Reads one reply from the buffered reader.
pub fn read_reply<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> Result<Reply, DecodeError> {
    read_line(reader, line_buf)?;
    let Some(&prefix) = line_buf.first() else {
        return Err(DecodeError::MissingTerminator);
    };

    match prefix {
        b'+' => Ok(Reply::Status(String::from_utf8_lossy(&line_buf[1..]).into_owned())),
        b'-' => Ok(Reply::Error(ErrorReply::new(String::from_utf8_lossy(&line_buf[1..])))),
        b':' => Ok(Reply::Integer(parse_i64(&line_buf[1..])?)),
        b'$' => {
            let len = parse_i64(&line_buf[1..])?;
            match read_bulk(reader, len)? {
                Some(data) => Ok(Reply::Bulk(data)),
                None => Ok(Reply::Nil),
            }
        }
        b'*' => {
            let len = parse_i64(&line_buf[1..])?;
            if len == -1 {
                return Ok(Reply::Nil);
            }
            if len < 0 {
                return Err(DecodeError::InvalidLength(len));
            }
            let mut items = Vec::with_capacity(len.min(1024) as usize);
            for _ in 0..len {
                items.push(read_reply(reader, line_buf)?);
            }
            Ok(Reply::Array(items))
        }
        other => Err(DecodeError::UnknownPrefix(other)),
    }
}

/// Reads one request frame and splits it into the command id and arguments.
///
/// This is the inverse of [`encode_command`]; servers and test doubles use it
/// to see exactly what a client put on the wire.
pub fn read_request<R: BufRead>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
) -> Result<(Bytes, Vec<Bytes>), DecodeError> {
    read_line(reader, line_buf)?;
    if line_buf.first() != Some(&b'*') {
        return Err(DecodeError::InvalidRequest);
    }
    let count = parse_i64(&line_buf[1..])?;
    if count < 1 {
        return Err(DecodeError::InvalidRequest);
    }

    let mut parts = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        read_line(reader, line_buf)?;
        if line_buf.first() != Some(&b'$') {
            return Err(DecodeError::InvalidRequest);
        }
        let len = parse_i64(&line_buf[1..])?;
        match read_bulk(reader, len)? {
            Some(data) => parts.push(data),
            None => return Err(DecodeError::InvalidRequest),
        }
    }

    let id = parts.remove(0);
    Ok((id, parts))
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> Result<Option<Bytes>, DecodeError> {
    if len == -1 {
        return Ok(None);
    }
    if len < 0 {
        return Err(DecodeError::InvalidLength(len));
    }

    if len > MAX_BULK_LEN {
        return Err(DecodeError::InvalidLength(len));
    }

    // Payload and terminator are read together; the buffer grows with the
    // bytes actually received, not with the declared length.
    let total = len as u64 + 2;
    let mut data = Vec::with_capacity(total.min(PREALLOC_LIMIT) as usize);
    reader.by_ref().take(total).read_to_end(&mut data)?;
    if (data.len() as u64) < total {
        return Err(DecodeError::Io(io::Error::from(io::ErrorKind::UnexpectedEof)));
    }
    let len = len as usize;
    if &data[len..] != b"\r\n" {
        return Err(DecodeError::MissingTerminator);
    }
    data.truncate(len);
    Ok(Some(Bytes::from(data)))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Result<(), DecodeError> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 || buf.last() != Some(&b'\n') {
        return Err(DecodeError::ConnectionClosed);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(DecodeError::MissingTerminator);
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(data: &[u8]) -> Result<i64, DecodeError> {
    let (negative, digits) = match data.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, data),
    };
    if digits.is_empty() {
        return Err(DecodeError::InvalidInteger);
    }

    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(DecodeError::InvalidInteger);
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as i64))
            .ok_or(DecodeError::InvalidInteger)?;
    }

    Ok(if negative { -value } else { value })
}

fn push_bulk(out: &mut Vec<u8>, data: &[u8]) {
    out.push(b'$');
    push_usize(out, data.len());
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

fn push_usize(out: &mut Vec<u8>, mut value: usize) {
    // Write digits into a small stack buffer to avoid heap allocations.
    let mut buf = [0u8; 20];
    let mut len = 0;
    if value == 0 {
        buf[0] = b'0';
        len = 1;
    } else {
        while value > 0 {
            buf[len] = b'0' + (value % 10) as u8;
            value /= 10;
            len += 1;
        }
    }
    for idx in (0..len).rev() {
        out.push(buf[idx]);
    }
}
