//! RESP encoding of commands and framing of replies

use bytes::{BufMut, BytesMut};

use crate::error::WriterError;

/// Append `argv` as a RESP array of bulk strings
pub fn encode_into<S: AsRef<str>>(buf: &mut BytesMut, argv: &[S]) {
    buf.put_slice(format!("*{}\r\n", argv.len()).as_bytes());
    for arg in argv {
        let arg = arg.as_ref().as_bytes();
        buf.put_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.put_slice(arg);
        buf.put_slice(b"\r\n");
    }
}

/// Encode `argv` as a RESP array of bulk strings
pub fn encode<S: AsRef<str>>(argv: &[S]) -> BytesMut {
    let mut buf = BytesMut::new();
    encode_into(&mut buf, argv);
    buf
}

/// Top-level kind of a complete reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK` style status
    Status(String),
    /// `-ERR ...` error
    Error(String),
    /// Integer, bulk string or array
    Value,
}

impl Reply {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Frame one complete reply at the start of `buf`
///
/// Returns `Ok(None)` when more bytes are needed, otherwise the reply kind
/// and the number of bytes it spans. Nested arrays are walked iteratively
/// with a count of elements still expected.
pub fn parse_reply(buf: &[u8]) -> Result<Option<(Reply, usize)>, WriterError> {
    let mut pos = 0;
    let mut remaining: i64 = 1;
    let mut top: Option<Reply> = None;

    while remaining > 0 {
        let Some(line_end) = find_crlf(&buf[pos..]) else {
            return Ok(None);
        };
        let line = &buf[pos..pos + line_end];
        let Some((&kind, body)) = line.split_first() else {
            return Err(WriterError::Protocol("empty reply line".to_string()));
        };
        let text = String::from_utf8_lossy(body);
        pos += line_end + 2;
        remaining -= 1;

        let reply = match kind {
            b'+' => Reply::Status(text.into_owned()),
            b'-' => Reply::Error(text.into_owned()),
            b':' | b',' | b'#' | b'_' => Reply::Value,
            b'$' => {
                let len = parse_len(&text)?;
                if len >= 0 {
                    let end = pos + len as usize + 2;
                    if buf.len() < end {
                        return Ok(None);
                    }
                    pos = end;
                }
                Reply::Value
            }
            b'*' | b'~' | b'>' => {
                let len = parse_len(&text)?;
                if len > 0 {
                    remaining += len;
                }
                Reply::Value
            }
            b'%' => {
                let len = parse_len(&text)?;
                if len > 0 {
                    remaining += len * 2;
                }
                Reply::Value
            }
            other => {
                return Err(WriterError::Protocol(format!(
                    "unexpected reply type byte 0x{other:02x}"
                )));
            }
        };
        top.get_or_insert(reply);
    }

    Ok(top.map(|reply| (reply, pos)))
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn parse_len(text: &str) -> Result<i64, WriterError> {
    text.trim()
        .parse()
        .map_err(|_| WriterError::Protocol(format!("invalid length '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let buf = encode(&["SET", "a", "1"]);
        assert_eq!(&buf[..], b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n");
    }

    #[test]
    fn test_parse_simple_replies() {
        assert_eq!(
            parse_reply(b"+OK\r\n").unwrap(),
            Some((Reply::Status("OK".into()), 5))
        );
        let (reply, n) = parse_reply(b"-ERR wrong type\r\n+OK\r\n").unwrap().unwrap();
        assert_eq!(reply, Reply::Error("ERR wrong type".into()));
        assert_eq!(n, 17);
        assert_eq!(parse_reply(b":42\r\n").unwrap(), Some((Reply::Value, 5)));
    }

    #[test]
    fn test_parse_bulk_and_nested_arrays() {
        assert_eq!(parse_reply(b"$-1\r\n").unwrap(), Some((Reply::Value, 5)));
        assert_eq!(parse_reply(b"$3\r\nfoo\r\n").unwrap(), Some((Reply::Value, 9)));

        let nested = b"*2\r\n*2\r\n:1\r\n$1\r\na\r\n$-1\r\n";
        assert_eq!(
            parse_reply(nested).unwrap(),
            Some((Reply::Value, nested.len()))
        );
    }

    #[test]
    fn test_parse_incomplete() {
        assert_eq!(parse_reply(b"+OK").unwrap(), None);
        assert_eq!(parse_reply(b"$3\r\nfo").unwrap(), None);
        assert_eq!(parse_reply(b"*2\r\n:1\r\n").unwrap(), None);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_reply(b"?what\r\n").is_err());
        assert!(parse_reply(b"$x\r\n").is_err());
    }
}
