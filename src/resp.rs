//! Minimal incremental RESP reply scanner.
//!
//! Spec §1 treats a "RESP wire encoder/decoder that parses replies
//! incrementally from a read buffer" as an external collaborator, not
//! something to redesign. No published crate matches this closely enough to
//! import, so it's implemented here directly and kept as thin as the spec
//! allows: detect one complete reply and its byte length from the front of a
//! buffer, and say whether it was a server error reply. Nothing else is
//! interpreted — resp-bench never inspects reply payloads.

const MAX_NESTING: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// Total bytes this reply occupies at the front of the buffer.
    pub len: usize,
    /// True if this was a top-level `-ERR ...` reply.
    pub is_error: bool,
}

/// Attempts to scan one complete RESP reply starting at `buf[0]`.
///
/// Returns `Ok(None)` if `buf` doesn't yet contain a complete reply (the
/// caller should read more bytes and retry). Returns `Err` on a malformed
/// type byte or length field — a framing error, which per §4.1/§5 is fatal.
pub fn scan_reply(buf: &[u8]) -> Result<Option<Reply>, String> {
    match scan_value(buf, 0, 0)? {
        Some(len) => {
            let is_error = buf.first() == Some(&b'-');
            Ok(Some(Reply { len, is_error }))
        }
        None => Ok(None),
    }
}

/// Scans one RESP value starting at `buf[pos]`; returns the number of bytes
/// it occupies (relative to `pos`, i.e. not including anything before `pos`).
fn scan_value(buf: &[u8], pos: usize, depth: u32) -> Result<Option<usize>, String> {
    if depth > MAX_NESTING {
        return Err("RESP array nesting too deep".to_string());
    }
    if pos >= buf.len() {
        return Ok(None);
    }

    match buf[pos] {
        b'+' | b'-' | b':' => match find_crlf(buf, pos + 1) {
            Some(line_end) => Ok(Some(line_end + 2 - pos)),
            None => Ok(None),
        },
        b'$' => {
            let Some(line_end) = find_crlf(buf, pos + 1) else {
                return Ok(None);
            };
            let header = std::str::from_utf8(&buf[pos + 1..line_end])
                .map_err(|_| "non-utf8 bulk length".to_string())?;
            let n: i64 = header
                .parse()
                .map_err(|_| format!("invalid bulk length {header:?}"))?;
            let header_len = line_end + 2 - pos;
            if n < 0 {
                // Null bulk string: "$-1\r\n", no payload.
                return Ok(Some(header_len));
            }
            let payload_len = n as usize;
            let total = header_len + payload_len + 2;
            if buf.len() - pos < total {
                return Ok(None);
            }
            Ok(Some(total))
        }
        b'*' => {
            let Some(line_end) = find_crlf(buf, pos + 1) else {
                return Ok(None);
            };
            let header = std::str::from_utf8(&buf[pos + 1..line_end])
                .map_err(|_| "non-utf8 array length".to_string())?;
            let n: i64 = header
                .parse()
                .map_err(|_| format!("invalid array length {header:?}"))?;
            let mut total = line_end + 2 - pos;
            if n <= 0 {
                // "*-1\r\n" (null array) or "*0\r\n" (empty array).
                return Ok(Some(total));
            }
            for _ in 0..n {
                match scan_value(buf, pos + total, depth + 1)? {
                    Some(elem_len) => total += elem_len,
                    None => return Ok(None),
                }
            }
            Ok(Some(total))
        }
        other => Err(format!("unrecognized RESP type byte {:?}", other as char)),
    }
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    if from > buf.len() {
        return None;
    }
    buf[from..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|i| from + i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_string_reply() {
        let reply = scan_reply(b"+OK\r\n").unwrap().unwrap();
        assert_eq!(reply.len, 5);
        assert!(!reply.is_error);
    }

    #[test]
    fn error_reply_is_flagged() {
        let reply = scan_reply(b"-ERR boom\r\n").unwrap().unwrap();
        assert_eq!(reply.len, 11);
        assert!(reply.is_error);
    }

    #[test]
    fn integer_reply() {
        let reply = scan_reply(b":1000\r\n").unwrap().unwrap();
        assert_eq!(reply.len, 7);
    }

    #[test]
    fn bulk_string_reply() {
        let reply = scan_reply(b"$5\r\nhello\r\n").unwrap().unwrap();
        assert_eq!(reply.len, 11);
    }

    #[test]
    fn null_bulk_string_reply() {
        let reply = scan_reply(b"$-1\r\n").unwrap().unwrap();
        assert_eq!(reply.len, 5);
    }

    #[test]
    fn array_of_bulk_strings() {
        let reply = scan_reply(b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").unwrap().unwrap();
        assert_eq!(reply.len, 23);
    }

    #[test]
    fn incomplete_bulk_string_requests_more_data() {
        assert_eq!(scan_reply(b"$5\r\nhel").unwrap(), None);
    }

    #[test]
    fn incomplete_line_requests_more_data() {
        assert_eq!(scan_reply(b"+OK").unwrap(), None);
    }

    #[test]
    fn trailing_bytes_are_not_consumed() {
        let reply = scan_reply(b"+OK\r\n+PONG\r\n").unwrap().unwrap();
        assert_eq!(reply.len, 5);
    }

    #[test]
    fn bad_type_byte_is_a_protocol_error() {
        assert!(scan_reply(b"X garbage\r\n").is_err());
    }
}
