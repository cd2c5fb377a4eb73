//! Framed JSON-RPC transport.
//!
//! Messages are delimited by `Header: value\r\n` lines terminated by an
//! empty line, followed by exactly `Content-Length` bytes of JSON payload.
//! Only `Content-Length` is honored; other headers are ignored. Outbound
//! messages are framed identically and flushed immediately.

use std::io::{self, BufRead, Read, Write};

use serde_json::Value;

/// Read one line, tolerating `\n`, `\r\n`, and EOF without a newline.
///
/// Returns `None` at EOF with no pending bytes.
fn read_line_lenient(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    let read = input.read_until(b'\n', &mut buf)?;
    if read == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

/// Read one framed message body.
///
/// Returns `None` when the stream ends before a complete header block,
/// which is the clean-termination signal for the loop.
pub fn read_message(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut length: Option<usize> = None;
    loop {
        let Some(line) = read_line_lenient(input)? else {
            return Ok(None);
        };
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            length = value.trim().parse().ok();
        }
    }
    let Some(length) = length else {
        return Ok(None);
    };

    let mut body = vec![0u8; length];
    input.read_exact(&mut body)?;
    String::from_utf8(body)
        .map(Some)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

/// Write one framed message and flush.
pub fn write_message(output: &mut impl Write, message: &Value) -> io::Result<()> {
    let body = message.to_string();
    write!(output, "Content-Length: {}\r\n\r\n{body}", body.len())?;
    output.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn frame(body: &str) -> Vec<u8> {
        format!("Content-Length: {}\r\n\r\n{body}", body.len()).into_bytes()
    }

    #[test]
    fn reads_a_framed_message() {
        let mut input = Cursor::new(frame(r#"{"method":"initialized"}"#));
        let body = read_message(&mut input).unwrap().unwrap();
        assert_eq!(body, r#"{"method":"initialized"}"#);
    }

    #[test]
    fn reads_consecutive_messages() {
        let mut bytes = frame("{}");
        bytes.extend(frame(r#"{"id":1}"#));
        let mut input = Cursor::new(bytes);
        assert_eq!(read_message(&mut input).unwrap().unwrap(), "{}");
        assert_eq!(read_message(&mut input).unwrap().unwrap(), r#"{"id":1}"#);
        assert!(read_message(&mut input).unwrap().is_none());
    }

    #[test]
    fn tolerates_bare_newline_headers() {
        let body = r#"{"ok":true}"#;
        let mut input = Cursor::new(format!("Content-Length: {}\n\n{body}", body.len()).into_bytes());
        assert_eq!(read_message(&mut input).unwrap().unwrap(), body);
    }

    #[test]
    fn ignores_unknown_headers() {
        let body = "{}";
        let framed = format!(
            "Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let mut input = Cursor::new(framed.into_bytes());
        assert_eq!(read_message(&mut input).unwrap().unwrap(), body);
    }

    #[test]
    fn eof_before_headers_terminates_cleanly() {
        let mut input = Cursor::new(Vec::new());
        assert!(read_message(&mut input).unwrap().is_none());
    }

    #[test]
    fn eof_mid_headers_terminates_cleanly() {
        let mut input = Cursor::new(b"Content-Length: 10".to_vec());
        assert!(read_message(&mut input).unwrap().is_none());
    }

    #[test]
    fn writes_the_expected_frame() {
        let mut out = Vec::new();
        write_message(&mut out, &json!({"id": 1})).unwrap();
        assert_eq!(out, frame(r#"{"id":1}"#));
    }
}
