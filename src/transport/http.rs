// src/transport/http.rs

//! HTTP/1.1 request writing and response framing
//!
//! Only what the metadata service needs: `GET` requests and responses
//! delimited by `Content-Length`, chunked transfer encoding, or (as a last
//! resort) connection close.

use crate::error::{Error, Result};
use std::io::{BufRead, Read, Write};

/// User agent sent with every request
const USER_AGENT: &str = concat!("pmt/", env!("CARGO_PKG_VERSION"));

/// Upper bound on a single header or chunk-size line
const MAX_LINE_LEN: usize = 8192;

/// Upper bound on a decoded response body
pub const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

/// A decoded HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// The server will not reuse this connection
    pub close: bool,
}

impl Response {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Write a keep-alive `GET` request for `path`
pub fn write_get<W: Write>(writer: &mut W, host: &str, path: &str) -> std::io::Result<()> {
    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Connection: keep-alive\r\n\
         Accept: application/json\r\n\
         User-Agent: {USER_AGENT}\r\n\
         \r\n"
    );
    writer.write_all(request.as_bytes())?;
    writer.flush()
}

/// Read one response: status line, headers up to the blank line, then the body
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<Response> {
    let status_line = read_line(reader)?;
    let status = parse_status_line(&status_line)?;

    let mut headers = Vec::new();
    loop {
        let line = read_line(reader)?;
        if line.is_empty() {
            break;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(Error::ParseError(format!("Malformed header line: {line}")));
        };
        headers.push((key.trim().to_string(), value.trim().to_string()));
    }

    let mut response = Response {
        status,
        headers,
        body: Vec::new(),
        close: false,
    };

    response.close = response
        .header("connection")
        .is_some_and(|v| v.eq_ignore_ascii_case("close"));

    let chunked = response
        .header("transfer-encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));

    if chunked {
        response.body = read_chunked(reader)?;
    } else if let Some(length) = response.header("content-length") {
        let length: usize = length
            .parse()
            .map_err(|_| Error::ParseError(format!("Invalid Content-Length: {length}")))?;
        if length > MAX_BODY_LEN {
            return Err(Error::ParseError(format!("Content-Length {length} exceeds limit")));
        }
        read_exactly(reader, &mut response.body, length)?;
    } else {
        // No framing: the body runs until the server closes the connection
        let read = reader
            .by_ref()
            .take(MAX_BODY_LEN as u64 + 1)
            .read_to_end(&mut response.body)
            .map_err(|e| Error::TransportError(format!("Failed to read body: {e}")))?;
        if read > MAX_BODY_LEN {
            return Err(Error::ParseError("Response body exceeds limit".to_string()));
        }
        response.close = true;
    }

    Ok(response)
}

/// Decode a chunked transfer-encoded body
///
/// Each chunk is a hex size line, that many bytes, and a CRLF; a zero-size
/// chunk ends the body and is followed by optional trailers and a blank line.
pub fn read_chunked<R: BufRead>(reader: &mut R) -> Result<Vec<u8>> {
    let mut body = Vec::new();

    loop {
        let size_line = read_line(reader)?;
        // Chunk extensions follow a semicolon and are ignored
        let size_str = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| Error::ParseError(format!("Invalid chunk size: {size_line:?}")))?;

        if size == 0 {
            // Trailers until the terminating blank line
            while !read_line(reader)?.is_empty() {}
            return Ok(body);
        }

        match body.len().checked_add(size) {
            Some(total) if total <= MAX_BODY_LEN => {}
            _ => return Err(Error::ParseError(format!("Chunk of {size} bytes exceeds body limit"))),
        }
        read_exactly(reader, &mut body, size)?;

        let terminator = read_line(reader)?;
        if !terminator.is_empty() {
            return Err(Error::ParseError(
                "Chunk not terminated by CRLF".to_string(),
            ));
        }
    }
}

/// Append exactly `len` bytes to `buf`; growth follows the bytes actually read
fn read_exactly<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>, len: usize) -> Result<()> {
    let read = reader
        .by_ref()
        .take(len as u64)
        .read_to_end(buf)
        .map_err(|e| Error::TransportError(format!("Read failed: {e}")))?;
    if read < len {
        return Err(Error::TransportError(format!(
            "Connection closed after {read} of {len} body bytes"
        )));
    }
    Ok(())
}

/// Read a CRLF- (or bare LF-) terminated line without the terminator
fn read_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut buf = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', &mut buf)
        .map_err(|e| Error::TransportError(format!("Read failed: {e}")))?;

    if read == 0 {
        return Err(Error::TransportError(
            "Connection closed by server".to_string(),
        ));
    }
    if buf.last() != Some(&b'\n') {
        return Err(Error::ParseError("Line too long or truncated".to_string()));
    }

    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|e| Error::ParseError(format!("Non-UTF-8 header data: {e}")))
}

fn parse_status_line(line: &str) -> Result<u16> {
    let mut parts = line.split_whitespace();
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/1.") {
        return Err(Error::ParseError(format!("Unexpected status line: {line}")));
    }
    parts
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| Error::ParseError(format!("Missing status code: {line}")))
}

/// Percent-encode a query component
///
/// Bytes outside `A-Za-z0-9-_.~` are escaped as `%XX` of their UTF-8 encoding.
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(raw: &str) -> Response {
        read_response(&mut Cursor::new(raw.as_bytes().to_vec())).unwrap()
    }

    #[test]
    fn test_chunked_body() {
        let resp = parse(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
        );
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"hello");
        assert!(!resp.close);
    }

    #[test]
    fn test_content_length_body_matches_chunked() {
        let fixed = parse("HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nworld");
        let chunked =
            parse("HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n5\r\nworld\r\n0\r\n\r\n");
        assert_eq!(fixed.body, b"world");
        assert_eq!(fixed.body, chunked.body);
    }

    #[test]
    fn test_multiple_chunks_with_extensions_and_trailers() {
        let resp = parse(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
             4;name=x\r\n{\"a\"\r\nA\r\n:1234567}\n\r\n0\r\nX-Trailer: yes\r\n\r\n",
        );
        assert_eq!(resp.body, b"{\"a\":1234567}\n");
    }

    #[test]
    fn test_keep_alive_responses_back_to_back() {
        let raw = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\none\r\n0\r\n\r\n\
                   HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\ntwo";
        let mut cursor = Cursor::new(raw.as_bytes().to_vec());
        assert_eq!(read_response(&mut cursor).unwrap().body, b"one");
        assert_eq!(read_response(&mut cursor).unwrap().body, b"two");
    }

    #[test]
    fn test_close_delimited_body() {
        let resp = parse("HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nrest of stream");
        assert_eq!(resp.body, b"rest of stream");
        assert!(resp.close);
    }

    #[test]
    fn test_truncated_body_is_transport_error() {
        let result = read_response(&mut Cursor::new(
            b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort".to_vec(),
        ));
        assert!(matches!(result, Err(Error::TransportError(_))));
    }

    #[test]
    fn test_empty_stream_is_transport_error() {
        let result = read_response(&mut Cursor::new(Vec::new()));
        assert!(matches!(result, Err(Error::TransportError(_))));
    }

    #[test]
    fn test_bad_chunk_size() {
        let result = read_response(&mut Cursor::new(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n".to_vec(),
        ));
        assert!(matches!(result, Err(Error::ParseError(_))));
    }

    #[test]
    fn test_huge_chunk_size_is_rejected() {
        let result = read_response(&mut Cursor::new(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nffffffffffffffff\r\nx\r\n0\r\n\r\n"
                .to_vec(),
        ));
        assert!(matches!(result, Err(Error::ParseError(_))));
    }

    #[test]
    fn test_chunks_summing_past_limit_are_rejected() {
        let raw = format!(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nab\r\n{:x}\r\n",
            MAX_BODY_LEN - 1
        );
        let result = read_response(&mut Cursor::new(raw.into_bytes()));
        assert!(matches!(result, Err(Error::ParseError(_))));
    }

    #[test]
    fn test_huge_content_length_is_rejected() {
        let result = read_response(&mut Cursor::new(
            b"HTTP/1.1 200 OK\r\nContent-Length: 18446744073709551615\r\n\r\nabc".to_vec(),
        ));
        assert!(matches!(result, Err(Error::ParseError(_))));

        let just_over = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\nabc",
            MAX_BODY_LEN + 1
        );
        let result = read_response(&mut Cursor::new(just_over.into_bytes()));
        assert!(matches!(result, Err(Error::ParseError(_))));
    }

    #[test]
    fn test_large_chunk_size_with_short_stream_is_transport_error() {
        // Within the limit but the peer sends far less; nothing is preallocated
        let result = read_response(&mut Cursor::new(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n100000\r\nxyz".to_vec(),
        ));
        assert!(matches!(result, Err(Error::TransportError(_))));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let resp = parse("HTTP/1.1 404 Not Found\r\nCONTENT-LENGTH: 0\r\nX-Thing: a:b\r\n\r\n");
        assert_eq!(resp.status, 404);
        assert!(!resp.is_success());
        assert_eq!(resp.header("x-thing"), Some("a:b"));
    }

    #[test]
    fn test_write_get() {
        let mut out = Vec::new();
        write_get(&mut out, "aur.archlinux.org", "/rpc/v5/info?arg[]=foo").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("GET /rpc/v5/info?arg[]=foo HTTP/1.1\r\n"));
        assert!(text.contains("Host: aur.archlinux.org\r\n"));
        assert!(text.contains("Connection: keep-alive\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("abc-_.~XYZ09"), "abc-_.~XYZ09");
        assert_eq!(percent_encode("a b+c"), "a%20b%2Bc");
        assert_eq!(percent_encode("lib32-gcc>=1"), "lib32-gcc%3E%3D1");
        assert_eq!(percent_encode("é"), "%C3%A9");
    }
}
