//! Minimal HTTP/1.1 message codec
//!
//! Only what the hero web API needs: a request line or status line, headers,
//! and a body. Outgoing messages are always framed by `Content-Length`.

use std::fmt;

use thiserror::Error;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Upper bound on the start line plus headers
const MAX_HEAD_LEN: usize = 8192;

/// Upper bound on a decoded message body
pub const MAX_BODY_LEN: usize = 1 << 20;

const MAX_HEADERS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
  #[error("malformed message head: {0}")]
  MalformedHead(#[from] httparse::Error),
  #[error("request target must be an absolute path: {0}")]
  MalformedTarget(String),
  #[error("invalid Content-Length")]
  InvalidContentLength,
  #[error("invalid chunked body")]
  InvalidChunk,
  #[error("message head too large")]
  HeadTooLarge,
  #[error("message body too large")]
  BodyTooLarge,
  #[error("connection closed before a complete message arrived")]
  Incomplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
  Get,
  Post,
  Put,
  Delete,
  Other(String),
}

impl Method {
  fn from_token(token: &str) -> Self {
    match token {
      "GET" => Method::Get,
      "POST" => Method::Post,
      "PUT" => Method::Put,
      "DELETE" => Method::Delete,
      other => Method::Other(other.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Delete => "DELETE",
      Method::Other(s) => s,
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

type Headers = Vec<(String, String)>;

fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
  headers
    .iter()
    .find(|(k, _)| k.eq_ignore_ascii_case(name))
    .map(|(_, v)| v.as_str())
}

fn encode_head_and_body(buf: &mut Vec<u8>, headers: &Headers, body: &[u8]) {
  for (name, value) in headers {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
  }
  buf.extend_from_slice(b"Content-Length: ");
  buf.extend_from_slice(body.len().to_string().as_bytes());
  buf.extend_from_slice(b"\r\n\r\n");
  buf.extend_from_slice(body);
}

/// HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
  pub method: Method,
  /// Path plus optional query string, e.g. `/api/heroes?name=ma`
  pub target: String,
  pub headers: Headers,
  pub body: Vec<u8>,
}

impl Request {
  pub fn new(method: Method, target: impl Into<String>) -> Self {
    Self {
      method,
      target: target.into(),
      headers: Vec::new(),
      body: Vec::new(),
    }
  }

  /// Request with a JSON body and the matching content type
  pub fn json(method: Method, target: impl Into<String>, body: Vec<u8>) -> Self {
    Self::new(method, target)
      .with_header("Content-Type", JSON_CONTENT_TYPE)
      .with_body(body)
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn with_body(mut self, body: Vec<u8>) -> Self {
    self.body = body;
    self
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    find_header(&self.headers, name)
  }

  /// Target without the query string
  pub fn path(&self) -> &str {
    match self.target.split_once('?') {
      Some((path, _)) => path,
      None => &self.target,
    }
  }

  /// First value of a query parameter, percent-decoded
  pub fn query_param(&self, name: &str) -> Option<String> {
    let (_, query) = self.target.split_once('?')?;
    query
      .split('&')
      .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
      .find(|(key, _)| decode_component(key) == name)
      .map(|(_, value)| decode_component(value))
  }

  pub fn has_json_body(&self) -> bool {
    self
      .header("Content-Type")
      .is_some_and(|ct| ct.starts_with(JSON_CONTENT_TYPE))
  }

  /// Whether the peer asked to close the connection after this request
  pub fn wants_close(&self) -> bool {
    self
      .header("Connection")
      .is_some_and(|v| v.eq_ignore_ascii_case("close"))
  }

  pub fn encode(&self) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + self.body.len());
    buf.extend_from_slice(self.method.as_str().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(self.target.as_bytes());
    buf.extend_from_slice(b" HTTP/1.1\r\n");
    encode_head_and_body(&mut buf, &self.headers, &self.body);
    buf
  }
}

/// HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
  pub status: u16,
  pub reason: String,
  pub headers: Headers,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16) -> Self {
    Self {
      status,
      reason: reason_phrase(status).to_string(),
      headers: Vec::new(),
      body: Vec::new(),
    }
  }

  /// Response carrying an already serialized JSON body
  pub fn json(status: u16, body: Vec<u8>) -> Self {
    let mut resp = Self::new(status);
    resp
      .headers
      .push(("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string()));
    resp.body = body;
    resp
  }

  pub fn no_content() -> Self {
    Self::new(204)
  }

  /// Error response with a `{"error": "..."}` body
  pub fn error(status: u16, msg: impl Into<String>) -> Self {
    let body = serde_json::json!({ "error": msg.into() }).to_string();
    Self::json(status, body.into_bytes())
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    find_header(&self.headers, name)
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn encode(&self) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + self.body.len());
    buf.extend_from_slice(b"HTTP/1.1 ");
    buf.extend_from_slice(self.status.to_string().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(self.reason.as_bytes());
    buf.extend_from_slice(b"\r\n");
    encode_head_and_body(&mut buf, &self.headers, &self.body);
    buf
  }
}

pub fn reason_phrase(status: u16) -> &'static str {
  match status {
    200 => "OK",
    201 => "Created",
    204 => "No Content",
    400 => "Bad Request",
    404 => "Not Found",
    405 => "Method Not Allowed",
    415 => "Unsupported Media Type",
    500 => "Internal Server Error",
    _ => "Unknown",
  }
}

/// Parser for HTTP/1.1 messages
///
/// Each `parse_*` returns `Ok(None)` while the buffer holds only part of a
/// message, and the consumed byte count once a full message is available.
/// Heads are parsed with `httparse`; bodies may be framed by
/// `Content-Length`, chunked, or (responses only) run until the peer closes.
pub struct Parser;

/// How the body following a message head is delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
  Length(usize),
  Chunked,
  UntilClose,
}

impl Parser {
  pub fn parse_request(buffer: &[u8]) -> Result<Option<(Request, usize)>, ProtocolError> {
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut raw = httparse::Request::new(&mut raw_headers);
    let head_len = match raw.parse(buffer)? {
      httparse::Status::Complete(n) => n,
      httparse::Status::Partial => return Self::incomplete_head(buffer),
    };
    Self::check_head_len(head_len)?;

    let method = Method::from_token(raw.method.unwrap_or_default());
    let target = raw.path.unwrap_or_default().to_string();
    if !target.starts_with('/') {
      return Err(ProtocolError::MalformedTarget(target));
    }
    let headers = Self::own_headers(raw.headers);

    let framing = if Self::is_chunked(&headers) {
      Framing::Chunked
    } else {
      Framing::Length(Self::content_length(&headers)?.unwrap_or(0))
    };
    let Some((body, consumed)) = Self::take_body(buffer, head_len, framing, false)? else {
      return Ok(None);
    };

    Ok(Some((
      Request {
        method,
        target,
        headers,
        body,
      },
      consumed,
    )))
  }

  pub fn parse_response(buffer: &[u8]) -> Result<Option<(Response, usize)>, ProtocolError> {
    Self::response(buffer, false)
  }

  /// Parse the response once the peer has closed the connection
  ///
  /// A body with no length framing ends here; anything still missing is
  /// `ProtocolError::Incomplete`.
  pub fn parse_response_at_eof(buffer: &[u8]) -> Result<(Response, usize), ProtocolError> {
    Self::response(buffer, true)?.ok_or(ProtocolError::Incomplete)
  }

  fn response(buffer: &[u8], eof: bool) -> Result<Option<(Response, usize)>, ProtocolError> {
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut raw = httparse::Response::new(&mut raw_headers);
    let head_len = match raw.parse(buffer)? {
      httparse::Status::Complete(n) => n,
      httparse::Status::Partial => return Self::incomplete_head(buffer),
    };
    Self::check_head_len(head_len)?;

    let status = raw.code.unwrap_or_default();
    let reason = raw.reason.unwrap_or_default().to_string();
    let headers = Self::own_headers(raw.headers);

    let framing = if (100..200).contains(&status) || status == 204 || status == 304 {
      Framing::Length(0)
    } else if Self::is_chunked(&headers) {
      Framing::Chunked
    } else {
      match Self::content_length(&headers)? {
        Some(len) => Framing::Length(len),
        None => Framing::UntilClose,
      }
    };
    let Some((body, consumed)) = Self::take_body(buffer, head_len, framing, eof)? else {
      return Ok(None);
    };

    Ok(Some((
      Response {
        status,
        reason,
        headers,
        body,
      },
      consumed,
    )))
  }

  fn own_headers(raw: &[httparse::Header<'_>]) -> Headers {
    raw
      .iter()
      .map(|h| {
        (
          h.name.to_string(),
          String::from_utf8_lossy(h.value).trim().to_string(),
        )
      })
      .collect()
  }

  fn check_head_len(head_len: usize) -> Result<(), ProtocolError> {
    if head_len > MAX_HEAD_LEN {
      return Err(ProtocolError::HeadTooLarge);
    }
    Ok(())
  }

  fn incomplete_head<T>(buffer: &[u8]) -> Result<Option<T>, ProtocolError> {
    if buffer.len() > MAX_HEAD_LEN {
      Err(ProtocolError::HeadTooLarge)
    } else {
      Ok(None)
    }
  }

  fn is_chunked(headers: &Headers) -> bool {
    find_header(headers, "Transfer-Encoding").is_some_and(|te| {
      te.rsplit(',')
        .next()
        .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
    })
  }

  fn content_length(headers: &Headers) -> Result<Option<usize>, ProtocolError> {
    let Some(v) = find_header(headers, "Content-Length") else {
      return Ok(None);
    };
    if v.is_empty() || !v.bytes().all(|b| b.is_ascii_digit()) {
      return Err(ProtocolError::InvalidContentLength);
    }
    // Digits that overflow usize are too large by definition
    match atoi::atoi::<usize>(v.as_bytes()) {
      Some(len) if len <= MAX_BODY_LEN => Ok(Some(len)),
      _ => Err(ProtocolError::BodyTooLarge),
    }
  }

  fn take_body(
    buffer: &[u8],
    head_len: usize,
    framing: Framing,
    eof: bool,
  ) -> Result<Option<(Vec<u8>, usize)>, ProtocolError> {
    match framing {
      Framing::Length(len) => {
        let end = head_len
          .checked_add(len)
          .ok_or(ProtocolError::BodyTooLarge)?;
        if end > buffer.len() {
          return Ok(None);
        }
        Ok(Some((buffer[head_len..end].to_vec(), end)))
      }
      Framing::Chunked => Self::take_chunked(buffer, head_len),
      Framing::UntilClose => {
        if buffer.len() - head_len > MAX_BODY_LEN {
          return Err(ProtocolError::BodyTooLarge);
        }
        if !eof {
          return Ok(None);
        }
        Ok(Some((buffer[head_len..].to_vec(), buffer.len())))
      }
    }
  }

  fn take_chunked(buffer: &[u8], head_len: usize) -> Result<Option<(Vec<u8>, usize)>, ProtocolError> {
    // Chunk size lines and trailers are bounded by the head limit
    if buffer.len() - head_len > MAX_BODY_LEN + MAX_HEAD_LEN {
      return Err(ProtocolError::BodyTooLarge);
    }

    let mut pos = head_len;
    let mut body = Vec::new();
    loop {
      let Some(line) = Self::read_line(buffer, &mut pos) else {
        return Ok(None);
      };
      let size = std::str::from_utf8(line)
        .ok()
        .map(|l| l.split(';').next().unwrap_or_default().trim())
        .and_then(|hex| usize::from_str_radix(hex, 16).ok())
        .ok_or(ProtocolError::InvalidChunk)?;

      if size == 0 {
        // Skip trailers up to the closing blank line
        loop {
          match Self::read_line(buffer, &mut pos) {
            Some([]) => return Ok(Some((body, pos))),
            Some(_) => {}
            None => return Ok(None),
          }
        }
      }

      if size > MAX_BODY_LEN - body.len() {
        return Err(ProtocolError::BodyTooLarge);
      }
      let end = pos + size;
      if end + 2 > buffer.len() {
        return Ok(None);
      }
      if &buffer[end..end + 2] != b"\r\n" {
        return Err(ProtocolError::InvalidChunk);
      }
      body.extend_from_slice(&buffer[pos..end]);
      pos = end + 2;
    }
  }

  fn read_line<'a>(buffer: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    let start = *pos;

    // Find \r\n
    for i in start..buffer.len().saturating_sub(1) {
      if buffer[i] == b'\r' && buffer[i + 1] == b'\n' {
        *pos = i + 2;
        return Some(&buffer[start..i]);
      }
    }

    None
  }
}

/// Percent-encode a query component, leaving unreserved characters as-is
pub fn encode_component(value: &str) -> String {
  let mut out = String::with_capacity(value.len());
  for b in value.bytes() {
    match b {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
      _ => out.push_str(&format!("%{:02X}", b)),
    }
  }
  out
}

/// Decode a percent-encoded query component; `+` is a space
pub fn decode_component(value: &str) -> String {
  fn hex(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
  }

  let bytes = value.as_bytes();
  let mut out = Vec::with_capacity(bytes.len());
  let mut i = 0;
  while i < bytes.len() {
    match bytes[i] {
      b'+' => out.push(b' '),
      b'%' if i + 2 < bytes.len() => match (hex(bytes[i + 1]), hex(bytes[i + 2])) {
        (Some(hi), Some(lo)) => {
          out.push(hi << 4 | lo);
          i += 2;
        }
        _ => out.push(b'%'),
      },
      other => out.push(other),
    }
    i += 1;
  }
  String::from_utf8_lossy(&out).to_string()
}
