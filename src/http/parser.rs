//! HTTP message parsing
//!
//! This module provides the strict, one-shot parsers for requests and
//! responses. Both operate on a byte buffer containing everything received
//! so far and either produce a complete message head or fail; an incomplete
//! head is a failure, not a "read more" signal. Bytes beyond the CRLFCRLF
//! terminator are the initial body fragment and are returned as an offset
//! into the caller's buffer, so the caller decides where the body lives.

use super::headers::HeaderMap;
use super::message::{Method, Request, Response, StatusCode, Version};
use super::url::Url;
use super::{Error, Result};

/// Find the next CRLF in a buffer
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn as_str(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::Parse("non-UTF-8 bytes in header".to_string()))
}

/// Parse an HTTP request head from `buf`
///
/// `max_url_length` caps the request-target; if the cap is hit before the
/// second SP of the request line is found, the parse fails (the session
/// maps every failure to a 400 response).
///
/// Returns the request (with an empty body) and the offset of the first
/// body byte in `buf`.
pub fn parse_request(buf: &[u8], max_url_length: usize) -> Result<(Request, usize)> {
    // e.g.: GET /foobar/barbar HTTP/1.1\r\nHost: example.org\r\n\r\n
    let request_line_end =
        find_crlf(buf).ok_or_else(|| Error::Parse("request line not terminated".to_string()))?;
    let request_line = &buf[..request_line_end];

    // RFC 2616, 5.1 separates the request line with single spaces. More
    // lenient whitespace handling is deliberately not supported.
    let method_end = request_line
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::Parse("no space after method".to_string()))?;
    let method = Method::parse(as_str(&request_line[..method_end])?)?;

    let target_start = method_end + 1;
    if target_start >= request_line.len() {
        return Err(Error::Parse("request line ends after method".to_string()));
    }
    // This should be "414 URI Too Long", but the session maps all parse
    // failures to 400.
    let search_end = request_line.len().min(target_start + max_url_length);
    let target_len = request_line[target_start..search_end]
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::Parse("request-target too long or unterminated".to_string()))?;
    let target = as_str(&request_line[target_start..target_start + target_len])?;
    let url =
        Url::parse(target).ok_or_else(|| Error::InvalidUrl(target.to_string()))?;

    let version_start = target_start + target_len + 1;
    let version = Version::parse(as_str(&request_line[version_start..])?)?;

    let mut headers = HeaderMap::new();
    let mut cursor = request_line_end + 2;
    let body_start = loop {
        let line_len = find_crlf(&buf[cursor..])
            .ok_or_else(|| Error::Parse("headers not terminated".to_string()))?;
        if line_len == 0 {
            break cursor + 2;
        }
        let line = &buf[cursor..cursor + line_len];
        let (name, value) = parse_header_line(line)?;
        headers.add(name, value);
        cursor += line_len + 2;
    };

    let request = Request::from_parts(
        method,
        url,
        version,
        headers,
        as_str(request_line)?.to_string(),
    );
    Ok((request, body_start))
}

/// Split a header line at the first colon and trim linear whitespace from
/// both ends of the value. Internal whitespace is preserved.
fn parse_header_line(line: &[u8]) -> Result<(&str, &str)> {
    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| Error::InvalidHeader(String::from_utf8_lossy(line).into_owned()))?;
    let name = &line[..colon];
    if name.is_empty() {
        return Err(Error::InvalidHeader("empty header name".to_string()));
    }

    let value = as_str(&line[colon + 1..])?.trim_matches([' ', '\t']);
    Ok((as_str(name)?, value))
}

/// Parse an HTTP response head from `buf`
///
/// The status line is `HTTP/1.x CODE` with an optional reason phrase,
/// which is validated as a three-digit integer and discarded.
///
/// Returns the response (with an empty body) and the offset of the first
/// body byte in `buf`.
pub fn parse_response(buf: &[u8]) -> Result<(Response, usize)> {
    let status_line_end =
        find_crlf(buf).ok_or_else(|| Error::Parse("status line not terminated".to_string()))?;
    let status_line = as_str(&buf[..status_line_end])?;

    let version_end = status_line
        .find(' ')
        .ok_or_else(|| Error::Parse("no space after version".to_string()))?;
    Version::parse(&status_line[..version_end])?;

    let code_str = &status_line[version_end + 1..];
    let code_str = match code_str.find(' ') {
        Some(reason_start) => &code_str[..reason_start],
        None => code_str,
    };
    if code_str.len() != 3 {
        return Err(Error::InvalidStatus(code_str.to_string()));
    }
    let code = code_str
        .parse::<u16>()
        .map_err(|_| Error::InvalidStatus(code_str.to_string()))?;
    let status = StatusCode::new(code)?;

    let mut headers = HeaderMap::new();
    let mut cursor = status_line_end + 2;
    let body_start = loop {
        let line_len = find_crlf(&buf[cursor..])
            .ok_or_else(|| Error::Parse("headers not terminated".to_string()))?;
        if line_len == 0 {
            break cursor + 2;
        }
        let line = &buf[cursor..cursor + line_len];
        let (name, value) = parse_header_line(line)?;
        headers.add(name, value);
        cursor += line_len + 2;
    };

    Ok((Response::from_parts(status, headers), body_start))
}
