//! Request-target parsing
//!
//! This module dissects the HTTP/1.1 request-target into path, params,
//! query and fragment, and normalizes the path by removing dot segments
//! (RFC 3986, 5.2.4). All parts are materialized as owned strings at parse
//! time. No percent-decoding is performed.

/// A parsed request-target
///
/// After a successful parse, `path` contains no `.` or `..` segments, is
/// non-empty and begins with `/`. The one exception is the server-wide
/// request-target `*` (RFC 2616, 5.1.2), for which all parts are empty and
/// only `full_raw` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Url {
    full_raw: String,
    path: String,
    params: Option<String>,
    query: Option<String>,
    fragment: Option<String>,
}

impl Url {
    /// Parse a request-target
    ///
    /// Accepts abs_path and absoluteURI forms (RFC 1808, 2.4). The scheme
    /// and authority of an absoluteURI are accepted but discarded. Returns
    /// `None` on malformed input; the server maps that to 400.
    pub fn parse(target: &str) -> Option<Url> {
        let mut url = Url {
            full_raw: target.to_string(),
            ..Url::default()
        };

        // RFC 2616, 5.1.2
        if target == "*" {
            return Some(url);
        }

        // RFC 1808, 2.4.1: the fragment is not technically part of the URL
        let mut rest = target;
        if let Some(fragment_start) = rest.find('#') {
            url.fragment = Some(rest[fragment_start + 1..].to_string());
            rest = &rest[..fragment_start];
        }

        if rest.is_empty() {
            return None;
        }

        // RFC 1808, 2.4.2: if all characters up to the first colon are valid
        // scheme characters, [0, colon) is a scheme. The scheme is not
        // retained.
        if let Some(colon) = rest.find(':') {
            if rest[..colon].bytes().all(is_scheme_char) {
                rest = &rest[colon + 1..];
            }
        }

        // RFC 1808, 2.4.3: the net_loc of an absoluteURI is ignored rather
        // than validated against the server's own hosts.
        if let Some(stripped) = rest.strip_prefix("//") {
            match stripped.find('/') {
                Some(slash) => rest = &stripped[slash..],
                None => return None,
            }
        }

        // RFC 1808, 2.4.4
        if let Some(query_start) = rest.find('?') {
            url.query = Some(rest[query_start + 1..].to_string());
            rest = &rest[..query_start];
        }

        // RFC 1808, 2.4.5
        if let Some(params_start) = rest.find(';') {
            url.params = Some(rest[params_start + 1..].to_string());
            rest = &rest[..params_start];
        }

        // What remains must be abs_path (RFC 1808, 2.2).
        if !rest.starts_with('/') {
            return None;
        }
        url.path = remove_dot_segments(rest);

        Some(url)
    }

    /// The original, unparsed request-target
    pub fn full_raw(&self) -> &str {
        &self.full_raw
    }

    /// The normalized path; empty only for the `*` request-target
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The `;params` section, if present
    pub fn params(&self) -> Option<&str> {
        self.params.as_deref()
    }

    /// The `?query` section, if present
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The `#fragment` section, if present
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }
}

fn is_scheme_char(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'+' || ch == b'.' || ch == b'-'
}

/// RFC 3986, 5.2.4: Remove Dot Segments
///
/// The input always starts with a slash, so every loop iteration consumes
/// one full `/segment` and the remaining input still starts with a slash.
fn remove_dot_segments(input: &str) -> String {
    debug_assert!(input.starts_with('/'));
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while !rest.is_empty() {
        if rest == "/" {
            output.push('/');
            break;
        }
        let segment_end = rest[1..].find('/').map(|i| i + 1);
        let segment = match segment_end {
            Some(end) => &rest[..end],
            None => rest,
        };

        match segment {
            "/." => {}
            "/.." => {
                // Drop the trailing segment of the output, including its
                // leading slash. If the output is empty there is nothing
                // to drop.
                if let Some(last_slash) = output.rfind('/') {
                    output.truncate(last_slash);
                }
            }
            _ => output.push_str(segment),
        }

        match segment_end {
            Some(end) => rest = &rest[end..],
            None => break,
        }
    }
    if output.is_empty() {
        output.push('/');
    }
    output
}
