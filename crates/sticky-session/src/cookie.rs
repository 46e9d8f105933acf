//! Cookie transport for affinity tokens
//!
//! Reading goes through [`CookieSource`] so the resolver does not depend on a
//! particular request type. Writing produces an [`AffinityCookie`] that the
//! response layer turns into a `Set-Cookie` header.

use crate::codec::AffinityToken;
use crate::error::{Result, StickySessionError};
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Request};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;

/// Something a cookie can be read from by name
pub trait CookieSource {
    /// Value of the named cookie, `Ok(None)` when absent.
    ///
    /// An error means the cookie data could not be read at all, which is
    /// different from the cookie simply not being there.
    fn cookie(&self, name: &str) -> Result<Option<String>>;
}

impl CookieSource for HeaderMap {
    fn cookie(&self, name: &str) -> Result<Option<String>> {
        // Pairs are matched on raw bytes so an unreadable unrelated cookie
        // does not hide the one asked for
        for header in self.get_all(COOKIE) {
            let Some(value) = find_cookie(header.as_bytes(), name.as_bytes()) else {
                continue;
            };

            let value = std::str::from_utf8(value)
                .ok()
                .filter(|v| v.bytes().all(|b| b.is_ascii_graphic() || b == b' '))
                .ok_or_else(|| StickySessionError::CookieRead {
                    name: name.to_string(),
                    reason: "cookie value is not visible ASCII".to_string(),
                })?;
            return Ok(Some(unquote(value).to_string()));
        }

        Ok(None)
    }
}

impl<B> CookieSource for Request<B> {
    fn cookie(&self, name: &str) -> Result<Option<String>> {
        self.headers().cookie(name)
    }
}

impl CookieSource for HashMap<String, String> {
    fn cookie(&self, name: &str) -> Result<Option<String>> {
        Ok(self.get(name).cloned())
    }
}

/// Find the raw value of `name` in a single `Cookie` header line.
///
/// Pairs without `=` are skipped.
fn find_cookie<'a>(header: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    header
        .split(|b| *b == b';')
        .filter_map(|pair| {
            let pair = trim(pair);
            let eq = pair.iter().position(|b| *b == b'=')?;
            Some((trim(&pair[..eq]), trim(&pair[eq + 1..])))
        })
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |idx| idx + 1);
    &bytes[start..end]
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Whether `name` is a valid cookie name (an RFC 6265 token)
pub fn is_valid_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')'
                        | b'<'
                        | b'>'
                        | b'@'
                        | b','
                        | b';'
                        | b':'
                        | b'\\'
                        | b'"'
                        | b'/'
                        | b'['
                        | b']'
                        | b'?'
                        | b'='
                        | b'{'
                        | b'}'
                )
        })
}

/// SameSite cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Cookie pinning a client to a backend.
///
/// The affinity layer only fills in name, value and `Path=/`. Expiry and
/// transport attributes are left to the response layer via the builder
/// methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinityCookie {
    name: String,
    value: String,
    path: String,
    max_age: Option<Duration>,
    http_only: bool,
    secure: bool,
    same_site: Option<SameSite>,
}

impl AffinityCookie {
    /// Create a cookie carrying `token` under `name`
    pub fn new(name: impl Into<String>, token: AffinityToken) -> Self {
        Self {
            name: name.into(),
            value: token.into_inner(),
            path: "/".to_string(),
            max_age: None,
            http_only: false,
            secure: false,
            same_site: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Render the `Set-Cookie` header line, e.g. `sid=<token>; Path=/`
    pub fn to_header_string(&self) -> String {
        let mut header = format!("{}={}; Path={}", self.name, self.value, self.path);

        if let Some(max_age) = self.max_age {
            let _ = write!(header, "; Max-Age={}", max_age.as_secs());
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if let Some(same_site) = self.same_site {
            let _ = write!(header, "; SameSite={}", same_site.as_str());
        }

        header
    }

    /// Render the `Set-Cookie` header value
    pub fn to_header_value(&self) -> Result<HeaderValue> {
        HeaderValue::from_str(&self.to_header_string())
            .map_err(|e| StickySessionError::InvalidHeader(format!("Set-Cookie: {}", e)))
    }
}

/// Append `cookie` to a response's headers as `Set-Cookie`
pub fn set_cookie(headers: &mut HeaderMap, cookie: &AffinityCookie) -> Result<()> {
    headers.append(SET_COOKIE, cookie.to_header_value()?);
    Ok(())
}
