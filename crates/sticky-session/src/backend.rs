//! Backend addresses

use crate::error::{Result, StickySessionError};
use http::Uri;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network identity of a backend server.
///
/// The canonical string is the address exactly as the load balancer spells
/// it; that string is what affinity tokens are computed over. The parsed
/// components are kept alongside it for the address matchers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackendAddress {
    canonical: String,
    scheme: String,
    authority: String,
    host: String,
    port: Option<u16>,
    path: String,
}

impl BackendAddress {
    /// Parse a backend URL such as `http://10.0.0.1:80/`.
    ///
    /// A scheme and a host are required.
    pub fn parse(address: &str) -> Result<Self> {
        let canonical = address.trim();
        let invalid = |reason: String| StickySessionError::InvalidAddress {
            address: canonical.to_string(),
            reason,
        };

        let uri: Uri = canonical.parse().map_err(|e| invalid(format!("{}", e)))?;
        let scheme = uri
            .scheme_str()
            .ok_or_else(|| invalid("missing scheme".to_string()))?;
        let authority = uri
            .authority()
            .ok_or_else(|| invalid("missing host".to_string()))?;
        if authority.host().is_empty() {
            return Err(invalid("missing host".to_string()));
        }

        // The path is taken from the raw text; `Uri::path` reports "/" for an
        // empty path, which would hide the difference between `http://a` and
        // `http://a/`.
        let rest = canonical
            .find("://")
            .and_then(|idx| canonical.get(idx + 3 + authority.as_str().len()..))
            .unwrap_or_default();
        let path = rest.split(['?', '#']).next().unwrap_or_default();

        Ok(Self {
            canonical: canonical.to_string(),
            scheme: scheme.to_ascii_lowercase(),
            authority: authority.as_str().to_string(),
            host: authority.host().to_string(),
            port: authority.port_u16(),
            path: path.to_string(),
        })
    }

    /// Canonical string form
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Lowercased scheme
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Authority as written (`host[:port]`)
    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port, if the address carries one
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Port with the scheme default applied
    pub fn port_or_default(&self) -> Option<u16> {
        self.port.or(match self.scheme.as_str() {
            "http" | "ws" => Some(80),
            "https" | "wss" => Some(443),
            _ => None,
        })
    }

    /// Path as written, empty when the address has none
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl FromStr for BackendAddress {
    type Err = StickySessionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BackendAddress {
    type Error = StickySessionError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<BackendAddress> for String {
    fn from(address: BackendAddress) -> Self {
        address.canonical
    }
}

impl AsRef<str> for BackendAddress {
    fn as_ref(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Parse a list of backend URLs, failing on the first invalid one.
pub fn parse_backends<I, S>(addresses: I) -> Result<Vec<BackendAddress>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    addresses
        .into_iter()
        .map(|address| BackendAddress::parse(address.as_ref()))
        .collect()
}
