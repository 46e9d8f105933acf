//! Error types for session affinity

use thiserror::Error;

/// Result type for session affinity operations
pub type Result<T> = std::result::Result<T, StickySessionError>;

/// Errors that can occur while resolving or issuing affinity cookies
#[derive(Error, Debug)]
pub enum StickySessionError {
    /// The request's cookie header could not be read
    #[error("Failed to read cookie {name}: {reason}")]
    CookieRead { name: String, reason: String },

    /// A backend address could not be parsed
    #[error("Invalid backend address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A header value could not be produced
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Configuration parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StickySessionError {
    /// Check if the error came from reading the request cookie.
    ///
    /// Callers usually degrade to "no affinity" on these instead of failing
    /// the request.
    pub fn is_cookie_read(&self) -> bool {
        matches!(self, StickySessionError::CookieRead { .. })
    }

    /// Get error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            StickySessionError::CookieRead { .. } => "cookie_read",
            StickySessionError::InvalidAddress { .. } => "invalid_address",
            StickySessionError::Configuration(_) => "configuration",
            StickySessionError::InvalidHeader(_) => "invalid_header",
            StickySessionError::Parse(_) => "parse",
            StickySessionError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_read_detection() {
        let err = StickySessionError::CookieRead {
            name: "sid".to_string(),
            reason: "opaque bytes".to_string(),
        };
        assert!(err.is_cookie_read());
        assert!(!StickySessionError::Configuration("x".to_string()).is_cookie_read());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StickySessionError::Parse("bad".to_string()).category(),
            "parse"
        );
        let io = StickySessionError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert_eq!(io.category(), "io");
    }

    #[test]
    fn test_error_display() {
        let err = StickySessionError::InvalidAddress {
            address: "nope".to_string(),
            reason: "missing scheme".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid backend address \"nope\": missing scheme"
        );
    }
}
