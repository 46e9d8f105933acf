//! Affinity token codec
//!
//! A token is the lowercase hex HMAC-SHA256 of a backend's canonical address,
//! keyed with the configured secret. Tokens are only ever checked by
//! recomputing them for backends the balancer already knows; there is no way
//! to turn a token back into an address.

use crate::backend::BackendAddress;
use ring::hmac;
use std::fmt;

/// Length of an encoded token in hex characters
pub const TOKEN_HEX_LEN: usize = 64;

/// Opaque token identifying a backend inside an affinity cookie
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AffinityToken(String);

impl AffinityToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for AffinityToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AffinityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keyed token encoder and verifier
#[derive(Clone)]
pub struct AffinityCodec {
    key: hmac::Key,
}

impl AffinityCodec {
    /// Create a codec keyed with the shared secret
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_ref()),
        }
    }

    /// Compute the token for a backend
    pub fn encode(&self, address: &BackendAddress) -> AffinityToken {
        self.encode_str(address.as_str())
    }

    /// Compute the token for a raw canonical address string
    pub fn encode_str(&self, canonical: &str) -> AffinityToken {
        let tag = hmac::sign(&self.key, canonical.as_bytes());
        AffinityToken(hex::encode(tag.as_ref()))
    }

    /// Check a client-supplied token against a backend.
    pub fn verify(&self, address: &BackendAddress, candidate: &str) -> bool {
        self.verify_str(address.as_str(), candidate)
    }

    /// Check a client-supplied token against a raw canonical address string.
    ///
    /// Length and alphabet are checked first; neither depends on the secret.
    /// The tag comparison itself is constant time.
    pub fn verify_str(&self, canonical: &str, candidate: &str) -> bool {
        if !is_token_format(candidate) {
            return false;
        }
        match hex::decode(candidate) {
            Ok(tag) => hmac::verify(&self.key, canonical.as_bytes(), &tag).is_ok(),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for AffinityCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffinityCodec")
            .field("algorithm", &"HMAC-SHA256")
            .finish_non_exhaustive()
    }
}

/// Whether a value has the shape of a token (64 lowercase hex characters)
pub fn is_token_format(value: &str) -> bool {
    value.len() == TOKEN_HEX_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(s: &str) -> BackendAddress {
        BackendAddress::parse(s).unwrap()
    }

    #[test]
    fn test_rfc4231_vector() {
        // RFC 4231 test case 2
        let codec = AffinityCodec::new("Jefe");
        let token = codec.encode_str("what do ya want for nothing?");
        assert_eq!(
            token.as_str(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_encode_shape() {
        let codec = AffinityCodec::new("s3cr3t");
        let token = codec.encode(&address("http://10.0.0.1:80/"));
        assert_eq!(token.as_str().len(), TOKEN_HEX_LEN);
        assert!(is_token_format(token.as_str()));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let backend = address("http://10.0.0.1:80/");
        let first = AffinityCodec::new("s3cr3t").encode(&backend);
        let second = AffinityCodec::new("s3cr3t").encode(&backend);
        assert_eq!(first, second);
    }

    #[test]
    fn test_encode_depends_on_key_and_address() {
        let a = address("http://10.0.0.1:80/");
        let b = address("http://10.0.0.2:80/");
        let codec = AffinityCodec::new("s3cr3t");
        assert_ne!(codec.encode(&a), codec.encode(&b));
        assert_ne!(codec.encode(&a), AffinityCodec::new("other").encode(&a));
    }

    #[test]
    fn test_verify() {
        let codec = AffinityCodec::new("s3cr3t");
        let a = address("http://10.0.0.1:80/");
        let b = address("http://10.0.0.2:80/");
        let token = codec.encode(&a);

        assert!(codec.verify(&a, token.as_str()));
        assert!(!codec.verify(&b, token.as_str()));
        assert!(!AffinityCodec::new("other").verify(&a, token.as_str()));
    }

    #[test]
    fn test_verify_rejects_malformed() {
        let codec = AffinityCodec::new("s3cr3t");
        let a = address("http://10.0.0.1:80/");
        let token = codec.encode(&a).into_inner();

        assert!(!codec.verify(&a, ""));
        assert!(!codec.verify(&a, "not-a-real-token"));
        assert!(!codec.verify(&a, &token[..TOKEN_HEX_LEN - 2]));
        assert!(!codec.verify(&a, &format!("{}00", token)));
        assert!(!codec.verify(&a, &token.to_ascii_uppercase()));
        assert!(!codec.verify(&a, &"g".repeat(TOKEN_HEX_LEN)));
    }

    #[test]
    fn test_debug_hides_key() {
        let codec = AffinityCodec::new("s3cr3t");
        let debug = format!("{:?}", codec);
        assert!(!debug.contains("s3cr3t"));
        assert!(debug.contains("HMAC-SHA256"));
    }
}
