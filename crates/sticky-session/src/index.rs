//! Precomputed token lookup
//!
//! Linear resolution hashes every live backend on each request. A
//! [`TokenIndex`] does that work once per live-set snapshot instead; it has to
//! be rebuilt whenever the live set changes, otherwise it keeps answering for
//! the old snapshot.

use crate::backend::BackendAddress;
use crate::codec::{is_token_format, AffinityCodec};
use std::collections::HashMap;

/// Token to backend map for one live-set snapshot
#[derive(Debug, Clone, Default)]
pub struct TokenIndex {
    backends: Vec<BackendAddress>,
    tokens: HashMap<String, usize>,
}

impl TokenIndex {
    /// Encode every backend in `live` once
    pub fn build(codec: &AffinityCodec, live: &[BackendAddress]) -> Self {
        let mut tokens = HashMap::with_capacity(live.len());
        for (position, backend) in live.iter().enumerate() {
            // Earlier entries win, same as the linear scan
            tokens
                .entry(codec.encode(backend).into_inner())
                .or_insert(position);
        }

        Self {
            backends: live.to_vec(),
            tokens,
        }
    }

    /// Backend whose token is `candidate`
    pub fn lookup(&self, candidate: &str) -> Option<&BackendAddress> {
        if !is_token_format(candidate) {
            return None;
        }
        self.tokens
            .get(candidate)
            .and_then(|position| self.backends.get(*position))
    }

    /// Number of backends indexed
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
