//! Liveness checks against the current backend set

use crate::backend::BackendAddress;

/// Address equality rule used to decide whether a backend is still live.
///
/// Different deployments normalize addresses differently, so the rule is
/// injected rather than fixed to string equality.
pub trait AddressMatcher: Send + Sync {
    /// Whether two addresses name the same backend
    fn same(&self, a: &BackendAddress, b: &BackendAddress) -> bool;
}

impl<F> AddressMatcher for F
where
    F: Fn(&BackendAddress, &BackendAddress) -> bool + Send + Sync,
{
    fn same(&self, a: &BackendAddress, b: &BackendAddress) -> bool {
        self(a, b)
    }
}

/// Scheme, host, port and path compared as written
#[derive(Debug, Clone, Copy, Default)]
pub struct SameUrl;

impl AddressMatcher for SameUrl {
    fn same(&self, a: &BackendAddress, b: &BackendAddress) -> bool {
        a.scheme() == b.scheme()
            && a.host() == b.host()
            && a.port() == b.port()
            && a.path() == b.path()
    }
}

/// Ignores host case, default ports and a trailing slash on the path
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedUrl;

impl AddressMatcher for NormalizedUrl {
    fn same(&self, a: &BackendAddress, b: &BackendAddress) -> bool {
        a.scheme() == b.scheme()
            && a.host().eq_ignore_ascii_case(b.host())
            && a.port_or_default() == b.port_or_default()
            && trim_path(a.path()) == trim_path(b.path())
    }
}

fn trim_path(path: &str) -> &str {
    path.trim_end_matches('/')
}

/// Whether `candidate` is present in `live` under `matcher`.
pub fn contains(
    matcher: &dyn AddressMatcher,
    candidate: &BackendAddress,
    live: &[BackendAddress],
) -> bool {
    if live.is_empty() {
        return false;
    }

    live.iter().any(|backend| matcher.same(candidate, backend))
}
