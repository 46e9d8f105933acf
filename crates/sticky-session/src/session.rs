//! Cookie based session affinity

use crate::backend::BackendAddress;
use crate::codec::AffinityCodec;
use crate::config::{AffinityConfig, SessionAffinityConfig};
use crate::cookie::{AffinityCookie, CookieSource};
use crate::error::Result;
use crate::index::TokenIndex;
use crate::liveness::{self, AddressMatcher, SameUrl};
use crate::metrics::{self, Outcome};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of looking up a request's affinity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Affinity {
    /// The request is pinned to this live backend
    Sticky(BackendAddress),
    /// No usable affinity: no cookie, a stale cookie, or a backend that is no
    /// longer live
    None,
}

impl Affinity {
    pub fn backend(&self) -> Option<&BackendAddress> {
        match self {
            Affinity::Sticky(backend) => Some(backend),
            Affinity::None => None,
        }
    }

    pub fn into_backend(self) -> Option<BackendAddress> {
        match self {
            Affinity::Sticky(backend) => Some(backend),
            Affinity::None => None,
        }
    }

    pub fn has_affinity(&self) -> bool {
        matches!(self, Affinity::Sticky(_))
    }
}

/// Backend chosen for a request, plus the cookie to attach to the response
/// when the client has to be (re)pinned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routed {
    pub backend: Option<BackendAddress>,
    pub set_cookie: Option<AffinityCookie>,
}

/// Session affinity resolver.
///
/// Holds only immutable configuration, so one instance can be shared by
/// every request handler.
#[derive(Clone)]
pub struct StickySession {
    config: AffinityConfig,
    codec: AffinityCodec,
    matcher: Arc<dyn AddressMatcher>,
}

impl StickySession {
    /// Create a resolver using [`SameUrl`] for liveness checks
    pub fn new(config: AffinityConfig) -> Result<Self> {
        Self::with_matcher(config, Arc::new(SameUrl))
    }

    /// Create a resolver with a custom address equality rule
    pub fn with_matcher(config: AffinityConfig, matcher: Arc<dyn AddressMatcher>) -> Result<Self> {
        config.validate()?;
        let codec = AffinityCodec::new(config.secret.as_bytes());
        Ok(Self {
            config,
            codec,
            matcher,
        })
    }

    /// Build from the configuration file section, `None` when disabled
    pub fn from_config(section: SessionAffinityConfig) -> Result<Option<Self>> {
        section.into_affinity()?.map(Self::new).transpose()
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    pub fn codec(&self) -> &AffinityCodec {
        &self.codec
    }

    /// Find the live backend this request is pinned to.
    ///
    /// Only a failure to read the cookie is an error. A missing cookie, a
    /// cookie matching no backend in `live` and a backend that fails the
    /// liveness check all resolve to [`Affinity::None`].
    pub fn resolve<C>(&self, request: &C, live: &[BackendAddress]) -> Result<Affinity>
    where
        C: CookieSource + ?Sized,
    {
        let Some(value) = self.read_cookie(request)? else {
            return Ok(Affinity::None);
        };

        let matched = live
            .iter()
            .find(|backend| self.codec.verify(backend, &value));
        Ok(self.confirm(matched, live))
    }

    /// Like [`resolve`](Self::resolve), but looks the token up in `index`
    /// instead of hashing every live backend.
    ///
    /// `index` must have been built from the current live set; a match from
    /// an outdated index only survives if the backend is still in `live`.
    pub fn resolve_indexed<C>(
        &self,
        request: &C,
        index: &TokenIndex,
        live: &[BackendAddress],
    ) -> Result<Affinity>
    where
        C: CookieSource + ?Sized,
    {
        let Some(value) = self.read_cookie(request)? else {
            return Ok(Affinity::None);
        };

        let matched = index
            .lookup(&value)
            .filter(|backend| self.codec.verify(backend, &value));
        Ok(self.confirm(matched, live))
    }

    /// Build an index of the live set for [`resolve_indexed`](Self::resolve_indexed)
    pub fn index(&self, live: &[BackendAddress]) -> TokenIndex {
        TokenIndex::build(&self.codec, live)
    }

    /// Cookie pinning future requests to `backend`
    pub fn stick_to(&self, backend: &BackendAddress) -> AffinityCookie {
        debug!(
            cookie = %self.config.cookie_name,
            backend = %backend,
            "Issuing affinity cookie"
        );
        metrics::record_cookie_issued();
        AffinityCookie::new(self.config.cookie_name.clone(), self.codec.encode(backend))
    }

    /// Pick the backend for a request.
    ///
    /// A valid sticky backend wins. Otherwise `select` chooses from `live`
    /// and the returned [`Routed`] carries the cookie pinning the client to
    /// that choice. Cookie read failures are logged and treated as no
    /// affinity.
    pub fn route<C, F>(&self, request: &C, live: &[BackendAddress], select: F) -> Routed
    where
        C: CookieSource + ?Sized,
        F: FnOnce(&[BackendAddress]) -> Option<BackendAddress>,
    {
        let affinity = self.resolve(request, live).unwrap_or_else(|err| {
            warn!(
                cookie = %self.config.cookie_name,
                error = %err,
                "Ignoring unreadable affinity cookie"
            );
            Affinity::None
        });

        if let Affinity::Sticky(backend) = affinity {
            return Routed {
                backend: Some(backend),
                set_cookie: None,
            };
        }

        match select(live) {
            Some(backend) => Routed {
                set_cookie: Some(self.stick_to(&backend)),
                backend: Some(backend),
            },
            None => Routed::default(),
        }
    }

    fn read_cookie<C>(&self, request: &C) -> Result<Option<String>>
    where
        C: CookieSource + ?Sized,
    {
        match request.cookie(&self.config.cookie_name) {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => {
                debug!(cookie = %self.config.cookie_name, "No affinity cookie");
                metrics::record_resolution(Outcome::Absent);
                Ok(None)
            }
            Err(err) => {
                metrics::record_resolution_error(err.category());
                Err(err)
            }
        }
    }

    fn confirm(&self, matched: Option<&BackendAddress>, live: &[BackendAddress]) -> Affinity {
        let Some(backend) = matched else {
            debug!(cookie = %self.config.cookie_name, "Affinity cookie matches no live backend");
            metrics::record_resolution(Outcome::Stale);
            return Affinity::None;
        };

        if liveness::contains(self.matcher.as_ref(), backend, live) {
            debug!(backend = %backend, "Resolved sticky backend");
            metrics::record_resolution(Outcome::Sticky);
            Affinity::Sticky(backend.clone())
        } else {
            debug!(backend = %backend, "Sticky backend is no longer live");
            metrics::record_resolution(Outcome::NotLive);
            Affinity::None
        }
    }
}

impl fmt::Debug for StickySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StickySession")
            .field("config", &self.config)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
