/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! # Sticky Session
//!
//! Cookie based session affinity for the HTTP load balancer:
//!
//! - Backend identity carried in a cookie as a keyed HMAC-SHA256 token
//! - Verification by recomputing tokens for known live backends only
//! - Liveness check against the current backend set with a pluggable
//!   address equality rule
//! - No server-side session storage
//!
//! ## Example
//!
//! ```rust
//! use sticky_session::{parse_backends, AffinityConfig, StickySession};
//! use http::HeaderMap;
//!
//! let session = StickySession::new(AffinityConfig::new("sid", "s3cr3t")?)?;
//! let live = parse_backends(["http://10.0.0.1:80/", "http://10.0.0.2:80/"])?;
//!
//! // First visit: no cookie, so the caller picks a backend and pins it
//! let routed = session.route(&HeaderMap::new(), &live, |backends| backends.first().cloned());
//! let cookie = routed.set_cookie.expect("new clients get a cookie");
//!
//! // Next visit: the cookie resolves back to the same backend
//! let mut request = HeaderMap::new();
//! request.insert(http::header::COOKIE, format!("sid={}", cookie.value()).parse()?);
//! let affinity = session.resolve(&request, &live)?;
//! assert_eq!(affinity.backend(), Some(&live[0]));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
pub mod codec;
pub mod config;
pub mod cookie;
pub mod error;
pub mod index;
pub mod liveness;
pub mod metrics;
pub mod session;

pub use backend::{parse_backends, BackendAddress};
pub use codec::{AffinityCodec, AffinityToken, TOKEN_HEX_LEN};
pub use config::{AffinityConfig, SessionAffinityConfig};
pub use cookie::{set_cookie, AffinityCookie, CookieSource, SameSite};
pub use error::{Result, StickySessionError};
pub use index::TokenIndex;
pub use liveness::{AddressMatcher, NormalizedUrl, SameUrl};
pub use session::{Affinity, Routed, StickySession};
