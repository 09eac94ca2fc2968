//! Request Identity
//!
//! Resolves who a request belongs to for lock and rate-limit keys.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, MatchedPath, Request};

use crate::keys::IdentityKind;

/// Resolves the caller identity of a request for a given [`IdentityKind`].
///
/// Implement this to plug in session or token based authentication; the
/// default [`HeaderIdentity`] trusts request headers.
pub trait IdentityExtractor: Send + Sync {
    /// `None` when the request carries no identity of that kind.
    fn extract(&self, kind: &IdentityKind, request: &Request) -> Option<String>;
}

/// Reads identities from headers.
///
/// | kind | source |
/// |---|---|
/// | `Admin` | `x-admin-id` |
/// | `Staff` | `x-staff-id` |
/// | `User` | `x-user-id` |
/// | `Ip` | first `x-forwarded-for` hop, `x-real-ip`, then the peer address |
/// | `Custom(name)` | the header called `name` |
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderIdentity;

impl IdentityExtractor for HeaderIdentity {
    fn extract(&self, kind: &IdentityKind, request: &Request) -> Option<String> {
        match kind {
            IdentityKind::Admin => header(request, "x-admin-id"),
            IdentityKind::Staff => header(request, "x-staff-id"),
            IdentityKind::User => header(request, "x-user-id"),
            IdentityKind::Ip => client_ip(request),
            IdentityKind::Custom(name) => header(request, name),
        }
    }
}

/// Route pattern the request matched (`/items/:id`), or the raw path when
/// the router has not matched one.
pub fn route_of(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

fn header(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn client_ip(request: &Request) -> Option<String> {
    header(request, "x-forwarded-for")
        .and_then(|hops| hops.split(',').next().map(|hop| hop.trim().to_string()))
        .filter(|hop| !hop.is_empty())
        .or_else(|| header(request, "x-real-ip"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
}
