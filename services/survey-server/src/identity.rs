use std::net::SocketAddr;

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use survey::UserId;

use crate::config::IdentitySource;
use crate::error::ApiError;
use crate::state::SharedState;

/// Caller identity, derived from the client address.
#[derive(Clone, Debug)]
pub struct ClientIdentity {
    pub address: String,
    pub user: UserId,
}

impl ClientIdentity {
    pub fn from_address(address: impl Into<String>) -> Self {
        let address = address.into();
        let user = survey::identity(&address);
        Self { address, user }
    }
}

/// Address used as identity input. Empty when nothing is known about the peer.
pub fn client_address(source: IdentitySource, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if source == IdentitySource::ForwardedFor {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_canonical().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl FromRequestParts<SharedState> for ClientIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let address = client_address(state.config.identity_source, &parts.headers, peer);
        Ok(ClientIdentity::from_address(address))
    }
}
