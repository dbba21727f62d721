use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, HeaderName};
use std::net::SocketAddr;

use crate::http::AppError;
use crate::AppState;

const FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Network address of the caller: the socket peer, or the first
/// `X-Forwarded-For` hop when the deployment trusts its proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress(pub String);

#[axum::async_trait]
impl FromRequestParts<AppState> for ClientAddress {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        client_address(&parts.headers, &parts.extensions, state.trust_forwarded_for)
            .map(ClientAddress)
            .ok_or_else(|| AppError::internal("client address unavailable"))
    }
}

pub(crate) fn client_address(
    headers: &HeaderMap,
    extensions: &Extensions,
    trust_forwarded_for: bool,
) -> Option<String> {
    if trust_forwarded_for {
        if let Some(address) = forwarded_for(headers) {
            return Some(address);
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(FORWARDED_FOR)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    if first.is_empty() {
        return None;
    }
    Some(first.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn resolve(parts: &Parts, trust: bool) -> Option<String> {
        client_address(&parts.headers, &parts.extensions, trust)
    }

    fn parts(forwarded: Option<&str>, peer: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = forwarded {
            builder = builder.header("x-forwarded-for", value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            parts.extensions.insert(ConnectInfo(addr));
        }
        parts
    }

    #[test]
    fn forwarded_header_ignored_unless_trusted() {
        let parts = parts(Some("198.51.100.9, 10.0.0.1"), Some("10.0.0.1:4000"));
        assert_eq!(resolve(&parts, false).as_deref(), Some("10.0.0.1"));
        assert_eq!(resolve(&parts, true).as_deref(), Some("198.51.100.9"));
    }

    #[test]
    fn falls_back_to_peer_when_header_missing() {
        let parts = parts(None, Some("127.0.0.1:5000"));
        assert_eq!(resolve(&parts, true).as_deref(), Some("127.0.0.1"));
        assert_eq!(resolve(&self::parts(None, None), true), None);
    }
}
