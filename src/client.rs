//! Client address resolution.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Header set by reverse proxies with the originating client chain.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Address used when neither a header nor a peer address is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the address that identifies a client.
///
/// The first comma-separated value of `X-Forwarded-For` wins when
/// `trust_forwarded_for` is set and the value is non-blank. Otherwise the
/// peer IP is used, without its port. The header is not validated.
pub fn client_address(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(addr) = forwarded {
            return addr.to_string();
        }
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN_CLIENT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.7:51234".parse().unwrap())
    }

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_first_forwarded_value_wins() {
        let headers = forwarded(" 1.2.3.4 , 10.1.1.1, 10.2.2.2");
        assert_eq!(client_address(&headers, peer(), true), "1.2.3.4");
    }

    #[test]
    fn test_peer_used_without_header() {
        assert_eq!(client_address(&HeaderMap::new(), peer(), true), "10.0.0.7");
    }

    #[test]
    fn test_blank_header_falls_back_to_peer() {
        let headers = forwarded(" , 1.2.3.4");
        assert_eq!(client_address(&headers, peer(), true), "10.0.0.7");
    }

    #[test]
    fn test_header_ignored_when_untrusted() {
        let headers = forwarded("1.2.3.4");
        assert_eq!(client_address(&headers, peer(), false), "10.0.0.7");
    }

    #[test]
    fn test_unknown_without_any_source() {
        assert_eq!(client_address(&HeaderMap::new(), None, true), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_header_content_not_validated() {
        let headers = forwarded("not-an-ip");
        assert_eq!(client_address(&headers, peer(), true), "not-an-ip");
    }
}
