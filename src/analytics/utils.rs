/// Visitor data helpers for public tracking
///
/// Client IP extraction, IP anonymization and referrer/user agent cleanup.
/// All functions are pure and never fail.

use axum::http::HeaderMap;
use reqwest::Url;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Longest user agent stored with an event
pub const MAX_USER_AGENT_LEN: usize = 1000;

/// Longest referrer stored with an event
pub const MAX_REFERRER_LEN: usize = 500;

/// Query keys whose values must never be stored
const SENSITIVE_QUERY_KEYS: [&str; 5] = ["token", "api_key", "password", "secret", "auth"];

/// Resolve the visitor's address.
///
/// Order: first hop of `X-Forwarded-For`, then `X-Real-IP`, then the socket peer.
/// Header values that do not parse as an IP are ignored.
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| parse_ip(s.trim()));

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| parse_ip(s.trim()))
        })
        .or_else(|| peer.map(|addr| addr.ip()))
}

/// Accepts bare addresses and `ip:port` forms
fn parse_ip(value: &str) -> Option<IpAddr> {
    value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

/// Zero the low-order bits of an address.
///
/// IPv4 keeps the /24 (last octet zeroed), IPv6 keeps the /48 (last 80 bits zeroed).
pub fn anonymize_ip(ip: &str) -> Option<String> {
    let addr = parse_ip(ip.trim())?;
    Some(anonymize_addr(addr).to_string())
}

/// [`anonymize_ip`] over a parsed address
pub fn anonymize_addr(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from_be_bytes(v4.octets()) & 0xFFFF_FF00;
            IpAddr::V4(Ipv4Addr::from(bits))
        }
        IpAddr::V6(v6) => {
            let mask = u128::MAX << 80;
            let bits = u128::from_be_bytes(v6.octets()) & mask;
            IpAddr::V6(Ipv6Addr::from(bits))
        }
    }
}

/// Cut to at most `max` characters on a char boundary
fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

/// Bound a user agent to [`MAX_USER_AGENT_LEN`] characters
pub fn truncate_user_agent(user_agent: &str) -> String {
    truncate_chars(user_agent, MAX_USER_AGENT_LEN)
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_QUERY_KEYS.iter().any(|s| lower.contains(s))
}

/// Strip credential-looking query parameters and bound the length.
///
/// A parameter is dropped when its key contains (case-insensitively) any of
/// `token`, `api_key`, `password`, `secret` or `auth`. Remaining parameters keep
/// their order. Input that is not an absolute URL is only truncated.
pub fn sanitize_referrer(referrer: &str) -> Option<String> {
    let referrer = referrer.trim();
    if referrer.is_empty() {
        return None;
    }

    let cleaned = match Url::parse(referrer) {
        Ok(mut url) => {
            if url.query().is_some() {
                let kept: Vec<(String, String)> = url
                    .query_pairs()
                    .filter(|(k, _)| !is_sensitive_key(k))
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();

                if kept.is_empty() {
                    url.set_query(None);
                } else {
                    url.query_pairs_mut().clear().extend_pairs(kept);
                }
            }
            url.to_string()
        }
        Err(_) => referrer.to_string(),
    };

    Some(truncate_chars(&cleaned, MAX_REFERRER_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_anonymize_ipv4() {
        assert_eq!(anonymize_ip("192.168.1.100").as_deref(), Some("192.168.1.0"));
        assert_eq!(anonymize_ip("8.8.8.8").as_deref(), Some("8.8.8.0"));
    }

    #[test]
    fn test_anonymize_ipv6() {
        assert_eq!(anonymize_ip("::1").as_deref(), Some("::"));
        assert_eq!(
            anonymize_ip("2001:db8:abcd:12:34:56:78:9a").as_deref(),
            Some("2001:db8:abcd::")
        );
    }

    #[test]
    fn test_anonymize_invalid() {
        assert_eq!(anonymize_ip("not-an-ip"), None);
        assert_eq!(anonymize_ip(""), None);
    }

    #[test]
    fn test_forwarded_for_first_hop_wins() {
        let h = headers(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1, 10.0.0.2")]);
        let peer: SocketAddr = "10.0.0.2:443".parse().unwrap();
        assert_eq!(
            extract_client_ip(&h, Some(peer)),
            Some("203.0.113.9".parse().unwrap())
        );
    }

    #[test]
    fn test_falls_back_to_real_ip_then_peer() {
        let h = headers(&[("x-real-ip", "198.51.100.4")]);
        assert_eq!(
            extract_client_ip(&h, None),
            Some("198.51.100.4".parse().unwrap())
        );

        let h = headers(&[("x-forwarded-for", "garbage")]);
        let peer: SocketAddr = "192.0.2.1:5000".parse().unwrap();
        assert_eq!(
            extract_client_ip(&h, Some(peer)),
            Some("192.0.2.1".parse().unwrap())
        );

        assert_eq!(extract_client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_sanitize_strips_sensitive_keys() {
        let cleaned = sanitize_referrer(
            "https://example.com/page?utm_source=ig&access_token=abc&API_KEY=k&ref=bio&Password=x&client_secret=s&oauth=1",
        )
        .unwrap();

        assert!(cleaned.starts_with("https://example.com/page?"));
        assert!(cleaned.contains("utm_source=ig"));
        assert!(cleaned.contains("ref=bio"));
        assert!(!cleaned.to_lowercase().contains("token"));
        assert!(!cleaned.to_lowercase().contains("api_key"));
        assert!(!cleaned.to_lowercase().contains("password"));
        assert!(!cleaned.contains("secret"));
        assert!(!cleaned.contains("oauth"));
        assert!(cleaned.find("utm_source").unwrap() < cleaned.find("ref=").unwrap());
    }

    #[test]
    fn test_sanitize_drops_empty_query() {
        assert_eq!(
            sanitize_referrer("https://example.com/?token=abc").as_deref(),
            Some("https://example.com/")
        );
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = format!("https://example.com/?q={}", "a".repeat(800));
        let cleaned = sanitize_referrer(&long).unwrap();
        assert_eq!(cleaned.chars().count(), MAX_REFERRER_LEN);

        let raw = "x".repeat(700);
        assert_eq!(sanitize_referrer(&raw).unwrap().len(), MAX_REFERRER_LEN);
    }

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize_referrer("   "), None);
    }

    #[test]
    fn test_truncate_user_agent_on_char_boundary() {
        let ua = "é".repeat(1200);
        let truncated = truncate_user_agent(&ua);
        assert_eq!(truncated.chars().count(), MAX_USER_AGENT_LEN);

        assert_eq!(truncate_user_agent("Mozilla/5.0"), "Mozilla/5.0");
    }
}
