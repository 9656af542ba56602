// Client identity and credential extraction
//
// Everything here is total: malformed headers fall through to the next source
// and finally to a safe default, so callers never have to handle an error.

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};
use std::net::IpAddr;

/// Longest identity kept in a bucket key.
pub const MAX_IDENTITY_LEN: usize = 64;

pub const UNKNOWN_CLIENT: &str = "unknown";

/// Longest route segment kept in a bucket key.
pub const MAX_SEGMENT_LEN: usize = 32;

const ROOT_SEGMENT: &str = "root";

/// Resolve the client identity for rate limiting.
///
/// Order: first hop of `X-Forwarded-For` (trusted proxy), `X-Real-IP`, then the
/// transport peer address.
pub fn client_identity(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()));

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    let raw = forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|ip| ip.to_string()));

    match raw {
        Some(raw) => sanitize_identity(&raw),
        None => UNKNOWN_CLIENT.to_string(),
    }
}

/// Keep only characters that are safe in a store key, bounded in length.
pub fn sanitize_identity(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '_' | '-'))
        .take(MAX_IDENTITY_LEN)
        .collect();

    if cleaned.is_empty() {
        UNKNOWN_CLIENT.to_string()
    } else {
        cleaned
    }
}

/// The credential presented by the request, if any.
///
/// Accepts `Authorization: Bearer <token>` and `X-API-Key: <key>`.
pub fn presented_credential(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| {
            s.strip_prefix("Bearer ")
                .or_else(|| s.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let api_key = headers
        .get("x-api-key")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty());

    bearer.or(api_key).map(str::to_string)
}

/// First non-empty path segment, used to group routes into rate-limit families.
///
/// Filtered and capped like the identity, since it lands in the store key.
pub fn top_level_segment(path: &str) -> String {
    let cleaned: String = path
        .split('/')
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(MAX_SEGMENT_LEN)
        .collect();

    if cleaned.is_empty() {
        ROOT_SEGMENT.to_string()
    } else {
        cleaned
    }
}

/// Admin keys, held as SHA-256 digests so comparisons do not depend on key length.
#[derive(Debug, Clone, Default)]
pub struct AdminKeys {
    digests: Vec<[u8; 32]>,
}

impl AdminKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let digests = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .map(|k| Self::digest(&k))
            .collect();
        Self { digests }
    }

    fn digest(key: &str) -> [u8; 32] {
        Sha256::digest(key.as_bytes()).into()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    pub fn verify(&self, candidate: &str) -> bool {
        let candidate = Self::digest(candidate);
        // Constant time over all keys and bytes.
        self.digests.iter().fold(false, |found, digest| {
            let diff = digest
                .iter()
                .zip(candidate.iter())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b));
            found | (diff == 0)
        })
    }

    /// Whether the request carries a valid admin credential.
    pub fn authorizes(&self, headers: &HeaderMap) -> bool {
        presented_credential(headers).is_some_and(|c| self.verify(&c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_prefers_first_forwarded_hop() {
        let h = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_identity(&h, None), "203.0.113.7");
    }

    #[test]
    fn test_falls_back_to_real_ip_then_peer() {
        let h = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_identity(&h, None), "198.51.100.2");

        let peer: IpAddr = "192.0.2.9".parse().unwrap();
        assert_eq!(client_identity(&HeaderMap::new(), Some(peer)), "192.0.2.9");
        assert_eq!(client_identity(&HeaderMap::new(), None), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_sanitizes_identity() {
        assert_eq!(sanitize_identity("1.2.3.4\r\nX: y"), "1.2.3.4X:y");
        assert_eq!(sanitize_identity("$$$"), UNKNOWN_CLIENT);
        assert_eq!(sanitize_identity(&"a".repeat(200)).len(), MAX_IDENTITY_LEN);
    }

    #[test]
    fn test_presented_credential() {
        let h = headers(&[("authorization", "Bearer tok-1")]);
        assert_eq!(presented_credential(&h).as_deref(), Some("tok-1"));

        let h = headers(&[("x-api-key", "key-2")]);
        assert_eq!(presented_credential(&h).as_deref(), Some("key-2"));

        let h = headers(&[("authorization", "Basic dXNlcjpwdw==")]);
        assert_eq!(presented_credential(&h), None);
    }

    #[test]
    fn test_top_level_segment() {
        assert_eq!(top_level_segment("/v1/redact"), "v1");
        assert_eq!(top_level_segment("//admin/x"), "admin");
        assert_eq!(top_level_segment("/"), "root");
    }

    #[test]
    fn test_segment_is_sanitized_for_store_keys() {
        assert_eq!(top_level_segment("/v1:evil\r\nDEL *"), "v1evilDEL");
        assert_eq!(top_level_segment("/%%%/x"), "root");
        assert_eq!(
            top_level_segment(&format!("/{}", "s".repeat(500))).len(),
            MAX_SEGMENT_LEN
        );
    }

    #[test]
    fn test_admin_keys() {
        let keys = AdminKeys::new(["s3cret", " ", "other"]);
        assert!(keys.verify("s3cret"));
        assert!(keys.verify("other"));
        assert!(!keys.verify("s3cre"));
        assert!(!AdminKeys::default().verify("s3cret"));

        let h = headers(&[("authorization", "Bearer s3cret")]);
        assert!(keys.authorizes(&h));
    }
}
