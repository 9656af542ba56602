// Cache key derivation and entity tags

use crate::error::{GatewayError, Result};
use axum::http::{HeaderMap, HeaderName, Method, Uri};
use sha2::{Digest, Sha256};

/// Derives cache keys from the canonical form of a request.
///
/// Two requests share a key exactly when method, path, the multiset of decoded
/// query pairs, and the values of every vary header are equal. Query parameter
/// order and percent-encoding differences do not produce distinct keys.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    vary_headers: Vec<HeaderName>,
}

impl CacheKeyBuilder {
    /// Unparseable header names are skipped.
    pub fn new(vary_headers: &[String]) -> Self {
        let vary_headers = vary_headers
            .iter()
            .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
            .collect();
        Self { vary_headers }
    }

    /// `{path}#{sha256 of the canonical request}`. The readable path prefix is
    /// what prefix invalidation matches against.
    pub fn derive(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Result<String> {
        let path = uri.path();
        let query = canonical_query(uri.query().unwrap_or_default())?;

        let mut hasher = Sha256::new();
        field(&mut hasher, method.as_str().as_bytes());
        field(&mut hasher, path.as_bytes());

        for (name, value) in &query {
            field(&mut hasher, name.as_bytes());
            field(&mut hasher, value.as_bytes());
        }

        for name in &self.vary_headers {
            field(&mut hasher, name.as_str().as_bytes());
            let values: Vec<&[u8]> = headers.get_all(name).iter().map(|v| v.as_bytes()).collect();
            field(&mut hasher, &values.join(&b","[..]));
        }

        Ok(format!("{}#{}", path, hex::encode(hasher.finalize())))
    }
}

// Length-prefixed so adjacent fields cannot run together.
fn field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Decode and sort the query pairs. Fails on percent-escapes that don't decode
/// to UTF-8.
pub fn canonical_query(query: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (name, value) = segment.split_once('=').unwrap_or((segment, ""));
            Ok((decode_component(name)?, decode_component(value)?))
        })
        .collect::<Result<Vec<_>>>()?;

    pairs.sort();
    Ok(pairs)
}

fn decode_component(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| GatewayError::CacheKey(format!("malformed query component '{}': {}", raw, e)))
}

/// Strong entity tag over the body bytes.
pub fn etag_for(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("\"{}\"", &hex::encode(digest)[..32])
}

/// `If-None-Match` comparison: comma-separated list, `*`, and weak tags
/// compared by their opaque part.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let opaque = |tag: &str| tag.trim().trim_start_matches("W/").to_string();
    let target = opaque(etag);

    if_none_match
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || opaque(candidate) == target)
}
