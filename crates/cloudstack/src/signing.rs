//! Request signing
//!
//! Arguments are sorted by lower-cased name and percent-encoded; the
//! lower-cased query string is signed with HMAC-SHA1 and the digest is sent
//! base64-encoded as `signature`.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use declarative::{Error, Result};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Percent-encode everything outside the RFC 3986 unreserved set
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Canonical query string: sorted by lower-cased name, values encoded
pub fn canonical_query(pairs: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort_by_key(|(name, _)| name.to_lowercase());
    sorted
        .iter()
        .map(|(name, value)| format!("{name}={}", encode_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Signature of a canonical query string
pub fn sign(query: &str, secret: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::config(format!("unusable api secret: {e}")))?;
    mac.update(query.to_lowercase().as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Query string with its signature appended
pub fn signed_query(pairs: &[(String, String)], secret: &str) -> Result<String> {
    let query = canonical_query(pairs);
    let signature = sign(&query, secret)?;
    Ok(format!("{query}&signature={}", encode_component(&signature)))
}
