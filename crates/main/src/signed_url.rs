//! Time-limited signed URLs for stored sponsor letters.
//!
//! The signature is hex(HMAC-SHA256(secret, "path:expires")); a URL is
//! valid until its embedded expiry timestamp passes.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Signed URLs are valid for exactly seven days.
pub const SIGNED_URL_VALIDITY_SECS: i64 = 604_800;

type HmacSha256 = Hmac<Sha256>;

pub fn secret_from_env() -> String {
    std::env::var("SIGNED_URL_SECRET").unwrap_or_default()
}

pub fn sign_path(path: &str, expires_unix: i64, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(path.as_bytes());
    mac.update(b":");
    mac.update(expires_unix.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Builds a download URL for `path` that expires
/// `SIGNED_URL_VALIDITY_SECS` seconds after `now_unix`.
pub fn signed_url(
    site_url: &str,
    path: &str,
    now_unix: i64,
    secret: &str,
) -> String {
    let expires = now_unix + SIGNED_URL_VALIDITY_SECS;
    let sig = sign_path(path, expires, secret);
    format!(
        "{}/files/sponsor-letter?path={}&expires={}&sig={}",
        site_url.trim_end_matches('/'),
        urlencode(path),
        expires,
        sig
    )
}

pub fn verify(
    path: &str,
    expires_unix: i64,
    sig: &str,
    secret: &str,
    now_unix: i64,
) -> bool {
    if expires_unix <= now_unix {
        return false;
    }
    let expected = sign_path(path, expires_unix, secret);
    let (a, b) = (sig.as_bytes(), expected.as_bytes());
    a.len() == b.len()
        && a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Rejects paths that could escape the uploads directory.
pub fn is_safe_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.split('/').any(|segment| segment == "..")
}

fn urlencode(s: &str) -> String {
    // query-string escaping for the one character class that matters here
    s.replace('%', "%25").replace('&', "%26").replace('+', "%2B")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_expires_in_exactly_seven_days() {
        let url = signed_url("https://mcvu.example", "letters/a.pdf", 1_000, "s");
        let expires: i64 = url
            .split("expires=")
            .nth(1)
            .unwrap()
            .split('&')
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(expires - 1_000, SIGNED_URL_VALIDITY_SECS);
    }

    #[test]
    fn round_trip_verifies() {
        let expires = 2_000 + SIGNED_URL_VALIDITY_SECS;
        let sig = sign_path("letters/a.pdf", expires, "s");
        assert!(verify("letters/a.pdf", expires, &sig, "s", 2_000));
    }

    #[test]
    fn expired_or_tampered_urls_fail() {
        let expires = 2_000 + SIGNED_URL_VALIDITY_SECS;
        let sig = sign_path("letters/a.pdf", expires, "s");
        // past expiry
        assert!(!verify("letters/a.pdf", expires, &sig, "s", expires));
        // different path
        assert!(!verify("letters/b.pdf", expires, &sig, "s", 2_000));
        // different secret
        assert!(!verify("letters/a.pdf", expires, &sig, "t", 2_000));
    }

    #[test]
    fn traversal_paths_rejected() {
        assert!(is_safe_path("letters/a.pdf"));
        assert!(!is_safe_path("../secrets.db"));
        assert!(!is_safe_path("letters/../../etc/passwd"));
        assert!(!is_safe_path("/etc/passwd"));
        assert!(!is_safe_path(""));
    }
}
