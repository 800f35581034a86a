//! Content identity for products.
//!
//! A product is identified by the SHA-256 digest of its detail-page link,
//! truncated to [`HASH_LEN`] hex characters. Title and price are not part of
//! the identity because they legitimately change between captures.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest.
pub const HASH_LEN: usize = 16;

/// Compute the content hash of a canonical detail-page URL.
///
/// Returns an empty string for an empty URL.
pub fn content_hash(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    let digest = Sha256::digest(url.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_url_yields_empty_sentinel() {
        assert_eq!(content_hash(""), "");
    }

    #[test]
    fn hash_is_stable_and_fixed_length() {
        let url = "https://www.tokopedia.com/shop/gaming-mouse-x1";
        let a = content_hash(url);
        let b = content_hash(url);
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn known_digest_prefix() {
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(content_hash("abc"), "ba7816bf8f01cfea");
    }

    #[test]
    fn different_urls_differ() {
        assert_ne!(
            content_hash("https://example.com/a/1"),
            content_hash("https://example.com/a/2")
        );
    }
}
