//! Stable short hashes for change detection and suppression keys.

use sha2::{Digest, Sha256};

/// Hex chars kept from the full digest. Plenty for in-process keys and
/// keeps log lines readable.
const SHORT_HASH_LEN: usize = 16;

/// Hash an ordered sequence of parts joined by `:`.
pub fn stable_hash(parts: &[&str]) -> String {
    let digest = Sha256::digest(parts.join(":").as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(SHORT_HASH_LEN);
    hash
}

/// Order-independent hash of a set of items: sorted, joined, hashed.
///
/// Two topic lists (or field-path lists) with the same members always hash
/// identically regardless of arrival order.
pub fn hash_sorted<S: AsRef<str>>(items: &[S]) -> String {
    let mut sorted: Vec<&str> = items.iter().map(|s| s.as_ref()).collect();
    sorted.sort_unstable();
    stable_hash(&sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_hash_is_deterministic() {
        let a = stable_hash(&["orders", "total", "60"]);
        let b = stable_hash(&["orders", "total", "60"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), SHORT_HASH_LEN);
    }

    #[test]
    fn stable_hash_is_order_sensitive() {
        assert_ne!(stable_hash(&["a", "b"]), stable_hash(&["b", "a"]));
    }

    #[test]
    fn hash_sorted_ignores_order() {
        let a = hash_sorted(&["beta", "alpha", "gamma"]);
        let b = hash_sorted(&["gamma", "beta", "alpha"]);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_sorted_differs_on_membership() {
        assert_ne!(hash_sorted(&["alpha"]), hash_sorted(&["alpha", "beta"]));
        assert_ne!(hash_sorted::<&str>(&[]), hash_sorted(&["alpha"]));
    }
}
