//! Graph fingerprints for change detection

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of an element graph (or some part of it).
///
/// Two graphs with the same fingerprint hold the same keys, types, relations
/// and parameter values. Validation runs compare fingerprints to prove that a
/// second run changes nothing and that relations were left untouched.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn builder() -> HashBuilder {
        HashBuilder::default()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex digest
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }

    /// First 12 hex digits, enough to tell runs apart in logs
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContentHash").field(&self.short()).finish()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Incremental fingerprint builder.
///
/// Every field is length-prefixed, so `"ab" + "c"` and `"a" + "bc"` never
/// collide.
#[derive(Clone, Default)]
pub struct HashBuilder {
    digest: Sha256,
}

impl HashBuilder {
    pub fn field(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        let bytes = bytes.as_ref();
        self.digest.update((bytes.len() as u64).to_le_bytes());
        self.digest.update(bytes);
        self
    }

    /// Tag the start of a new record so that empty fields still count
    pub fn record(&mut self, tag: u8) -> &mut Self {
        self.digest.update([0xff, tag]);
        self
    }

    pub fn finish(self) -> ContentHash {
        ContentHash(self.digest.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(fields: &[&str]) -> ContentHash {
        let mut builder = ContentHash::builder();
        for field in fields {
            builder.field(field);
        }
        builder.finish()
    }

    #[test]
    fn test_same_fields_same_hash() {
        assert_eq!(hash_of(&["door", "Door"]), hash_of(&["door", "Door"]));
        assert_ne!(hash_of(&["door", "Door"]), hash_of(&["door", "Wall"]));
    }

    #[test]
    fn test_field_boundaries_matter() {
        assert_ne!(hash_of(&["ab", "c"]), hash_of(&["a", "bc"]));
    }

    #[test]
    fn test_records_matter() {
        let mut a = ContentHash::builder();
        a.record(0).field("x");
        let mut b = ContentHash::builder();
        b.field("x");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_hex_forms() {
        let h = hash_of(&["wall"]);
        assert_eq!(h.to_hex().len(), 64);
        assert_eq!(h.short().len(), 12);
        assert!(h.to_hex().starts_with(&h.to_string()));
    }
}
