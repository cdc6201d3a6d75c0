//! Identifier hashes for classes, selectors, protocols and categories.
use blake3::hash;
use fnv::FnvHashMap;
use tracing::trace;

/// Returns the identifier hash of a name for a target with the given pointer
/// width in bytes.
///
/// The hash consists of the first `width` bytes of the digest of the name,
/// packed in big-endian order. The runtime computes the same values for the
/// names it looks up, so this function must never change for a given width.
pub fn identifier_hash(name: &str, width: u32) -> u64 {
    let digest = hash(name.as_bytes());

    digest.as_bytes()[..width as usize]
        .iter()
        .fold(0_u64, |acc, &byte| (acc << 8) | byte as u64)
}

/// Two distinct names that produced the same identifier hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collision {
    pub hash: u64,
    pub existing: String,
    pub new: String,
}

/// A type for generating identifier hashes.
///
/// Hashes are cached per name, and every produced hash is recorded such that
/// collisions between different names can be detected. Collisions are never
/// resolved by changing the hash, as the runtime wouldn't be able to
/// reproduce such a value.
pub(crate) struct IdentifierHasher {
    width: u32,
    hashes: FnvHashMap<String, u64>,
    used: FnvHashMap<u64, String>,
    collisions: Vec<Collision>,
}

impl IdentifierHasher {
    pub(crate) fn new(width: u32) -> IdentifierHasher {
        let size = 256;

        IdentifierHasher {
            width,
            hashes: FnvHashMap::with_capacity_and_hasher(
                size,
                Default::default(),
            ),
            used: FnvHashMap::with_capacity_and_hasher(
                size,
                Default::default(),
            ),
            collisions: Vec::new(),
        }
    }

    pub(crate) fn hash(&mut self, name: &str) -> u64 {
        if let Some(&hash) = self.hashes.get(name) {
            return hash;
        }

        let hash = identifier_hash(name, self.width);

        if let Some(existing) = self.used.get(&hash) {
            trace!(
                hash = format!("{:#x}", hash).as_str(),
                existing = existing.as_str(),
                new = name,
                "recording hash collision"
            );

            self.collisions.push(Collision {
                hash,
                existing: existing.clone(),
                new: name.to_string(),
            });
        } else {
            self.used.insert(hash, name.to_string());
        }

        self.hashes.insert(name.to_string(), hash);
        hash
    }

    pub(crate) fn collisions(&self) -> &[Collision] {
        &self.collisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_hash_is_deterministic() {
        assert_eq!(identifier_hash("Foo", 8), identifier_hash("Foo", 8));
        assert_eq!(identifier_hash("", 8), identifier_hash("", 8));
        assert_ne!(identifier_hash("Foo", 8), identifier_hash("Bar", 8));
    }

    #[test]
    fn test_identifier_hash_width() {
        let wide = identifier_hash("init", 8);
        let narrow = identifier_hash("init", 4);

        assert!(narrow <= u32::MAX as u64);
        assert_eq!(wide >> 32, narrow);
    }

    #[test]
    fn test_identifier_hash_big_endian() {
        let digest = hash(b"alloc");
        let bytes = digest.as_bytes();
        let expected =
            u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

        assert_eq!(identifier_hash("alloc", 4), expected as u64);
    }

    #[test]
    fn test_identifier_hash_no_collisions_for_short_names() {
        let mut hasher = IdentifierHasher::new(4);

        for i in 0..2000 {
            hasher.hash(&format!("selector{}:", i));
        }

        assert!(hasher.collisions().is_empty());
    }

    #[test]
    fn test_hash() {
        let mut hasher = IdentifierHasher::new(8);

        assert_eq!(hasher.hash("foo"), hasher.hash("foo"));
        assert_ne!(hasher.hash("foo"), hasher.hash("bar"));
        assert_eq!(hasher.hash("foo"), identifier_hash("foo", 8));
    }

    #[test]
    fn test_hash_collision() {
        let mut hasher = IdentifierHasher::new(8);
        let hash = identifier_hash("foo", 8);

        hasher.used.insert(hash, "bar".to_string());

        assert_eq!(hasher.hash("foo"), hash);
        assert_eq!(
            hasher.collisions(),
            &[Collision {
                hash,
                existing: "bar".to_string(),
                new: "foo".to_string()
            }]
        );

        // The cached value doesn't produce a second collision.
        hasher.hash("foo");
        assert_eq!(hasher.collisions().len(), 1);
    }
}
