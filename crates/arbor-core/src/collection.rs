use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;

const COLLECTION_TAG: &[u8] = b"arbor.collection";

/// Ordered checksums of the direct children of a composite node.
///
/// Order is preserved and membership is authoritative. The collection carries
/// its own checksum, derived from its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumCollection {
    checksum: Checksum,
    children: Vec<Checksum>,
}

impl ChecksumCollection {
    pub fn new(children: Vec<Checksum>) -> Self {
        let checksum = Checksum::from_parts(COLLECTION_TAG, children.iter().copied());
        Self { checksum, children }
    }

    pub fn checksum(&self) -> Checksum {
        self.checksum
    }

    pub fn children(&self) -> &[Checksum] {
        &self.children
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Checksum> {
        self.children.iter()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn contains(&self, checksum: &Checksum) -> bool {
        self.children.contains(checksum)
    }

    /// Recompute the collection checksum from its members.
    pub fn compute_checksum(&self) -> Checksum {
        Checksum::from_parts(COLLECTION_TAG, self.children.iter().copied())
    }
}

impl Default for ChecksumCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FromIterator<Checksum> for ChecksumCollection {
    fn from_iter<I: IntoIterator<Item = Checksum>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ChecksumCollection {
    type Item = &'a Checksum;
    type IntoIter = std::slice::Iter<'a, Checksum>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_members_share_a_checksum() {
        let a = Checksum::from_bytes(b"a");
        let b = Checksum::from_bytes(b"b");
        let left: ChecksumCollection = [a, b].into_iter().collect();
        let right = ChecksumCollection::new(vec![a, b]);
        assert_eq!(left.checksum(), right.checksum());
        assert_eq!(left.compute_checksum(), left.checksum());

        let reordered = ChecksumCollection::new(vec![b, a]);
        assert_ne!(left.checksum(), reordered.checksum());
    }

    #[test]
    fn empty_collection_is_not_null() {
        let empty = ChecksumCollection::default();
        assert!(empty.is_empty());
        assert!(!empty.checksum().is_null());
    }
}
