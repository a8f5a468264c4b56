use serde::{Deserialize, Serialize};
use std::fmt;

use crate::checksum::Checksum;
use crate::state::{DocumentStateChecksums, LeafAsset, ProjectStateChecksums, SolutionStateChecksums};

/// Any checksum-addressable node of the workspace tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Asset {
    Solution(SolutionStateChecksums),
    Project(ProjectStateChecksums),
    Document(DocumentStateChecksums),
    Leaf(LeafAsset),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Solution,
    Project,
    Document,
    Leaf,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Solution => "solution",
            AssetKind::Project => "project",
            AssetKind::Document => "document",
            AssetKind::Leaf => "leaf",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Asset {
    /// The checksum this asset is addressed by.
    pub fn checksum(&self) -> Checksum {
        match self {
            Asset::Solution(node) => node.checksum(),
            Asset::Project(node) => node.checksum(),
            Asset::Document(node) => node.checksum(),
            Asset::Leaf(leaf) => leaf.checksum(),
        }
    }

    /// Recompute the checksum from content. Equal to [`Asset::checksum`] for any
    /// asset that was not tampered with in transit or at rest.
    pub fn compute_checksum(&self) -> Checksum {
        match self {
            Asset::Solution(node) => node.compute_checksum(),
            Asset::Project(node) => node.compute_checksum(),
            Asset::Document(node) => node.compute_checksum(),
            Asset::Leaf(leaf) => leaf.compute_checksum(),
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.checksum() == self.compute_checksum()
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            Asset::Solution(_) => AssetKind::Solution,
            Asset::Project(_) => AssetKind::Project,
            Asset::Document(_) => AssetKind::Document,
            Asset::Leaf(_) => AssetKind::Leaf,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Asset::Leaf(_))
    }

    /// Visit the non-null checksums of the direct children.
    pub fn for_each_child(&self, mut f: impl FnMut(Checksum)) {
        let mut visit = |c: Checksum| {
            if !c.is_null() {
                f(c)
            }
        };
        match self {
            Asset::Solution(node) => node.for_each_child(&mut visit),
            Asset::Project(node) => node.for_each_child(&mut visit),
            Asset::Document(node) => {
                visit(node.info());
                visit(node.text());
            }
            Asset::Leaf(_) => {}
        }
    }

    pub fn children(&self) -> Vec<Checksum> {
        let mut out = Vec::new();
        self.for_each_child(|c| out.push(c));
        out
    }
}

impl From<SolutionStateChecksums> for Asset {
    fn from(value: SolutionStateChecksums) -> Self {
        Asset::Solution(value)
    }
}

impl From<ProjectStateChecksums> for Asset {
    fn from(value: ProjectStateChecksums) -> Self {
        Asset::Project(value)
    }
}

impl From<DocumentStateChecksums> for Asset {
    fn from(value: DocumentStateChecksums) -> Self {
        Asset::Document(value)
    }
}

impl From<LeafAsset> for Asset {
    fn from(value: LeafAsset) -> Self {
        Asset::Leaf(value)
    }
}

/// Typed view over an [`Asset`] variant.
pub trait FromAsset: Sized {
    const KIND: &'static str;

    fn from_asset(asset: &Asset) -> Option<Self>;
}

impl FromAsset for Asset {
    const KIND: &'static str = "asset";

    fn from_asset(asset: &Asset) -> Option<Self> {
        Some(asset.clone())
    }
}

impl FromAsset for SolutionStateChecksums {
    const KIND: &'static str = "solution";

    fn from_asset(asset: &Asset) -> Option<Self> {
        match asset {
            Asset::Solution(node) => Some(node.clone()),
            _ => None,
        }
    }
}

impl FromAsset for ProjectStateChecksums {
    const KIND: &'static str = "project";

    fn from_asset(asset: &Asset) -> Option<Self> {
        match asset {
            Asset::Project(node) => Some(node.clone()),
            _ => None,
        }
    }
}

impl FromAsset for DocumentStateChecksums {
    const KIND: &'static str = "document";

    fn from_asset(asset: &Asset) -> Option<Self> {
        match asset {
            Asset::Document(node) => Some(node.clone()),
            _ => None,
        }
    }
}

impl FromAsset for LeafAsset {
    const KIND: &'static str = "leaf";

    fn from_asset(asset: &Asset) -> Option<Self> {
        match asset {
            Asset::Leaf(leaf) => Some(leaf.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LeafKind;
    use crate::ChecksumCollection;

    #[test]
    fn children_skip_null_entries() {
        let attrs = LeafAsset::new(LeafKind::SolutionAttributes, &b"sln"[..]);
        let project = Checksum::from_bytes(b"project");
        let solution = Asset::from(SolutionStateChecksums::new(
            attrs.checksum(),
            ChecksumCollection::new(vec![project, Checksum::NULL]),
            ChecksumCollection::default(),
        ));
        assert_eq!(solution.children(), vec![attrs.checksum(), project]);
        assert_eq!(solution.kind(), AssetKind::Solution);
    }

    #[test]
    fn typed_views_reject_wrong_variant() {
        let leaf = Asset::from(LeafAsset::new(LeafKind::SourceText, &b"fn main() {}"[..]));
        assert!(LeafAsset::from_asset(&leaf).is_some());
        assert!(DocumentStateChecksums::from_asset(&leaf).is_none());
        assert!(leaf.is_leaf());
        assert!(leaf.children().is_empty());
    }
}
