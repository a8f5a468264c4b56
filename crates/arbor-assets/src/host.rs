//! The host side of synchronization: the authoritative asset map and builders
//! that lay a workspace tree out as checksummed nodes.

use arbor_core::codec::encode_asset;
use arbor_core::{
    Asset, Checksum, ChecksumCollection, CodecError, DocumentStateChecksums, LeafAsset, LeafKind,
    ProjectStateChecksums, ProjectStateParts, SolutionStateChecksums,
};
use arbor_remote_proto::AssetPayload;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::AssetError;
use crate::source::AssetSource;

/// Serialized assets held by the primary host, keyed by checksum.
///
/// Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct AssetHost {
    assets: Arc<RwLock<HashMap<Checksum, Bytes>>>,
}

impl AssetHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize and register `asset`. Identical assets are stored once.
    pub fn insert(&self, asset: impl Into<Asset>) -> Result<Checksum, CodecError> {
        let asset = asset.into();
        let checksum = asset.checksum();
        if self.contains(&checksum) {
            return Ok(checksum);
        }
        let bytes = Bytes::from(encode_asset(&asset)?);
        self.assets.write().entry(checksum).or_insert(bytes);
        Ok(checksum)
    }

    pub fn insert_leaf(&self, kind: LeafKind, data: impl Into<Bytes>) -> Result<Checksum, CodecError> {
        self.insert(LeafAsset::new(kind, data))
    }

    pub fn get(&self, checksum: &Checksum) -> Option<Bytes> {
        self.assets.read().get(checksum).cloned()
    }

    pub fn contains(&self, checksum: &Checksum) -> bool {
        self.assets.read().contains_key(checksum)
    }

    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }

    /// Payloads for every known checksum in `checksums`; unknown ones are skipped.
    pub fn resolve(&self, checksums: &[Checksum]) -> Vec<AssetPayload> {
        let assets = self.assets.read();
        checksums
            .iter()
            .filter_map(|checksum| {
                assets.get(checksum).map(|data| AssetPayload {
                    checksum: *checksum,
                    data: data.clone(),
                })
            })
            .collect()
    }

    pub fn solution(&self) -> SolutionBuilder<'_> {
        SolutionBuilder {
            host: self,
            attributes: Checksum::NULL,
            projects: Vec::new(),
            analyzer_references: Vec::new(),
        }
    }

    pub fn project(&self) -> ProjectBuilder<'_> {
        ProjectBuilder {
            host: self,
            info: Checksum::NULL,
            compilation_options: Checksum::NULL,
            parse_options: Checksum::NULL,
            documents: Vec::new(),
            project_references: Vec::new(),
            metadata_references: Vec::new(),
            analyzer_references: Vec::new(),
            additional_documents: Vec::new(),
            analyzer_config_documents: Vec::new(),
        }
    }

    fn insert_document(&self, info: Bytes, text: Bytes) -> Result<Checksum, CodecError> {
        let info = self.insert_leaf(LeafKind::DocumentInfo, info)?;
        let text = self.insert_leaf(LeafKind::SourceText, text)?;
        self.insert(DocumentStateChecksums::new(info, text))
    }
}

#[async_trait]
impl AssetSource for AssetHost {
    async fn fetch_assets(
        &self,
        checksums: Vec<Checksum>,
        _cancel: CancellationToken,
    ) -> Result<Vec<AssetPayload>, AssetError> {
        Ok(self.resolve(&checksums))
    }
}

/// Lays out a solution node over projects built with [`ProjectBuilder`].
pub struct SolutionBuilder<'a> {
    host: &'a AssetHost,
    attributes: Checksum,
    projects: Vec<Checksum>,
    analyzer_references: Vec<Checksum>,
}

impl SolutionBuilder<'_> {
    pub fn attributes(&mut self, data: impl Into<Bytes>) -> Result<&mut Self, CodecError> {
        self.attributes = self.host.insert_leaf(LeafKind::SolutionAttributes, data)?;
        Ok(self)
    }

    /// Add a project node previously returned by [`ProjectBuilder::build`].
    pub fn project(&mut self, project: Checksum) -> &mut Self {
        self.projects.push(project);
        self
    }

    pub fn analyzer_reference(&mut self, data: impl Into<Bytes>) -> Result<&mut Self, CodecError> {
        let checksum = self.host.insert_leaf(LeafKind::AnalyzerReference, data)?;
        self.analyzer_references.push(checksum);
        Ok(self)
    }

    pub fn build(&self) -> Result<Checksum, CodecError> {
        self.host.insert(SolutionStateChecksums::new(
            self.attributes,
            ChecksumCollection::new(self.projects.clone()),
            ChecksumCollection::new(self.analyzer_references.clone()),
        ))
    }
}

/// Lays out one project node. Settings that are never set stay null.
pub struct ProjectBuilder<'a> {
    host: &'a AssetHost,
    info: Checksum,
    compilation_options: Checksum,
    parse_options: Checksum,
    documents: Vec<Checksum>,
    project_references: Vec<Checksum>,
    metadata_references: Vec<Checksum>,
    analyzer_references: Vec<Checksum>,
    additional_documents: Vec<Checksum>,
    analyzer_config_documents: Vec<Checksum>,
}

impl ProjectBuilder<'_> {
    pub fn info(&mut self, data: impl Into<Bytes>) -> Result<&mut Self, CodecError> {
        self.info = self.host.insert_leaf(LeafKind::ProjectInfo, data)?;
        Ok(self)
    }

    pub fn compilation_options(&mut self, data: impl Into<Bytes>) -> Result<&mut Self, CodecError> {
        self.compilation_options = self.host.insert_leaf(LeafKind::CompilationOptions, data)?;
        Ok(self)
    }

    pub fn parse_options(&mut self, data: impl Into<Bytes>) -> Result<&mut Self, CodecError> {
        self.parse_options = self.host.insert_leaf(LeafKind::ParseOptions, data)?;
        Ok(self)
    }

    pub fn document(
        &mut self,
        info: impl Into<Bytes>,
        text: impl Into<Bytes>,
    ) -> Result<&mut Self, CodecError> {
        let checksum = self.host.insert_document(info.into(), text.into())?;
        self.documents.push(checksum);
        Ok(self)
    }

    pub fn additional_document(
        &mut self,
        info: impl Into<Bytes>,
        text: impl Into<Bytes>,
    ) -> Result<&mut Self, CodecError> {
        let checksum = self.host.insert_document(info.into(), text.into())?;
        self.additional_documents.push(checksum);
        Ok(self)
    }

    pub fn analyzer_config_document(
        &mut self,
        info: impl Into<Bytes>,
        text: impl Into<Bytes>,
    ) -> Result<&mut Self, CodecError> {
        let checksum = self.host.insert_document(info.into(), text.into())?;
        self.analyzer_config_documents.push(checksum);
        Ok(self)
    }

    pub fn project_reference(&mut self, data: impl Into<Bytes>) -> Result<&mut Self, CodecError> {
        let checksum = self.host.insert_leaf(LeafKind::ProjectReference, data)?;
        self.project_references.push(checksum);
        Ok(self)
    }

    pub fn metadata_reference(&mut self, data: impl Into<Bytes>) -> Result<&mut Self, CodecError> {
        let checksum = self.host.insert_leaf(LeafKind::MetadataReference, data)?;
        self.metadata_references.push(checksum);
        Ok(self)
    }

    pub fn analyzer_reference(&mut self, data: impl Into<Bytes>) -> Result<&mut Self, CodecError> {
        let checksum = self.host.insert_leaf(LeafKind::AnalyzerReference, data)?;
        self.analyzer_references.push(checksum);
        Ok(self)
    }

    pub fn build(&self) -> Result<Checksum, CodecError> {
        self.host
            .insert(ProjectStateChecksums::new(ProjectStateParts {
                info: self.info,
                compilation_options: self.compilation_options,
                parse_options: self.parse_options,
                documents: ChecksumCollection::new(self.documents.clone()),
                project_references: ChecksumCollection::new(self.project_references.clone()),
                metadata_references: ChecksumCollection::new(self.metadata_references.clone()),
                analyzer_references: ChecksumCollection::new(self.analyzer_references.clone()),
                additional_documents: ChecksumCollection::new(self.additional_documents.clone()),
                analyzer_config_documents: ChecksumCollection::new(
                    self.analyzer_config_documents.clone(),
                ),
            }))
    }
}
