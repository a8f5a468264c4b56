//! Composite state nodes of the workspace tree and the leaf payloads they point at.
//!
//! A composite node's checksum is a pure function of its kind and its children's
//! checksums. Nodes store the checksum they were built with; `compute_checksum`
//! recomputes it from the fields so received nodes can be verified.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::collection::ChecksumCollection;

const SOLUTION_TAG: &[u8] = b"arbor.solution";
const PROJECT_TAG: &[u8] = b"arbor.project";
const DOCUMENT_TAG: &[u8] = b"arbor.document";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionStateChecksums {
    checksum: Checksum,
    attributes: Checksum,
    projects: ChecksumCollection,
    analyzer_references: ChecksumCollection,
}

impl SolutionStateChecksums {
    pub fn new(
        attributes: Checksum,
        projects: ChecksumCollection,
        analyzer_references: ChecksumCollection,
    ) -> Self {
        let mut node = Self {
            checksum: Checksum::NULL,
            attributes,
            projects,
            analyzer_references,
        };
        node.checksum = node.compute_checksum();
        node
    }

    pub fn checksum(&self) -> Checksum {
        self.checksum
    }

    pub fn attributes(&self) -> Checksum {
        self.attributes
    }

    /// Checksums of the per-project [`ProjectStateChecksums`] nodes.
    pub fn projects(&self) -> &ChecksumCollection {
        &self.projects
    }

    pub fn analyzer_references(&self) -> &ChecksumCollection {
        &self.analyzer_references
    }

    pub fn compute_checksum(&self) -> Checksum {
        Checksum::from_parts(
            SOLUTION_TAG,
            [
                self.attributes,
                self.projects.compute_checksum(),
                self.analyzer_references.compute_checksum(),
            ],
        )
    }

    /// Every direct child checksum, null entries included.
    pub fn for_each_child(&self, mut f: impl FnMut(Checksum)) {
        f(self.attributes);
        self.projects.iter().copied().for_each(&mut f);
        self.analyzer_references.iter().copied().for_each(&mut f);
    }
}

/// Field values used to build a [`ProjectStateChecksums`].
///
/// Options that a project does not carry stay [`Checksum::NULL`].
#[derive(Debug, Clone, Default)]
pub struct ProjectStateParts {
    pub info: Checksum,
    pub compilation_options: Checksum,
    pub parse_options: Checksum,
    pub documents: ChecksumCollection,
    pub project_references: ChecksumCollection,
    pub metadata_references: ChecksumCollection,
    pub analyzer_references: ChecksumCollection,
    pub additional_documents: ChecksumCollection,
    pub analyzer_config_documents: ChecksumCollection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStateChecksums {
    checksum: Checksum,
    info: Checksum,
    compilation_options: Checksum,
    parse_options: Checksum,
    documents: ChecksumCollection,
    project_references: ChecksumCollection,
    metadata_references: ChecksumCollection,
    analyzer_references: ChecksumCollection,
    additional_documents: ChecksumCollection,
    analyzer_config_documents: ChecksumCollection,
}

impl ProjectStateChecksums {
    pub fn new(parts: ProjectStateParts) -> Self {
        let mut node = Self {
            checksum: Checksum::NULL,
            info: parts.info,
            compilation_options: parts.compilation_options,
            parse_options: parts.parse_options,
            documents: parts.documents,
            project_references: parts.project_references,
            metadata_references: parts.metadata_references,
            analyzer_references: parts.analyzer_references,
            additional_documents: parts.additional_documents,
            analyzer_config_documents: parts.analyzer_config_documents,
        };
        node.checksum = node.compute_checksum();
        node
    }

    pub fn checksum(&self) -> Checksum {
        self.checksum
    }

    pub fn info(&self) -> Checksum {
        self.info
    }

    pub fn compilation_options(&self) -> Checksum {
        self.compilation_options
    }

    pub fn parse_options(&self) -> Checksum {
        self.parse_options
    }

    pub fn documents(&self) -> &ChecksumCollection {
        &self.documents
    }

    pub fn project_references(&self) -> &ChecksumCollection {
        &self.project_references
    }

    pub fn metadata_references(&self) -> &ChecksumCollection {
        &self.metadata_references
    }

    pub fn analyzer_references(&self) -> &ChecksumCollection {
        &self.analyzer_references
    }

    pub fn additional_documents(&self) -> &ChecksumCollection {
        &self.additional_documents
    }

    pub fn analyzer_config_documents(&self) -> &ChecksumCollection {
        &self.analyzer_config_documents
    }

    /// The three collections whose members are [`DocumentStateChecksums`] nodes.
    pub fn document_collections(&self) -> [&ChecksumCollection; 3] {
        [
            &self.documents,
            &self.additional_documents,
            &self.analyzer_config_documents,
        ]
    }

    pub fn compute_checksum(&self) -> Checksum {
        Checksum::from_parts(
            PROJECT_TAG,
            [
                self.info,
                self.compilation_options,
                self.parse_options,
                self.documents.compute_checksum(),
                self.project_references.compute_checksum(),
                self.metadata_references.compute_checksum(),
                self.analyzer_references.compute_checksum(),
                self.additional_documents.compute_checksum(),
                self.analyzer_config_documents.compute_checksum(),
            ],
        )
    }

    pub fn for_each_child(&self, mut f: impl FnMut(Checksum)) {
        f(self.info);
        f(self.compilation_options);
        f(self.parse_options);
        for collection in [
            &self.documents,
            &self.project_references,
            &self.metadata_references,
            &self.analyzer_references,
            &self.additional_documents,
            &self.analyzer_config_documents,
        ] {
            collection.iter().copied().for_each(&mut f);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStateChecksums {
    checksum: Checksum,
    info: Checksum,
    text: Checksum,
}

impl DocumentStateChecksums {
    pub fn new(info: Checksum, text: Checksum) -> Self {
        Self {
            checksum: Checksum::from_parts(DOCUMENT_TAG, [info, text]),
            info,
            text,
        }
    }

    pub fn checksum(&self) -> Checksum {
        self.checksum
    }

    pub fn info(&self) -> Checksum {
        self.info
    }

    pub fn text(&self) -> Checksum {
        self.text
    }

    pub fn compute_checksum(&self) -> Checksum {
        Checksum::from_parts(DOCUMENT_TAG, [self.info, self.text])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeafKind {
    SolutionAttributes,
    ProjectInfo,
    CompilationOptions,
    ParseOptions,
    ProjectReference,
    MetadataReference,
    AnalyzerReference,
    DocumentInfo,
    SourceText,
}

impl LeafKind {
    pub fn tag(self) -> &'static str {
        match self {
            LeafKind::SolutionAttributes => "solution-attributes",
            LeafKind::ProjectInfo => "project-info",
            LeafKind::CompilationOptions => "compilation-options",
            LeafKind::ParseOptions => "parse-options",
            LeafKind::ProjectReference => "project-reference",
            LeafKind::MetadataReference => "metadata-reference",
            LeafKind::AnalyzerReference => "analyzer-reference",
            LeafKind::DocumentInfo => "document-info",
            LeafKind::SourceText => "source-text",
        }
    }
}

/// An opaque serialized payload at the bottom of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafAsset {
    checksum: Checksum,
    kind: LeafKind,
    data: Bytes,
}

impl LeafAsset {
    pub fn new(kind: LeafKind, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            checksum: Checksum::from_tagged_bytes(kind.tag().as_bytes(), &data),
            kind,
            data,
        }
    }

    pub fn checksum(&self) -> Checksum {
        self.checksum
    }

    pub fn kind(&self) -> LeafKind {
        self.kind
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn compute_checksum(&self) -> Checksum {
        Checksum::from_tagged_bytes(self.kind.tag().as_bytes(), &self.data)
    }
}
