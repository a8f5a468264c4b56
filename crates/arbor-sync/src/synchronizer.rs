use arbor_assets::{AssetError, AssetProvider};
use arbor_core::{Checksum, DocumentStateChecksums, ProjectStateChecksums, SolutionStateChecksums};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::gate::SyncGate;

/// Makes checksum subtrees locally resolvable with as few remote round trips
/// as the tree shape allows.
///
/// Every bulk operation holds the gate for its whole duration. Nested steps
/// run on the `*_locked` variants, so the gate is never acquired twice.
pub struct ChecksumSynchronizer {
    provider: Arc<AssetProvider>,
    gate: SyncGate,
}

impl ChecksumSynchronizer {
    pub fn new(provider: Arc<AssetProvider>) -> Self {
        Self::with_gate(provider, SyncGate::new())
    }

    pub fn with_gate(provider: Arc<AssetProvider>, gate: SyncGate) -> Self {
        Self { provider, gate }
    }

    pub fn provider(&self) -> &Arc<AssetProvider> {
        &self.provider
    }

    pub fn gate(&self) -> &SyncGate {
        &self.gate
    }

    /// Fetch whatever part of `checksums` is not available locally, in one batch.
    pub async fn synchronize_assets(
        &self,
        checksums: &HashSet<Checksum>,
        cancel: &CancellationToken,
    ) -> Result<(), AssetError> {
        let _guard = self.gate.acquire(cancel).await?;
        self.provider.synchronize_assets(checksums, cancel).await
    }

    /// Make the whole tree under a solution node locally resolvable.
    ///
    /// One round trip for the root, one for its direct children, then at most
    /// two per project.
    pub async fn synchronize_solution_assets(
        &self,
        root: Checksum,
        cancel: &CancellationToken,
    ) -> Result<(), AssetError> {
        let _guard = self.gate.acquire(cancel).await?;

        let solution: SolutionStateChecksums = self.provider.get_asset(root, cancel).await?;

        let mut children = HashSet::new();
        solution.for_each_child(|checksum| {
            children.insert(checksum);
        });
        children.remove(&solution.checksum());
        self.provider.synchronize_assets(&children, cancel).await?;

        tracing::debug!(
            target = "arbor.sync",
            solution = ?root,
            projects = solution.projects().len(),
            "synchronized solution children"
        );

        for project in solution.projects() {
            if project.is_null() {
                continue;
            }
            let project: ProjectStateChecksums = self.provider.get_required_asset(*project)?;
            self.synchronize_project_assets_locked(&project, cancel)
                .await?;
        }
        Ok(())
    }

    /// Make everything under one project node locally resolvable in at most
    /// two round trips.
    pub async fn synchronize_project_assets(
        &self,
        project: &ProjectStateChecksums,
        cancel: &CancellationToken,
    ) -> Result<(), AssetError> {
        let _guard = self.gate.acquire(cancel).await?;
        self.synchronize_project_assets_locked(project, cancel).await
    }

    async fn synchronize_project_assets_locked(
        &self,
        project: &ProjectStateChecksums,
        cancel: &CancellationToken,
    ) -> Result<(), AssetError> {
        // Settings and the members of every collection.
        let mut first = HashSet::new();
        for checksum in [
            project.info(),
            project.compilation_options(),
            project.parse_options(),
        ] {
            if !checksum.is_null() {
                first.insert(checksum);
            }
        }
        for collection in [
            project.documents(),
            project.project_references(),
            project.metadata_references(),
            project.analyzer_references(),
            project.additional_documents(),
            project.analyzer_config_documents(),
        ] {
            first.extend(collection.iter().copied().filter(|c| !c.is_null()));
        }
        self.provider.synchronize_assets(&first, cancel).await?;

        // Info and text of every document obtained above.
        let mut second = HashSet::new();
        for collection in project.document_collections() {
            for checksum in collection.iter().filter(|c| !c.is_null()) {
                let document: DocumentStateChecksums =
                    self.provider.get_required_asset(*checksum)?;
                second.insert(document.info());
                second.insert(document.text());
            }
        }
        second.remove(&Checksum::NULL);
        self.provider.synchronize_assets(&second, cancel).await?;

        tracing::debug!(
            target = "arbor.sync",
            project = ?project.checksum(),
            first = first.len(),
            second = second.len(),
            "synchronized project"
        );
        Ok(())
    }

    /// Make the subtree under any node locally resolvable, one batch per level.
    ///
    /// Nodes already cached are descended into but never refetched.
    pub async fn synchronize_subtree(
        &self,
        root: Checksum,
        cancel: &CancellationToken,
    ) -> Result<(), AssetError> {
        if root.is_null() {
            return Err(AssetError::NullChecksum);
        }
        let _guard = self.gate.acquire(cancel).await?;

        let mut visited = HashSet::new();
        let mut level: HashSet<Checksum> = [root].into_iter().collect();
        let mut depth = 0usize;
        while !level.is_empty() {
            self.provider.synchronize_assets(&level, cancel).await?;
            visited.extend(level.iter().copied());

            let mut next = HashSet::new();
            for checksum in &level {
                let asset = self
                    .provider
                    .cache()
                    .get(checksum)
                    .ok_or(AssetError::NotCached {
                        checksum: *checksum,
                    })?;
                asset.for_each_child(|child| {
                    if !visited.contains(&child) {
                        next.insert(child);
                    }
                });
            }

            tracing::trace!(
                target = "arbor.sync",
                depth,
                nodes = level.len(),
                "synchronized subtree level"
            );
            depth += 1;
            level = next;
        }
        Ok(())
    }
}
