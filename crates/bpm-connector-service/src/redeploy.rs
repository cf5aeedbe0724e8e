// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Replace-and-reload protocol for connector implementations.
//!
//! A redeploy walks through [`RedeployStage`]s in order. Validation and
//! extraction have no side effects. From `DeleteOld` on, the stores are
//! modified; a failure while the old implementation is gone and the new one
//! is not fully in place triggers compensation, which removes whatever the new
//! deployment created and restores the snapshot of the old implementation.
//! Failures after `DeployNew` leave the new implementation persisted; the
//! cache heals on the next lookup miss.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::archive::{ConnectorArchive, check_implementation_is_valid};
use crate::cache::{ConnectorImplementationCache, ImplementationKey};
use crate::descriptor::{ConnectorImplementationDescriptor, is_descriptor_file};
use crate::error::{Error, Result};
use crate::service::load_descriptors;
use crate::store::{
    BarResource, BarResourceType, Dependency, DependencyStore, ResourceStore, ScopeType, StoreError,
    all_resources, process_dependency_name,
};

/// Stage of a redeploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RedeployStage {
    /// Check the archive against the target connector.
    Validate,
    /// Unpack the descriptor and jars.
    Extract,
    /// Snapshot and remove the current implementation.
    DeleteOld,
    /// Persist the new jars and descriptor.
    DeployNew,
    /// Evict the cached descriptor.
    InvalidateCache,
    /// Rebuild the cache for the process.
    Reload,
    /// Done.
    Completed,
}

impl RedeployStage {
    /// Returns the string representation of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Extract => "extract",
            Self::DeleteOld => "delete_old",
            Self::DeployNew => "deploy_new",
            Self::InvalidateCache => "invalidate_cache",
            Self::Reload => "reload",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for RedeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The implementation being replaced, as it was before `DeleteOld`.
///
/// `jars` holds the jars the old descriptor declares plus any process jar the
/// new archive would collide with, whether or not a descriptor owns it.
#[derive(Debug, Clone, Default)]
struct Snapshot {
    resource: Option<SnapshotResource>,
    jars: Vec<Dependency>,
}

#[derive(Debug, Clone)]
struct SnapshotResource {
    name: String,
    content: Vec<u8>,
}

impl Snapshot {
    fn is_empty(&self) -> bool {
        self.resource.is_none() && self.jars.is_empty()
    }

    fn push_jar(&mut self, dependency: Dependency) {
        if !self.jars.iter().any(|jar| jar.id == dependency.id) {
            self.jars.push(dependency);
        }
    }
}

/// What `DeployNew` has created so far.
#[derive(Debug, Default)]
struct Deployed {
    dependency_ids: Vec<i64>,
    resource_name: Option<String>,
}

/// One replace-and-reload run for a single implementation key.
pub(crate) struct Redeployment<'a> {
    key: ImplementationKey,
    resources: &'a dyn ResourceStore,
    dependencies: &'a dyn DependencyStore,
    cache: &'a ConnectorImplementationCache,
    scan_page_size: usize,
    stage: RedeployStage,
}

impl<'a> Redeployment<'a> {
    pub(crate) fn new(
        key: ImplementationKey,
        resources: &'a dyn ResourceStore,
        dependencies: &'a dyn DependencyStore,
        cache: &'a ConnectorImplementationCache,
        scan_page_size: usize,
    ) -> Self {
        Self {
            key,
            resources,
            dependencies,
            cache,
            scan_page_size,
            stage: RedeployStage::Validate,
        }
    }

    fn process_definition_id(&self) -> i64 {
        self.key.process_definition_id
    }

    fn enter(&mut self, stage: RedeployStage) {
        self.stage = stage;
        debug!(key = %self.key, stage = %stage, "Redeploy stage");
    }

    fn failed(&self, source: impl Into<Error>, compensated: bool) -> Error {
        Error::Redeploy {
            key: self.key.clone(),
            stage: self.stage,
            compensated,
            source: Box::new(source.into()),
        }
    }

    /// Run every stage against the uploaded archive bytes.
    pub(crate) async fn run(
        mut self,
        archive_bytes: &[u8],
    ) -> Result<Arc<ConnectorImplementationDescriptor>> {
        info!(key = %self.key, size = archive_bytes.len(), "Replacing connector implementation");

        self.enter(RedeployStage::Validate);
        let descriptor =
            check_implementation_is_valid(archive_bytes, &self.key.connector_id, &self.key.version)?;

        self.enter(RedeployStage::Extract);
        let archive = ConnectorArchive::extract(archive_bytes)?;

        self.enter(RedeployStage::DeleteOld);
        let snapshot = self
            .snapshot(&archive)
            .await
            .map_err(|e| self.failed(e, false))?;
        if !snapshot.is_empty()
            && let Err(e) = self.delete(&snapshot).await
        {
            let compensated = self.compensate(&Deployed::default(), &snapshot).await;
            return Err(self.failed(e, compensated));
        }

        self.enter(RedeployStage::DeployNew);
        let mut deployed = Deployed::default();
        if let Err(e) = self.deploy(&archive, &mut deployed).await {
            let compensated = self.compensate(&deployed, &snapshot).await;
            return Err(self.failed(e, compensated));
        }

        self.enter(RedeployStage::InvalidateCache);
        self.cache
            .remove(&self.key)
            .await
            .map_err(|e| self.failed(e, false))?;

        self.enter(RedeployStage::Reload);
        load_descriptors(
            self.resources,
            self.cache,
            self.process_definition_id(),
            self.scan_page_size,
        )
        .await
        .map_err(|e| self.failed(e, false))?;

        self.enter(RedeployStage::Completed);
        let descriptor = self
            .cache
            .get(&self.key)
            .await
            .map_err(|e| self.failed(e, false))?
            .unwrap_or_else(|| Arc::new(descriptor));

        info!(
            key = %self.key,
            implementation_id = %descriptor.implementation_id,
            implementation_version = %descriptor.implementation_version,
            replaced = snapshot.resource.is_some(),
            "Connector implementation replaced"
        );
        Ok(descriptor)
    }

    /// Snapshot what `DeployNew` is about to replace: the deployed `.impl`
    /// implementing the target connector with the jars it declares, and any
    /// process jar sharing a file name with a jar of the new archive.
    async fn snapshot(
        &self,
        archive: &ConnectorArchive,
    ) -> std::result::Result<Snapshot, StoreError> {
        let pd = self.process_definition_id();
        let mut snapshot = Snapshot::default();

        if let Some((resource, descriptor)) = self.find_current().await? {
            for file_name in &descriptor.jar_dependencies {
                match self
                    .dependencies
                    .get_dependency_of_artifact(pd, ScopeType::Process, file_name)
                    .await?
                {
                    Some(dependency) => snapshot.push_jar(dependency),
                    None => debug!(
                        process_definition_id = pd,
                        file_name = %file_name,
                        "Declared jar not deployed, nothing to remove"
                    ),
                }
            }
            snapshot.resource = Some(SnapshotResource {
                name: resource.name,
                content: resource.content,
            });
        }

        for file_name in archive.dependencies.keys() {
            if let Some(dependency) = self
                .dependencies
                .get_dependency_of_artifact(pd, ScopeType::Process, file_name)
                .await?
            {
                debug!(
                    process_definition_id = pd,
                    file_name = %file_name,
                    "Jar of the new archive replaces a deployed one"
                );
                snapshot.push_jar(dependency);
            }
        }

        Ok(snapshot)
    }

    /// Find the deployed `.impl` implementing the target connector.
    async fn find_current(
        &self,
    ) -> std::result::Result<Option<(BarResource, ConnectorImplementationDescriptor)>, StoreError>
    {
        let pd = self.process_definition_id();
        let resources =
            all_resources(self.resources, pd, BarResourceType::Connector, self.scan_page_size)
                .await?;

        for resource in resources {
            if !is_descriptor_file(&resource.name) {
                continue;
            }
            let descriptor = match ConnectorImplementationDescriptor::parse(&resource.content) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!(
                        process_definition_id = pd,
                        file_name = %resource.name,
                        error = %e,
                        "Skipping unreadable descriptor while looking for current implementation"
                    );
                    continue;
                }
            };
            if descriptor.implements(&self.key.connector_id, &self.key.version) {
                return Ok(Some((resource, descriptor)));
            }
        }

        Ok(None)
    }

    async fn delete(&self, snapshot: &Snapshot) -> std::result::Result<(), StoreError> {
        let pd = self.process_definition_id();
        if let Some(resource) = &snapshot.resource {
            self.resources
                .remove(pd, BarResourceType::Connector, &resource.name)
                .await?;
        }
        for jar in &snapshot.jars {
            self.dependencies.delete_dependency(jar.id).await?;
        }
        debug!(
            process_definition_id = pd,
            file_name = snapshot.resource.as_ref().map(|r| r.name.as_str()),
            jars = snapshot.jars.len(),
            "Previous implementation removed"
        );
        Ok(())
    }

    async fn deploy(
        &self,
        archive: &ConnectorArchive,
        deployed: &mut Deployed,
    ) -> std::result::Result<(), StoreError> {
        let pd = self.process_definition_id();
        for (file_name, content) in &archive.dependencies {
            let dependency = self
                .dependencies
                .create_mapped_dependency(
                    &process_dependency_name(pd, file_name),
                    content,
                    file_name,
                    pd,
                    ScopeType::Process,
                )
                .await?;
            deployed.dependency_ids.push(dependency.id);
        }

        self.resources
            .add(
                pd,
                BarResourceType::Connector,
                &archive.implementation_name,
                &archive.implementation_content,
            )
            .await?;
        deployed.resource_name = Some(archive.implementation_name.clone());
        Ok(())
    }

    /// Undo a partial deployment and put the snapshot back. Returns whether
    /// every step succeeded.
    async fn compensate(&self, deployed: &Deployed, snapshot: &Snapshot) -> bool {
        let pd = self.process_definition_id();
        info!(key = %self.key, stage = %self.stage, "Compensating failed redeploy");

        let mut all_succeeded = true;

        for id in deployed.dependency_ids.iter().rev() {
            if let Err(e) = self.dependencies.delete_dependency(*id).await {
                warn!(key = %self.key, dependency_id = id, error = %e, "Failed to remove new jar");
                all_succeeded = false;
            }
        }

        if let Some(name) = &deployed.resource_name {
            let replaced_in_place = snapshot.resource.as_ref().is_some_and(|r| &r.name == name);
            if !replaced_in_place
                && let Err(e) = self.resources.remove(pd, BarResourceType::Connector, name).await
            {
                warn!(key = %self.key, file_name = %name, error = %e, "Failed to remove new descriptor");
                all_succeeded = false;
            }
        }

        if let Some(resource) = &snapshot.resource
            && let Err(e) = self
                .resources
                .add(pd, BarResourceType::Connector, &resource.name, &resource.content)
                .await
        {
            warn!(key = %self.key, file_name = %resource.name, error = %e, "Failed to restore descriptor");
            all_succeeded = false;
        }

        for jar in &snapshot.jars {
            if let Err(e) = self.restore_jar(jar).await {
                warn!(key = %self.key, file_name = %jar.file_name, error = %e, "Failed to restore jar");
                all_succeeded = false;
            }
        }

        info!(key = %self.key, all_succeeded, "Compensation finished");
        all_succeeded
    }

    async fn restore_jar(&self, jar: &Dependency) -> std::result::Result<(), StoreError> {
        let present = self
            .dependencies
            .get_dependency_of_artifact(jar.scope_id, jar.scope_type, &jar.file_name)
            .await?;
        if present.is_none() {
            self.dependencies
                .create_mapped_dependency(
                    &jar.name,
                    &jar.content,
                    &jar.file_name,
                    jar.scope_id,
                    jar.scope_type,
                )
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_are_ordered() {
        let stages = [
            RedeployStage::Validate,
            RedeployStage::Extract,
            RedeployStage::DeleteOld,
            RedeployStage::DeployNew,
            RedeployStage::InvalidateCache,
            RedeployStage::Reload,
            RedeployStage::Completed,
        ];
        assert!(stages.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(RedeployStage::DeleteOld.to_string(), "delete_old");
        assert_eq!(RedeployStage::InvalidateCache.to_string(), "invalidate_cache");
    }
}
