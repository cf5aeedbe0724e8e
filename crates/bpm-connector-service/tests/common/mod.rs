// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for bpm-connector-service integration tests.
//!
//! Provides archive builders, in-memory service setups and store wrappers
//! that count or fail calls.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use bpm_connector_service::store::{
    BarResource, BarResourceType, Dependency, DependencyStore, InMemoryDependencyStore,
    InMemoryResourceStore, ResourceStore, ScopeType, StoreError,
};
use bpm_connector_service::{ConnectorService, ServiceConfig};

/// `.impl` document for a connector implementation.
pub fn impl_xml(connector_id: &str, version: &str, class_name: &str, jars: &[&str]) -> String {
    let jar_elements: String = jars
        .iter()
        .map(|jar| format!("    <jarDependency>{jar}</jarDependency>\n"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<implementation:connectorImplementation xmlns:implementation="http://www.bonitasoft.org/ns/connector/implementation/6.0">
  <implementationId>{connector_id}-impl</implementationId>
  <implementationVersion>{version}</implementationVersion>
  <definitionId>{connector_id}</definitionId>
  <definitionVersion>{version}</definitionVersion>
  <implementationClassname>{class_name}</implementationClassname>
  <jarDependencies>
{jar_elements}  </jarDependencies>
</implementation:connectorImplementation>"#
    )
}

/// Zip bytes holding the given entries.
pub fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(content).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Content used for a jar in test archives.
pub fn jar_content(file_name: &str, generation: u32) -> Vec<u8> {
    format!("jar:{file_name}:{generation}").into_bytes()
}

/// Archive with one `.impl` named `<connector_id>.impl` and the jars it
/// declares.
pub fn connector_archive(
    connector_id: &str,
    version: &str,
    class_name: &str,
    jars: &[&str],
    generation: u32,
) -> Vec<u8> {
    let xml = impl_xml(connector_id, version, class_name, jars);
    let impl_name = format!("{connector_id}.impl");
    let jar_contents: Vec<(String, Vec<u8>)> = jars
        .iter()
        .map(|jar| (format!("lib/{jar}"), jar_content(jar, generation)))
        .collect();

    let mut entries: Vec<(&str, &[u8])> = vec![(impl_name.as_str(), xml.as_bytes())];
    entries.extend(
        jar_contents
            .iter()
            .map(|(name, content)| (name.as_str(), content.as_slice())),
    );
    zip_of(&entries)
}

/// Service over in-memory stores, with handles to the stores.
pub struct TestContext {
    pub service: ConnectorService,
    pub resources: Arc<CountingResourceStore>,
    pub dependencies: Arc<FailingDependencyStore>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let resources = Arc::new(CountingResourceStore::default());
        let dependencies = Arc::new(FailingDependencyStore::default());
        let service = ConnectorService::builder()
            .resources(resources.clone())
            .dependencies(dependencies.clone())
            .config(config)
            .build()
            .expect("service should build");
        Self {
            service,
            resources,
            dependencies,
        }
    }

    /// Deploy a `.impl` straight into the resource store.
    pub async fn seed_descriptor(&self, process_definition_id: i64, name: &str, xml: &str) {
        self.resources
            .add(
                process_definition_id,
                BarResourceType::Connector,
                name,
                xml.as_bytes(),
            )
            .await
            .expect("seed descriptor");
    }

    /// Deploy a jar straight into the dependency store.
    pub async fn seed_jar(&self, process_definition_id: i64, file_name: &str, content: &[u8]) {
        self.dependencies
            .create_mapped_dependency(
                &format!("{process_definition_id}_{file_name}"),
                content,
                file_name,
                process_definition_id,
                ScopeType::Process,
            )
            .await
            .expect("seed jar");
    }

    /// Jar file names mapped to a process, sorted.
    pub async fn jar_names(&self, process_definition_id: i64) -> Vec<String> {
        self.dependencies
            .list_dependencies(process_definition_id, ScopeType::Process)
            .await
            .expect("list jars")
            .into_iter()
            .map(|d| d.file_name)
            .collect()
    }

    /// Connector resource names of a process, sorted.
    pub async fn resource_names(&self, process_definition_id: i64) -> Vec<String> {
        self.resources
            .list(process_definition_id, BarResourceType::Connector, 0, usize::MAX)
            .await
            .expect("list resources")
            .into_iter()
            .map(|r| r.name)
            .collect()
    }
}

/// Resource store counting `list` calls.
#[derive(Default)]
pub struct CountingResourceStore {
    inner: InMemoryResourceStore,
    list_calls: AtomicUsize,
}

impl CountingResourceStore {
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceStore for CountingResourceStore {
    async fn add(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        name: &str,
        content: &[u8],
    ) -> Result<(), StoreError> {
        self.inner
            .add(process_definition_id, resource_type, name, content)
            .await
    }

    async fn get(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        name: &str,
    ) -> Result<Option<BarResource>, StoreError> {
        self.inner.get(process_definition_id, resource_type, name).await
    }

    async fn list(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        from: usize,
        count: usize,
    ) -> Result<Vec<BarResource>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .list(process_definition_id, resource_type, from, count)
            .await
    }

    async fn count(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
    ) -> Result<usize, StoreError> {
        self.inner.count(process_definition_id, resource_type).await
    }

    async fn remove(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
        name: &str,
    ) -> Result<bool, StoreError> {
        self.inner
            .remove(process_definition_id, resource_type, name)
            .await
    }

    async fn remove_all(
        &self,
        process_definition_id: i64,
        resource_type: BarResourceType,
    ) -> Result<usize, StoreError> {
        self.inner
            .remove_all(process_definition_id, resource_type)
            .await
    }
}

/// Dependency store that can be told to reject writing one artifact or
/// deleting one dependency.
#[derive(Default)]
pub struct FailingDependencyStore {
    inner: InMemoryDependencyStore,
    fail_on: std::sync::Mutex<Option<String>>,
    fail_delete_on: std::sync::Mutex<Option<i64>>,
}

impl FailingDependencyStore {
    /// Make `create_mapped_dependency` fail for this file name.
    pub fn fail_on(&self, file_name: &str) {
        *self.fail_on.lock().unwrap() = Some(file_name.to_string());
    }

    /// Make `delete_dependency` fail for this dependency id.
    pub fn fail_delete_on(&self, dependency_id: i64) {
        *self.fail_delete_on.lock().unwrap() = Some(dependency_id);
    }

    pub fn clear_failure(&self) {
        *self.fail_on.lock().unwrap() = None;
        *self.fail_delete_on.lock().unwrap() = None;
    }
}

#[async_trait]
impl DependencyStore for FailingDependencyStore {
    async fn create_mapped_dependency(
        &self,
        name: &str,
        content: &[u8],
        file_name: &str,
        scope_id: i64,
        scope_type: ScopeType,
    ) -> Result<Dependency, StoreError> {
        let should_fail = self.fail_on.lock().unwrap().as_deref() == Some(file_name);
        if should_fail {
            return Err(StoreError::Io(std::io::Error::other(format!(
                "disk full while writing {file_name}"
            ))));
        }
        self.inner
            .create_mapped_dependency(name, content, file_name, scope_id, scope_type)
            .await
    }

    async fn get_dependency_of_artifact(
        &self,
        scope_id: i64,
        scope_type: ScopeType,
        file_name: &str,
    ) -> Result<Option<Dependency>, StoreError> {
        self.inner
            .get_dependency_of_artifact(scope_id, scope_type, file_name)
            .await
    }

    async fn list_dependencies(
        &self,
        scope_id: i64,
        scope_type: ScopeType,
    ) -> Result<Vec<Dependency>, StoreError> {
        self.inner.list_dependencies(scope_id, scope_type).await
    }

    async fn delete_dependency(&self, id: i64) -> Result<bool, StoreError> {
        let should_fail = *self.fail_delete_on.lock().unwrap() == Some(id);
        if should_fail {
            return Err(StoreError::Io(std::io::Error::other(format!(
                "device busy while deleting dependency {id}"
            ))));
        }
        self.inner.delete_dependency(id).await
    }
}
