// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Connector implementation archives.
//!
//! An implementation is uploaded as a zip holding one `.impl` descriptor and
//! any number of `.jar` dependencies. Directory prefixes inside the zip are
//! irrelevant: `lib/driver.jar` is stored as `driver.jar`.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use thiserror::Error;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::descriptor::{ConnectorImplementationDescriptor, is_descriptor_file};
use crate::error::{Error, Result};

/// File extension of dependency archives.
pub const JAR_EXTENSION: &str = ".jar";

/// Reasons an uploaded archive is not a usable implementation.
#[derive(Debug, Error)]
pub enum InvalidImplementation {
    /// No bytes, or a zip without entries.
    #[error("archive is empty")]
    EmptyArchive,

    /// Bytes are not a zip archive.
    #[error("not a zip archive: {0}")]
    NotAnArchive(String),

    /// No `.impl` entry in the archive.
    #[error("archive contains no .impl descriptor")]
    MissingDescriptor,

    /// More than one `.impl` entry in the archive.
    #[error("archive contains more than one .impl descriptor: {}", .0.join(", "))]
    MultipleDescriptors(Vec<String>),

    /// The descriptor implements another connector definition.
    #[error(
        "descriptor implements connector {}-{} but {expected_id}-{expected_version} was expected",
        .descriptor.definition_id,
        .descriptor.definition_version
    )]
    Mismatch {
        /// Connector id the caller asked for.
        expected_id: String,
        /// Connector version the caller asked for.
        expected_version: String,
        /// The descriptor found in the archive.
        descriptor: Box<ConnectorImplementationDescriptor>,
    },
}

/// Parsed content of an uploaded implementation archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorArchive {
    /// Dependency jars keyed by file name.
    pub dependencies: BTreeMap<String, Vec<u8>>,
    /// File name of the `.impl` descriptor.
    pub implementation_name: String,
    /// Raw content of the `.impl` descriptor.
    pub implementation_content: Vec<u8>,
}

impl ConnectorArchive {
    /// Create an archive holding only a descriptor.
    pub fn new(implementation_name: impl Into<String>, implementation_content: Vec<u8>) -> Self {
        Self {
            dependencies: BTreeMap::new(),
            implementation_name: implementation_name.into(),
            implementation_content,
        }
    }

    /// Add a dependency jar, replacing any with the same file name.
    pub fn add_dependency(&mut self, file_name: impl Into<String>, content: Vec<u8>) {
        self.dependencies.insert(file_name.into(), content);
    }

    /// Extract descriptor and dependencies from zip bytes.
    ///
    /// Entries that are neither `.impl` nor `.jar` are skipped.
    pub fn extract(bytes: &[u8]) -> Result<Self> {
        let mut zip = open_archive(bytes)?;

        let mut dependencies = BTreeMap::new();
        let mut implementation: Option<(String, Vec<u8>)> = None;

        for index in 0..zip.len() {
            let mut entry = zip.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let file_name = entry_file_name(entry.name()).to_string();

            if file_name.ends_with(JAR_EXTENSION) {
                let mut content = Vec::new();
                entry.read_to_end(&mut content)?;
                if dependencies.insert(file_name.clone(), content).is_some() {
                    warn!(file_name = %file_name, "Duplicate dependency in archive, keeping the last one");
                }
            } else if is_descriptor_file(&file_name) {
                if let Some((first, _)) = &implementation {
                    return Err(InvalidImplementation::MultipleDescriptors(vec![
                        first.clone(),
                        file_name,
                    ])
                    .into());
                }
                let mut content = Vec::new();
                entry.read_to_end(&mut content)?;
                implementation = Some((file_name, content));
            } else {
                debug!(entry = %entry.name(), "Skipping archive entry");
            }
        }

        let (implementation_name, implementation_content) =
            implementation.ok_or(InvalidImplementation::MissingDescriptor)?;

        Ok(Self {
            dependencies,
            implementation_name,
            implementation_content,
        })
    }

    /// Parse the descriptor held by this archive.
    pub fn descriptor(&self) -> Result<ConnectorImplementationDescriptor> {
        ConnectorImplementationDescriptor::parse(&self.implementation_content).map_err(|source| {
            Error::Descriptor {
                file_name: self.implementation_name.clone(),
                source,
            }
        })
    }

    /// Build a zip holding the descriptor and every dependency at the root.
    pub fn to_zip_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buffer);
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

            zip.start_file(self.implementation_name.as_str(), options)?;
            zip.write_all(&self.implementation_content)?;

            for (file_name, content) in &self.dependencies {
                zip.start_file(file_name.as_str(), options)?;
                zip.write_all(content)?;
            }

            zip.finish()?;
        }
        Ok(buffer.into_inner())
    }
}

/// Check that zip bytes hold exactly one descriptor implementing
/// `connector_id`/`connector_version`, and return it.
///
/// Nothing is persisted; this runs before any change is made.
pub fn check_implementation_is_valid(
    bytes: &[u8],
    connector_id: &str,
    connector_version: &str,
) -> Result<ConnectorImplementationDescriptor> {
    let mut zip = open_archive(bytes)?;

    let mut descriptor_indexes: Vec<(usize, String)> = Vec::new();
    for index in 0..zip.len() {
        let entry = zip.by_index(index)?;
        let name = entry_file_name(entry.name());
        if !entry.is_dir() && is_descriptor_file(name) {
            descriptor_indexes.push((index, name.to_string()));
        }
    }

    let (index, file_name) = match descriptor_indexes.as_slice() {
        [] => return Err(InvalidImplementation::MissingDescriptor.into()),
        [single] => single.clone(),
        many => {
            return Err(InvalidImplementation::MultipleDescriptors(
                many.iter().map(|(_, name)| name.clone()).collect(),
            )
            .into());
        }
    };

    let mut content = Vec::new();
    zip.by_index(index)?.read_to_end(&mut content)?;
    let descriptor = ConnectorImplementationDescriptor::parse(&content)
        .map_err(|source| Error::Descriptor { file_name, source })?;

    if !descriptor.implements(connector_id, connector_version) {
        return Err(InvalidImplementation::Mismatch {
            expected_id: connector_id.to_string(),
            expected_version: connector_version.to_string(),
            descriptor: Box::new(descriptor),
        }
        .into());
    }

    Ok(descriptor)
}

/// Name of an entry with any directory prefix removed.
pub fn entry_file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn open_archive(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>> {
    if bytes.is_empty() {
        return Err(InvalidImplementation::EmptyArchive.into());
    }
    let zip = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| InvalidImplementation::NotAnArchive(e.to_string()))?;
    if zip.len() == 0 {
        return Err(InvalidImplementation::EmptyArchive.into());
    }
    Ok(zip)
}
