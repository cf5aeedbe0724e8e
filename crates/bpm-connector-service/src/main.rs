// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! BPM Connectors - connector implementation administration
//!
//! Operates on the configured SQLite store:
//! - Deploy (replace) the implementation of a connector from a zip archive
//! - List the implementations deployed for a process definition
//! - Export a deployed implementation back to a zip archive
//! - Validate an archive without deploying it

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use bpm_connector_service::archive::check_implementation_is_valid;
use bpm_connector_service::config::Config;
use bpm_connector_service::service::{ImplementationSortField, SortOrder};
use bpm_connector_service::store::SqliteStore;
use bpm_connector_service::{ConnectorImplementationDescriptor, ConnectorService};

#[derive(Parser, Debug)]
#[command(name = "bpm-connectors", version, about, long_about = None)]
struct Cli {
    /// SQLite database file (overrides BPM_CONNECTORS_DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace the implementation of a connector with the one in an archive
    Deploy {
        /// Process definition the connector belongs to
        #[arg(long)]
        process_definition_id: i64,
        /// Connector definition id
        #[arg(long)]
        connector_id: String,
        /// Connector definition version
        #[arg(long)]
        connector_version: String,
        /// Zip archive holding one .impl and its jars
        archive: PathBuf,
    },

    /// List the implementations deployed for a process definition
    List {
        /// Process definition to list
        process_definition_id: i64,
        /// Index of the first implementation
        #[arg(long, default_value_t = 0)]
        from: usize,
        /// Maximum number of implementations
        #[arg(long, default_value_t = 100)]
        count: usize,
        /// Field to sort by
        #[arg(long, value_enum, default_value_t = SortField::DefinitionId)]
        sort: SortField,
        /// Sort largest first
        #[arg(long)]
        desc: bool,
    },

    /// Write the deployed implementation of a connector to a zip archive
    Export {
        /// Process definition the connector belongs to
        #[arg(long)]
        process_definition_id: i64,
        /// Connector definition id
        #[arg(long)]
        connector_id: String,
        /// Connector definition version
        #[arg(long)]
        connector_version: String,
        /// Destination file
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Check that an archive implements a connector, without deploying it
    Validate {
        /// Connector definition id
        #[arg(long)]
        connector_id: String,
        /// Connector definition version
        #[arg(long)]
        connector_version: String,
        /// Zip archive to check
        archive: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SortField {
    DefinitionId,
    DefinitionVersion,
    ImplementationId,
    ImplementationVersion,
    ClassName,
}

impl From<SortField> for ImplementationSortField {
    fn from(field: SortField) -> Self {
        match field {
            SortField::DefinitionId => ImplementationSortField::DefinitionId,
            SortField::DefinitionVersion => ImplementationSortField::DefinitionVersion,
            SortField::ImplementationId => ImplementationSortField::ImplementationId,
            SortField::ImplementationVersion => ImplementationSortField::ImplementationVersion,
            SortField::ClassName => ImplementationSortField::ClassName,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bpm_connector_service=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();

    // Validation needs no store
    if let Command::Validate {
        connector_id,
        connector_version,
        archive,
    } = &cli.command
    {
        let bytes = std::fs::read(archive)?;
        let descriptor = check_implementation_is_valid(&bytes, connector_id, connector_version)?;
        print_json(&descriptor)?;
        return Ok(());
    }

    let mut config = Config::from_env()?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    info!(
        database = %config.database_path.display(),
        cache_name = %config.service.cache_name,
        "Opening connector store"
    );
    let store = Arc::new(SqliteStore::from_path(&config.database_path).await?);
    let service = ConnectorService::builder()
        .store(store)
        .config(config.service)
        .build()?;

    match cli.command {
        Command::Deploy {
            process_definition_id,
            connector_id,
            connector_version,
            archive,
        } => {
            let bytes = std::fs::read(&archive)?;
            let descriptor = service
                .set_connector_implementation(
                    process_definition_id,
                    &connector_id,
                    &connector_version,
                    &bytes,
                )
                .await?;
            print_json(descriptor.as_ref())?;
        }
        Command::List {
            process_definition_id,
            from,
            count,
            sort,
            desc,
        } => {
            let order = if desc {
                SortOrder::Descending
            } else {
                SortOrder::Ascending
            };
            let descriptors = service
                .list_implementations(process_definition_id, from, count, sort.into(), order)
                .await?;
            let descriptors: Vec<&ConnectorImplementationDescriptor> =
                descriptors.iter().map(|d| d.as_ref()).collect();
            print_json(&descriptors)?;
        }
        Command::Export {
            process_definition_id,
            connector_id,
            connector_version,
            output,
        } => {
            let bytes = service
                .export_implementation(process_definition_id, &connector_id, &connector_version)
                .await?;
            std::fs::write(&output, &bytes)?;
            info!(output = %output.display(), size = bytes.len(), "Implementation exported");
        }
        Command::Validate { .. } => {}
    }

    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
