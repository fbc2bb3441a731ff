//! Export pipeline - turns one remote document into local artifacts
//!
//! Every exportable document yields two artifacts, one in its native Office
//! format and one PDF. Each artifact has its own staleness check and its own
//! failure isolation, and they are processed one after the other.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::SyncOptions;
use crate::drive::{DriveApi, ExportFormat, NodeKind, RemoteNode};
use crate::local::{self, DirectoryOutcome};

/// Outcome of one artifact (or of a document that cannot be exported)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportResult {
    /// Fetched and written, timestamps reconciled
    Exported { path: PathBuf, bytes: usize },
    /// Local copy is within tolerance of the remote modification time
    UpToDate { path: PathBuf },
    /// Would be exported, but this is a dry run
    Planned { path: PathBuf },
    /// The document kind has no export mapping
    Unsupported { name: String, mime_type: String },
    /// Fetch, write or timestamp update failed
    Failed { path: PathBuf, error: String },
}

/// Exports documents through a [`DriveApi`]
#[derive(Clone)]
pub struct ExportPipeline {
    drive: Arc<dyn DriveApi>,
    options: SyncOptions,
}

impl ExportPipeline {
    pub fn new(drive: Arc<dyn DriveApi>, options: SyncOptions) -> Self {
        Self { drive, options }
    }

    /// Produce the native and PDF artifacts of `node` inside `dir`
    pub async fn export_document(&self, node: &RemoteNode, dir: &Path) -> Vec<ExportResult> {
        if let DirectoryOutcome::Failed { error } =
            local::materialize_directory(dir, self.options.dry_run).await
        {
            debug!("Continuing in '{}' despite: {}", dir.display(), error);
        }

        let native = match node.kind() {
            NodeKind::Document(kind) => kind.native_format(),
            _ => {
                error!("Unsupported mimeType: {} ('{}')", node.mime_type, node.name);
                return vec![ExportResult::Unsupported {
                    name: node.name.clone(),
                    mime_type: node.mime_type.clone(),
                }];
            }
        };

        let mut results = Vec::with_capacity(2);
        for format in [native, ExportFormat::PDF] {
            results.push(self.export_artifact(node, dir, format).await);
        }
        results
    }

    async fn export_artifact(
        &self,
        node: &RemoteNode,
        dir: &Path,
        format: ExportFormat,
    ) -> ExportResult {
        let path = local::artifact_path(dir, &node.name, &node.id, format.extension);

        match local::modified_time(&path).await {
            Ok(Some(local_time))
                if self.options.tolerance.is_current(node.modified_time, local_time) =>
            {
                info!(
                    "Skipping '{}'. Last updated {}",
                    path.display(),
                    local_time.to_rfc3339()
                );
                return ExportResult::UpToDate { path };
            }
            Ok(_) => {}
            Err(e) => warn!("Re-exporting '{}': {:#}", path.display(), e),
        }

        if self.options.dry_run {
            info!("Would export '{}'", path.display());
            return ExportResult::Planned { path };
        }

        match self.fetch_and_write(node, &path, format).await {
            Ok(bytes) => {
                info!("Exported '{}'", path.display());
                ExportResult::Exported { path, bytes }
            }
            Err(e) => {
                error!("Error exporting file '{}': {:#}", path.display(), e);
                ExportResult::Failed {
                    path,
                    error: format!("{:#}", e),
                }
            }
        }
    }

    async fn fetch_and_write(
        &self,
        node: &RemoteNode,
        path: &Path,
        format: ExportFormat,
    ) -> Result<usize> {
        let data = self
            .drive
            .export(&node.id, format.mime_type)
            .await
            .with_context(|| format!("Export of '{}' as {} failed", node.name, format.extension))?;

        local::write_artifact(path, &data).await?;
        local::reconcile_times(path, node.created_time, node.modified_time)?;

        Ok(data.len())
    }
}
