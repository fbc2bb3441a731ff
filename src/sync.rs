//! Sync Engine - Mirrors a remote folder tree into a local directory
//!
//! The walk is depth-first and strictly sequential: one listing or export
//! request is in flight at a time, and two writes never target the same
//! path concurrently. Failures are logged and recorded in the summary; they
//! never abort the rest of the traversal.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::SyncOptions;
use crate::drive::{DriveApi, NodeKind};
use crate::export::{ExportPipeline, ExportResult};
use crate::local::{self, DirectoryOutcome};

/// A failed unit of work and what went wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub path: PathBuf,
    pub error: String,
}

/// Results from a complete sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub folders_visited: usize,
    pub directories_created: usize,
    pub exported: usize,
    pub up_to_date: usize,
    pub planned: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub duration: Duration,
    pub failures: Vec<Failure>,
}

impl SyncSummary {
    fn record_export(&mut self, result: ExportResult) {
        match result {
            ExportResult::Exported { .. } => self.exported += 1,
            ExportResult::UpToDate { .. } => self.up_to_date += 1,
            ExportResult::Planned { .. } => self.planned += 1,
            ExportResult::Unsupported { .. } => self.unsupported += 1,
            ExportResult::Failed { path, error } => self.record_failure(path, error),
        }
    }

    fn record_directory(&mut self, path: &Path, outcome: DirectoryOutcome) {
        match outcome {
            DirectoryOutcome::Created => self.directories_created += 1,
            DirectoryOutcome::Failed { error } => self.record_failure(path.to_path_buf(), error),
            DirectoryOutcome::Existing | DirectoryOutcome::Planned => {}
        }
    }

    fn record_failure(&mut self, path: PathBuf, error: String) {
        self.failed += 1;
        self.failures.push(Failure { path, error });
    }
}

/// Walks a remote folder tree and exports every supported document
#[derive(Clone)]
pub struct SyncEngine {
    drive: Arc<dyn DriveApi>,
    pipeline: ExportPipeline,
    options: SyncOptions,
}

impl SyncEngine {
    /// Create a new sync engine over the given Drive API
    pub fn new(drive: Arc<dyn DriveApi>, options: SyncOptions) -> Self {
        let pipeline = ExportPipeline::new(drive.clone(), options);
        Self {
            drive,
            pipeline,
            options,
        }
    }

    /// Mirror the subtree of `folder_id` into `root`
    pub async fn run(&self, folder_id: &str, root: &Path) -> Result<SyncSummary> {
        let start_time = Instant::now();

        let mut summary = SyncSummary::default();

        if !self.options.dry_run {
            if let Err(e) = tokio::fs::create_dir_all(root).await {
                error!("Failed to create output directory '{}': {}", root.display(), e);
                summary.record_failure(root.to_path_buf(), e.to_string());
            }
        }

        info!(
            "Starting export of folder {} to '{}' (tolerance {}s)",
            folder_id,
            root.display(),
            self.options.tolerance.as_secs()
        );

        self.walk(folder_id, root, &mut summary).await;
        summary.duration = start_time.elapsed();

        info!(
            "Export completed in {:.2}s: {} folders, {} exported, {} up to date, {} failed",
            summary.duration.as_secs_f64(),
            summary.folders_visited,
            summary.exported,
            summary.up_to_date,
            summary.failed
        );
        if self.options.dry_run {
            info!("Dry run: {} artifacts would be exported", summary.planned);
        }

        Ok(summary)
    }

    /// Depth-first traversal with an explicit stack of (folder id, local path)
    async fn walk(&self, folder_id: &str, root: &Path, summary: &mut SyncSummary) {
        let mut pending = vec![(folder_id.to_string(), root.to_path_buf())];

        while let Some((folder_id, dir)) = pending.pop() {
            summary.folders_visited += 1;

            let children = match self.drive.list_children(&folder_id).await {
                Ok(children) => children,
                Err(e) => {
                    error!("Error listing files in '{}' ({}): {:#}", dir.display(), folder_id, e);
                    summary.record_failure(dir, format!("{:#}", e));
                    continue;
                }
            };

            // Subfolders are descended into after every document of this folder
            let mut subfolders = Vec::new();

            for child in children {
                match child.kind() {
                    NodeKind::Folder => {
                        info!("Processing '{}' ({})", child.name, child.mime_type);
                        let child_dir = local::folder_path(&dir, &child.name, &child.id);
                        let outcome =
                            local::materialize_directory(&child_dir, self.options.dry_run).await;
                        summary.record_directory(&child_dir, outcome);
                        subfolders.push((child.id, child_dir));
                    }
                    NodeKind::Document(_) => {
                        info!("Processing '{}' ({})", child.name, child.mime_type);
                        for result in self.pipeline.export_document(&child, &dir).await {
                            summary.record_export(result);
                        }
                    }
                    NodeKind::Other if child.is_unsupported_native() => {
                        debug!("Ignoring '{}': no export for {}", child.name, child.mime_type);
                        summary.unsupported += 1;
                    }
                    NodeKind::Other => {}
                }
            }

            // Reversed so the first listed subfolder is walked next
            pending.extend(subfolders.into_iter().rev());
        }
    }
}
