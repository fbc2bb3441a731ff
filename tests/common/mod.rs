//! Common test utilities and helpers for gdrive-export tests
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use gdrive_export::drive::{
    DriveApi, RemoteNode, DOCUMENT_MIME_TYPE, FOLDER_MIME_TYPE, PRESENTATION_MIME_TYPE,
    SPREADSHEET_MIME_TYPE,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub fn jan_first_2024() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Builder for remote nodes with fixed timestamps
pub struct NodeBuilder;

impl NodeBuilder {
    pub fn with_mime(id: &str, name: &str, mime_type: &str) -> RemoteNode {
        RemoteNode {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            created_time: jan_first_2024(),
            modified_time: jan_first_2024(),
        }
    }

    pub fn folder(id: &str, name: &str) -> RemoteNode {
        Self::with_mime(id, name, FOLDER_MIME_TYPE)
    }

    pub fn doc(id: &str, name: &str) -> RemoteNode {
        Self::with_mime(id, name, DOCUMENT_MIME_TYPE)
    }

    pub fn sheet(id: &str, name: &str) -> RemoteNode {
        Self::with_mime(id, name, SPREADSHEET_MIME_TYPE)
    }

    pub fn slides(id: &str, name: &str) -> RemoteNode {
        Self::with_mime(id, name, PRESENTATION_MIME_TYPE)
    }
}

/// In-memory Drive tree that records every call made against it
#[derive(Default)]
pub struct FakeDrive {
    children: Mutex<HashMap<String, Vec<RemoteNode>>>,
    broken_folders: HashSet<String>,
    broken_exports: HashSet<(String, String)>,
    exports: Mutex<Vec<(String, String)>>,
    listings: Mutex<Vec<String>>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_children(self, folder_id: &str, nodes: Vec<RemoteNode>) -> Self {
        self.children
            .lock()
            .unwrap()
            .insert(folder_id.to_string(), nodes);
        self
    }

    pub fn with_broken_folder(mut self, folder_id: &str) -> Self {
        self.broken_folders.insert(folder_id.to_string());
        self
    }

    pub fn with_broken_export(mut self, file_id: &str, mime_type: &str) -> Self {
        self.broken_exports
            .insert((file_id.to_string(), mime_type.to_string()));
        self
    }

    /// Replace a node everywhere it appears, e.g. to simulate a remote edit
    pub fn update_node(&self, node: RemoteNode) {
        for nodes in self.children.lock().unwrap().values_mut() {
            for existing in nodes.iter_mut().filter(|n| n.id == node.id) {
                *existing = node.clone();
            }
        }
    }

    pub fn export_calls(&self) -> Vec<(String, String)> {
        self.exports.lock().unwrap().clone()
    }

    pub fn listing_calls(&self) -> Vec<String> {
        self.listings.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        self.exports.lock().unwrap().clear();
        self.listings.lock().unwrap().clear();
    }
}

#[async_trait]
impl DriveApi for FakeDrive {
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteNode>> {
        self.listings.lock().unwrap().push(folder_id.to_string());

        if self.broken_folders.contains(folder_id) {
            return Err(anyhow!("Drive API returned 500: backendError"));
        }

        Ok(self
            .children
            .lock()
            .unwrap()
            .get(folder_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>> {
        self.exports
            .lock()
            .unwrap()
            .push((file_id.to_string(), mime_type.to_string()));

        if self
            .broken_exports
            .contains(&(file_id.to_string(), mime_type.to_string()))
        {
            return Err(anyhow!("Drive API returned 403: exportSizeLimitExceeded"));
        }

        Ok(format!("{}:{}", file_id, mime_type).into_bytes())
    }
}
