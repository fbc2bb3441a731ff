//! Drive data model and API access
//!
//! [`DriveApi`] is the seam between the mirror logic and Google Drive: it
//! lists the children of a folder and exports a document to a byte format.
//! [`DriveClient`] implements it over the Drive v3 REST API.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::auth::Authenticator;
use crate::config::Config;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const DOCUMENT_MIME_TYPE: &str = "application/vnd.google-apps.document";
pub const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";
pub const PRESENTATION_MIME_TYPE: &str = "application/vnd.google-apps.presentation";

/// Prefix shared by every Google-native item type
pub const GOOGLE_APPS_PREFIX: &str = "application/vnd.google-apps.";

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, createdTime, modifiedTime)";

/// A child item as returned by a folder listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteNode {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub created_time: DateTime<Utc>,
    pub modified_time: DateTime<Utc>,
}

/// Editable document types that can be converted to a downloadable format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Spreadsheet,
    Presentation,
}

/// What the mirror does with a listed item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    Document(DocumentKind),
    /// Anything else: uploaded files, shortcuts, forms, drawings, ...
    Other,
}

/// A conversion target: export MIME type plus local file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

impl ExportFormat {
    pub const DOCX: ExportFormat = ExportFormat {
        mime_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        extension: "docx",
    };
    pub const XLSX: ExportFormat = ExportFormat {
        mime_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        extension: "xlsx",
    };
    pub const PPTX: ExportFormat = ExportFormat {
        mime_type: "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        extension: "pptx",
    };
    pub const PDF: ExportFormat = ExportFormat {
        mime_type: "application/pdf",
        extension: "pdf",
    };
}

impl DocumentKind {
    /// Office-compatible format for this kind of document
    pub fn native_format(&self) -> ExportFormat {
        match self {
            DocumentKind::Text => ExportFormat::DOCX,
            DocumentKind::Spreadsheet => ExportFormat::XLSX,
            DocumentKind::Presentation => ExportFormat::PPTX,
        }
    }
}

impl NodeKind {
    pub fn from_mime_type(mime_type: &str) -> Self {
        match mime_type {
            FOLDER_MIME_TYPE => NodeKind::Folder,
            DOCUMENT_MIME_TYPE => NodeKind::Document(DocumentKind::Text),
            SPREADSHEET_MIME_TYPE => NodeKind::Document(DocumentKind::Spreadsheet),
            PRESENTATION_MIME_TYPE => NodeKind::Document(DocumentKind::Presentation),
            _ => NodeKind::Other,
        }
    }
}

impl RemoteNode {
    pub fn kind(&self) -> NodeKind {
        NodeKind::from_mime_type(&self.mime_type)
    }

    /// Google-native item (form, drawing, site, ...) with no export mapping
    pub fn is_unsupported_native(&self) -> bool {
        self.kind() == NodeKind::Other && self.mime_type.starts_with(GOOGLE_APPS_PREFIX)
    }
}

/// Remote operations the mirror consumes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// List the non-trashed children of a folder
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteNode>>;

    /// Export a document converted to `mime_type`
    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<RemoteNode>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Drive v3 REST client
pub struct DriveClient {
    http: reqwest::Client,
    auth: Arc<Authenticator>,
    base_url: String,
    page_size: u32,
}

impl DriveClient {
    /// Create a client with credentials detected from the configuration
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.drive.timeout))
            .user_agent(concat!("gdrive-export/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        let auth = Authenticator::from_config(config, http.clone())?;

        Ok(Self::with_authenticator(config, http, Arc::new(auth)))
    }

    /// Create a client around an existing authenticator
    pub fn with_authenticator(
        config: &Config,
        http: reqwest::Client,
        auth: Arc<Authenticator>,
    ) -> Self {
        Self {
            http,
            auth,
            base_url: config.drive.api_base_url.trim_end_matches('/').to_string(),
            page_size: config.drive.page_size,
        }
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.base_url)
    }

    /// Turn a non-2xx response into an error carrying the API's message
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|parsed| parsed.error.message)
            .unwrap_or_else(|_| body.trim().to_string());

        Err(anyhow!("Drive API returned {}: {}", status, message))
    }
}

/// Listing query for the direct, non-trashed children of a folder
pub fn children_query(folder_id: &str) -> String {
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}' in parents and trashed = false", escaped)
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteNode>> {
        let query = children_query(folder_id);
        let page_size = self.page_size.to_string();
        let mut children = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.auth.access_token().await?;

            let mut request = self
                .http
                .get(self.files_url())
                .bearer_auth(token)
                .query(&[
                    ("q", query.as_str()),
                    ("fields", LIST_FIELDS),
                    ("pageSize", page_size.as_str()),
                    ("supportsAllDrives", "true"),
                    ("includeItemsFromAllDrives", "true"),
                ]);
            if let Some(page_token) = &page_token {
                request = request.query(&[("pageToken", page_token.as_str())]);
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("Failed to list folder {}", folder_id))?;

            let page: FileList = Self::check_status(response)
                .await?
                .json()
                .await
                .with_context(|| format!("Failed to parse listing of folder {}", folder_id))?;

            children.extend(page.files);

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        debug!("Folder {} has {} children", folder_id, children.len());
        Ok(children)
    }

    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>> {
        let token = self.auth.access_token().await?;

        let response = self
            .http
            .get(format!("{}/{}/export", self.files_url(), file_id))
            .bearer_auth(token)
            .query(&[("mimeType", mime_type)])
            .send()
            .await
            .with_context(|| format!("Failed to export {} as {}", file_id, mime_type))?;

        let bytes = Self::check_status(response)
            .await?
            .bytes()
            .await
            .with_context(|| format!("Failed to download export of {}", file_id))?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_mime_type() {
        assert_eq!(NodeKind::from_mime_type(FOLDER_MIME_TYPE), NodeKind::Folder);
        assert_eq!(
            NodeKind::from_mime_type(DOCUMENT_MIME_TYPE),
            NodeKind::Document(DocumentKind::Text)
        );
        assert_eq!(
            NodeKind::from_mime_type(SPREADSHEET_MIME_TYPE),
            NodeKind::Document(DocumentKind::Spreadsheet)
        );
        assert_eq!(
            NodeKind::from_mime_type(PRESENTATION_MIME_TYPE),
            NodeKind::Document(DocumentKind::Presentation)
        );
        assert_eq!(NodeKind::from_mime_type("application/pdf"), NodeKind::Other);
        assert_eq!(
            NodeKind::from_mime_type("application/vnd.google-apps.form"),
            NodeKind::Other
        );
    }

    #[test]
    fn test_native_format_table() {
        assert_eq!(DocumentKind::Text.native_format().extension, "docx");
        assert_eq!(DocumentKind::Spreadsheet.native_format().extension, "xlsx");
        assert_eq!(DocumentKind::Presentation.native_format().extension, "pptx");
        assert_eq!(ExportFormat::PDF.mime_type, "application/pdf");
    }

    #[test]
    fn test_unsupported_native_detection() {
        let node = |mime: &str| RemoteNode {
            id: "id".to_string(),
            name: "name".to_string(),
            mime_type: mime.to_string(),
            created_time: Utc::now(),
            modified_time: Utc::now(),
        };

        assert!(node("application/vnd.google-apps.drawing").is_unsupported_native());
        assert!(!node("image/png").is_unsupported_native());
        assert!(!node(DOCUMENT_MIME_TYPE).is_unsupported_native());
    }

    #[test]
    fn test_children_query_escapes_quotes() {
        assert_eq!(
            children_query("F1"),
            "'F1' in parents and trashed = false"
        );
        assert_eq!(
            children_query("it's"),
            "'it\\'s' in parents and trashed = false"
        );
    }

    #[test]
    fn test_remote_node_deserializes_from_api_shape() {
        let json = r#"{
            "id": "abc",
            "name": "Report",
            "mimeType": "application/vnd.google-apps.spreadsheet",
            "createdTime": "2024-01-01T00:00:00.000Z",
            "modifiedTime": "2024-01-02T03:04:05.678Z"
        }"#;

        let node: RemoteNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.id, "abc");
        assert_eq!(node.kind(), NodeKind::Document(DocumentKind::Spreadsheet));
        assert_eq!(node.modified_time.timestamp(), 1_704_164_645);
    }
}
