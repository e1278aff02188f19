//! Shared types for storage backends
//!
//! This module contains the types shared between the backend traits, the Appwrite
//! client and the view controller: object metadata, sessions, upload blobs,
//! permissions, the backend configuration and the error type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::dashboard_config::DashboardConfig;

/// Metadata of one object stored in a bucket.
///
/// Fetched wholesale on every reload and never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Backend-assigned unique identifier
    pub id: String,
    /// Original file name
    pub name: String,
    /// MIME type as reported by the backend
    pub mime_type: String,
    /// Size of the original upload in bytes
    pub size_bytes: u64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Id of the user owning the object (empty if the backend reports none)
    pub owner_id: String,
}

impl ObjectMeta {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Authenticated user context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A blob queued for upload
#[derive(Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl UploadFile {
    /// Build an upload from memory, guessing the MIME type from the file name.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name).first_or_octet_stream().to_string();
        Self { name, mime_type, data }
    }

    /// Read a local file into an upload
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ProviderError::InvalidPath(path.display().to_string()))?;
        let data = tokio::fs::read(path).await?;
        Ok(Self::new(name, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Action granted by a permission entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    Read,
    Update,
    Delete,
}

impl fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionAction::Read => write!(f, "read"),
            PermissionAction::Update => write!(f, "update"),
            PermissionAction::Delete => write!(f, "delete"),
        }
    }
}

/// One permission entry, rendered as `read("user:<id>")`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub action: PermissionAction,
    pub role: String,
}

impl Permission {
    pub fn user(action: PermissionAction, user_id: &str) -> Self {
        Self { action, role: format!("user:{}", user_id) }
    }

    /// Read + delete for the given user and nobody else.
    pub fn owner_only(user_id: &str) -> Vec<Permission> {
        vec![
            Permission::user(PermissionAction::Read, user_id),
            Permission::user(PermissionAction::Delete, user_id),
        ]
    }

    /// Parse the backend's `action("role")` syntax
    pub fn parse(raw: &str) -> Option<Self> {
        let (action, rest) = raw.trim().split_once('(')?;
        let action = match action {
            "read" => PermissionAction::Read,
            "update" => PermissionAction::Update,
            "delete" => PermissionAction::Delete,
            _ => return None,
        };
        let role = rest.strip_suffix(')')?.trim_matches('"');
        Some(Self { action, role: role.to_string() })
    }

    /// User id if this entry targets a single user
    pub fn user_id(&self) -> Option<&str> {
        self.role.strip_prefix("user:").map(|id| id.split('/').next().unwrap_or(id))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(\"{}\")", self.action, self.role)
    }
}

/// Appwrite connection settings
#[derive(Debug, Clone)]
pub struct AppwriteConfig {
    /// API endpoint including the version prefix (e.g. https://cloud.appwrite.io/v1)
    pub endpoint: String,
    pub project_id: String,
    /// Session secret (SecretString for memory zeroization)
    pub session: Option<secrecy::SecretString>,
}

impl AppwriteConfig {
    pub fn from_dashboard_config(config: &DashboardConfig) -> Result<Self, ProviderError> {
        let endpoint = config.endpoint.trim().trim_end_matches('/').to_string();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ProviderError::InvalidConfig(format!(
                "Endpoint must be an http(s) URL: {}",
                endpoint
            )));
        }
        if config.project_id.trim().is_empty() {
            return Err(ProviderError::InvalidConfig("Project ID is required".to_string()));
        }
        Ok(Self {
            endpoint,
            project_id: config.project_id.trim().to_string(),
            session: config.session_secret.clone().map(secrecy::SecretString::from),
        })
    }
}

/// Backend error type
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Not connected to server")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Map an HTTP status and backend message to an error
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => ProviderError::AuthenticationFailed(message),
            403 => ProviderError::PermissionDenied(message),
            404 => ProviderError::NotFound(message),
            409 => ProviderError::AlreadyExists(message),
            500..=599 => ProviderError::ServerError(message),
            _ => ProviderError::Other(message),
        }
    }
}

/// Storage quota information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    /// Bytes used
    pub used: u64,
    /// Total bytes available
    pub total: u64,
    /// Bytes free
    pub free: u64,
}

impl StorageInfo {
    pub fn new(used: u64, total: u64) -> Self {
        Self { used, total, free: total.saturating_sub(used) }
    }

    /// Used share of the quota in percent, capped at 100
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        ((self.used as f64 / self.total as f64) * 100.0).min(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_display_matches_backend_syntax() {
        let perms = Permission::owner_only("abc123");
        let rendered: Vec<String> = perms.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec![r#"read("user:abc123")"#, r#"delete("user:abc123")"#]);
    }

    #[test]
    fn test_permission_parse() {
        let perm = Permission::parse(r#"delete("user:64f0a")"#).unwrap();
        assert_eq!(perm.action, PermissionAction::Delete);
        assert_eq!(perm.user_id(), Some("64f0a"));

        let any = Permission::parse(r#"read("any")"#).unwrap();
        assert_eq!(any.user_id(), None);

        assert!(Permission::parse("write(any)").is_none());
        assert!(Permission::parse("garbage").is_none());
    }

    #[test]
    fn test_upload_file_guesses_mime() {
        assert_eq!(UploadFile::new("photo.png", vec![1, 2]).mime_type, "image/png");
        assert_eq!(UploadFile::new("notes.txt", vec![]).mime_type, "text/plain");
        assert_eq!(UploadFile::new("blob", vec![]).mime_type, "application/octet-stream");
    }

    #[test]
    fn test_storage_info_percent_is_capped() {
        assert_eq!(StorageInfo::new(512, 1024).percent(), 50.0);
        assert_eq!(StorageInfo::new(4096, 1024).percent(), 100.0);
        assert_eq!(StorageInfo::new(4096, 1024).free, 0);
    }

    #[test]
    fn test_error_from_status() {
        assert!(matches!(ProviderError::from_status(401, "x".into()), ProviderError::AuthenticationFailed(_)));
        assert!(matches!(ProviderError::from_status(404, "x".into()), ProviderError::NotFound(_)));
        assert!(matches!(ProviderError::from_status(503, "x".into()), ProviderError::ServerError(_)));
        assert!(matches!(ProviderError::from_status(418, "x".into()), ProviderError::Other(_)));
    }
}
