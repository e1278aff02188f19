//! Storage Backends Module
//!
//! The view controller never talks to a concrete backend. It works against two traits:
//! `SessionClient` for the signed-in identity and `ObjectStore` for bucket-scoped
//! file operations. `AppwriteClient` implements both over the Appwrite REST API.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │    SessionClient     │   │     ObjectStore      │
//! │ current_user, end    │   │ list, create, delete │
//! └──────────────────────┘   └──────────────────────┘
//!            │                          │
//!            └────────────┬─────────────┘
//!                         ▼
//!                ┌────────────────┐
//!                │ AppwriteClient │
//!                └────────────────┘
//! ```

pub mod types;
pub mod appwrite;

pub use types::*;
pub use appwrite::AppwriteClient;

use async_trait::async_trait;
use rand::Rng;
use url::Url;

/// Authentication/session service
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Resolve the user behind the current session
    async fn current_user(&self) -> Result<Session, ProviderError>;

    /// End the current session
    async fn end_session(&self) -> Result<(), ProviderError>;
}

/// Bucket-scoped object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List all objects in the bucket
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectMeta>, ProviderError>;

    /// Store a new object under `id` with the given permissions
    async fn create(
        &self,
        bucket: &str,
        id: &str,
        file: &UploadFile,
        permissions: &[Permission],
    ) -> Result<ObjectMeta, ProviderError>;

    /// Delete an object
    async fn delete(&self, bucket: &str, id: &str) -> Result<(), ProviderError>;

    /// URL serving the raw object as an attachment
    fn download_url(&self, bucket: &str, id: &str) -> Result<Url, ProviderError>;

    /// URL serving an inline image preview
    fn preview_url(&self, bucket: &str, id: &str) -> Result<Url, ProviderError>;
}

/// Generate a 20 character object id: microsecond timestamp in hex plus random padding.
pub fn unique_id() -> String {
    let micros = chrono::Utc::now().timestamp_micros().max(0) as u64;
    let secs = micros / 1_000_000;
    let usec = micros % 1_000_000;
    let mut id = format!("{:08x}{:05x}", secs, usec);
    let mut rng = rand::thread_rng();
    for _ in 0..7 {
        let digit: u32 = rng.gen_range(0..16);
        id.push(std::char::from_digit(digit, 16).unwrap_or('0'));
    }
    id
}

/// Clean a backend error message before it reaches logs or the user.
///
/// Strips control characters and caps the length so an HTML error page
/// never ends up in an alert.
pub fn sanitize_api_error(raw: &str) -> String {
    const MAX_LEN: usize = 300;
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.chars().count() > MAX_LEN {
        let cut: String = trimmed.chars().take(MAX_LEN).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_id_shape() {
        let a = unique_id();
        let b = unique_id();
        assert_eq!(a.len(), 20);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_sanitize_api_error() {
        assert_eq!(sanitize_api_error("  File not found\n"), "File not found");
        assert_eq!(sanitize_api_error("a\tb"), "a b");
        let long = "x".repeat(500);
        let out = sanitize_api_error(&long);
        assert_eq!(out.len(), 303);
        assert!(out.ends_with("..."));
    }
}
