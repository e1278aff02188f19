//! Appwrite Storage Backend
//!
//! Implements `SessionClient` and `ObjectStore` on top of the Appwrite REST API.
//! Authentication uses an existing session secret sent in `X-Appwrite-Session`;
//! creating sessions is left to the Appwrite console or web login.
//!
//! API Base: `<endpoint>` (e.g. https://cloud.appwrite.io/v1)
//! Upload: multipart POST, chunked above 5 MiB with Content-Range
//! Listing: single request, no pagination

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::ops::Range;
use tracing::{debug, info};
use url::Url;

use super::{
    AppwriteConfig, ObjectMeta, ObjectStore, Permission, ProviderError, Session, SessionClient,
    UploadFile, sanitize_api_error,
};

/// Largest body the backend accepts in one request; bigger files go in chunks.
const CHUNK_SIZE: usize = 5 * 1024 * 1024;

const RESPONSE_FORMAT: &str = "1.5.0";

// ─── API Response Types ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AppwriteFile {
    #[serde(rename = "$id")]
    id: String,
    #[serde(rename = "$createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "$permissions", default)]
    permissions: Vec<String>,
    name: String,
    #[serde(rename = "mimeType", default)]
    mime_type: String,
    #[serde(rename = "sizeOriginal", default)]
    size_original: u64,
}

impl From<AppwriteFile> for ObjectMeta {
    fn from(file: AppwriteFile) -> Self {
        let owner_id = file
            .permissions
            .iter()
            .filter_map(|raw| Permission::parse(raw))
            .find_map(|p| p.user_id().map(str::to_string))
            .unwrap_or_default();

        ObjectMeta {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            size_bytes: file.size_original,
            created_at: file.created_at,
            owner_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AppwriteFileList {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    files: Vec<AppwriteFile>,
}

#[derive(Debug, Deserialize)]
struct AppwriteUser {
    #[serde(rename = "$id")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppwriteErrorBody {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// Byte ranges of a chunked upload, `CHUNK_SIZE` each except the last
fn chunk_ranges(total: usize) -> Vec<Range<usize>> {
    (0..total)
        .step_by(CHUNK_SIZE)
        .map(|start| start..(start + CHUNK_SIZE).min(total))
        .collect()
}

/// Headers of one chunk request
fn chunk_headers(range: &Range<usize>, total: usize, upload_id: Option<&str>) -> Vec<(&'static str, String)> {
    let mut headers = vec![(
        "Content-Range",
        format!("bytes {}-{}/{}", range.start, range.end - 1, total),
    )];
    if let Some(id) = upload_id {
        headers.push(("x-appwrite-id", id.to_string()));
    }
    headers
}

/// Map a non-2xx response to an error, preferring the backend's own message
fn error_from_body(status: u16, body: &str) -> ProviderError {
    let message = match serde_json::from_str::<AppwriteErrorBody>(body) {
        Ok(err) if !err.message.is_empty() => {
            debug!("Appwrite error type: {:?}", err.kind);
            err.message
        }
        _ => format!("HTTP {}: {}", status, body),
    };
    ProviderError::from_status(status, sanitize_api_error(&message))
}

/// Appwrite REST client
#[derive(Clone)]
pub struct AppwriteClient {
    config: AppwriteConfig,
    client: reqwest::Client,
}

impl AppwriteClient {
    pub fn new(config: AppwriteConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint, path)
    }

    fn files_path(bucket: &str) -> String {
        format!("/storage/buckets/{}/files", urlencoding::encode(bucket))
    }

    fn file_path(bucket: &str, id: &str) -> String {
        format!("{}/{}", Self::files_path(bucket), urlencoding::encode(id))
    }

    /// Request builder with project and session headers attached
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.api_url(path))
            .header("X-Appwrite-Project", &self.config.project_id)
            .header("X-Appwrite-Response-Format", RESPONSE_FORMAT);
        if let Some(ref session) = self.config.session {
            builder = builder.header("X-Appwrite-Session", session.expose_secret());
        }
        builder
    }

    /// Send a request and turn non-2xx responses into errors
    async fn send(&self, builder: RequestBuilder) -> Result<Response, ProviderError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| {
                let message = sanitize_api_error(&e.to_string());
                if e.is_connect() {
                    ProviderError::ConnectionFailed(message)
                } else {
                    ProviderError::NetworkError(message)
                }
            })?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(error_from_body(status, &body))
    }

    async fn parse<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, ProviderError> {
        resp.json::<T>()
            .await
            .map_err(|e| ProviderError::ParseError(sanitize_api_error(&e.to_string())))
    }

    fn upload_form(
        id: &str,
        file: &UploadFile,
        chunk: &[u8],
        permissions: &[Permission],
    ) -> Result<reqwest::multipart::Form, ProviderError> {
        let part = reqwest::multipart::Part::bytes(chunk.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| ProviderError::TransferFailed(format!("MIME error: {}", e)))?;

        let mut form = reqwest::multipart::Form::new().text("fileId", id.to_string());
        for permission in permissions {
            form = form.text("permissions[]", permission.to_string());
        }
        Ok(form.part("file", part))
    }

    fn file_url(&self, bucket: &str, id: &str, action: &str) -> Result<Url, ProviderError> {
        let raw = self.api_url(&format!("{}/{}", Self::file_path(bucket, id), action));
        let mut url = Url::parse(&raw)
            .map_err(|e| ProviderError::InvalidConfig(format!("Invalid endpoint URL: {}", e)))?;
        url.query_pairs_mut().append_pair("project", &self.config.project_id);
        Ok(url)
    }
}

#[async_trait]
impl SessionClient for AppwriteClient {
    async fn current_user(&self) -> Result<Session, ProviderError> {
        if self.config.session.is_none() {
            return Err(ProviderError::NotConnected);
        }
        let resp = self.send(self.request(Method::GET, "/account")).await?;
        let user: AppwriteUser = Self::parse(resp).await?;
        info!("Authenticated as {} ({})", user.name, user.id);
        Ok(Session { user_id: user.id, user_name: user.name, email: user.email })
    }

    async fn end_session(&self) -> Result<(), ProviderError> {
        self.send(self.request(Method::DELETE, "/account/sessions/current")).await?;
        info!("Session ended");
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for AppwriteClient {
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectMeta>, ProviderError> {
        let resp = self.send(self.request(Method::GET, &Self::files_path(bucket))).await?;
        let list: AppwriteFileList = Self::parse(resp).await?;
        debug!("Listed {} of {} files in bucket {}", list.files.len(), list.total, bucket);
        Ok(list.files.into_iter().map(ObjectMeta::from).collect())
    }

    async fn create(
        &self,
        bucket: &str,
        id: &str,
        file: &UploadFile,
        permissions: &[Permission],
    ) -> Result<ObjectMeta, ProviderError> {
        let path = Self::files_path(bucket);

        if file.data.len() <= CHUNK_SIZE {
            let form = Self::upload_form(id, file, &file.data, permissions)?;
            let resp = self.send(self.request(Method::POST, &path).multipart(form)).await?;
            let created: AppwriteFile = Self::parse(resp).await?;
            info!("Uploaded {} as {}", file.name, created.id);
            return Ok(created.into());
        }

        // Chunked upload: later chunks name the file id the first one created
        let total = file.data.len();
        let ranges = chunk_ranges(total);
        let mut created: Option<AppwriteFile> = None;
        for (index, range) in ranges.iter().enumerate() {
            let form = Self::upload_form(id, file, &file.data[range.clone()], permissions)?;
            let mut builder = self.request(Method::POST, &path).multipart(form);
            for (name, value) in chunk_headers(range, total, created.as_ref().map(|f| f.id.as_str())) {
                builder = builder.header(name, value);
            }
            let resp = self.send(builder).await?;
            created = Some(Self::parse(resp).await?);
            debug!("Uploaded chunk {} of {} ({:?}/{})", index + 1, ranges.len(), range, total);
        }

        let created = created
            .ok_or_else(|| ProviderError::TransferFailed("Upload produced no response".to_string()))?;
        info!("Uploaded {} as {} in chunks", file.name, created.id);
        Ok(created.into())
    }

    async fn delete(&self, bucket: &str, id: &str) -> Result<(), ProviderError> {
        self.send(self.request(Method::DELETE, &Self::file_path(bucket, id))).await?;
        info!("Deleted file {}", id);
        Ok(())
    }

    fn download_url(&self, bucket: &str, id: &str) -> Result<Url, ProviderError> {
        self.file_url(bucket, id, "download")
    }

    fn preview_url(&self, bucket: &str, id: &str) -> Result<Url, ProviderError> {
        self.file_url(bucket, id, "preview")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AppwriteClient {
        AppwriteClient::new(AppwriteConfig {
            endpoint: "https://cloud.example.com/v1".to_string(),
            project_id: "proj42".to_string(),
            session: None,
        })
    }

    #[test]
    fn test_file_urls() {
        let c = client();
        assert_eq!(
            c.download_url("bucket1", "file9").unwrap().as_str(),
            "https://cloud.example.com/v1/storage/buckets/bucket1/files/file9/download?project=proj42"
        );
        assert_eq!(
            c.preview_url("bucket1", "file9").unwrap().as_str(),
            "https://cloud.example.com/v1/storage/buckets/bucket1/files/file9/preview?project=proj42"
        );
    }

    #[test]
    fn test_file_id_is_path_encoded() {
        let url = client().download_url("b", "a/b").unwrap();
        assert!(url.path().ends_with("/files/a%2Fb/download"));
    }

    #[test]
    fn test_parse_file_list() {
        let body = r#"{
            "total": 1,
            "files": [{
                "$id": "65a1",
                "bucketId": "bucket1",
                "$createdAt": "2024-01-12T10:15:00.000+00:00",
                "$updatedAt": "2024-01-12T10:15:00.000+00:00",
                "$permissions": ["read(\"user:u1\")", "delete(\"user:u1\")"],
                "name": "report.pdf",
                "signature": "abc",
                "mimeType": "application/pdf",
                "sizeOriginal": 2048,
                "chunksTotal": 1,
                "chunksUploaded": 1
            }]
        }"#;
        let list: AppwriteFileList = serde_json::from_str(body).unwrap();
        let meta: Vec<ObjectMeta> = list.files.into_iter().map(ObjectMeta::from).collect();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].id, "65a1");
        assert_eq!(meta[0].mime_type, "application/pdf");
        assert_eq!(meta[0].size_bytes, 2048);
        assert_eq!(meta[0].owner_id, "u1");
        assert_eq!(meta[0].created_at.to_rfc3339(), "2024-01-12T10:15:00+00:00");
    }

    #[test]
    fn test_owner_empty_without_user_role() {
        let body = r#"{"$id":"x","$createdAt":"2024-01-12T10:15:00.000+00:00",
            "$permissions":["read(\"any\")"],"name":"a","mimeType":"text/plain","sizeOriginal":1}"#;
        let file: AppwriteFile = serde_json::from_str(body).unwrap();
        assert_eq!(ObjectMeta::from(file).owner_id, "");
    }

    #[test]
    fn test_chunk_ranges_boundaries() {
        assert!(chunk_ranges(0).is_empty());
        assert_eq!(chunk_ranges(CHUNK_SIZE), vec![0..CHUNK_SIZE]);
        assert_eq!(
            chunk_ranges(CHUNK_SIZE + 1),
            vec![0..CHUNK_SIZE, CHUNK_SIZE..CHUNK_SIZE + 1]
        );
        assert_eq!(chunk_ranges(2 * CHUNK_SIZE + 10).len(), 3);
    }

    #[test]
    fn test_chunk_headers() {
        let total = CHUNK_SIZE + 1;
        let ranges = chunk_ranges(total);

        let first = chunk_headers(&ranges[0], total, None);
        assert_eq!(first, vec![("Content-Range", "bytes 0-5242879/5242881".to_string())]);

        let last = chunk_headers(&ranges[1], total, Some("65a1"));
        assert_eq!(
            last,
            vec![
                ("Content-Range", "bytes 5242880-5242880/5242881".to_string()),
                ("x-appwrite-id", "65a1".to_string()),
            ]
        );
    }

    #[test]
    fn test_error_from_body() {
        let body = r#"{"message":"User (role: guests) missing scope (account)","code":401,"type":"general_unauthorized_scope","version":"1.5.0"}"#;
        match error_from_body(401, body) {
            ProviderError::AuthenticationFailed(msg) => {
                assert_eq!(msg, "User (role: guests) missing scope (account)")
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let forbidden = r#"{"message":"The current user is not authorized to perform the requested action.","code":401,"type":"user_unauthorized"}"#;
        assert!(matches!(error_from_body(403, forbidden), ProviderError::PermissionDenied(_)));

        match error_from_body(502, "<html>\nBad Gateway</html>") {
            ProviderError::ServerError(msg) => assert_eq!(msg, "HTTP 502: <html> Bad Gateway</html>"),
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(matches!(error_from_body(404, r#"{"message":""}"#), ProviderError::NotFound(m) if m.starts_with("HTTP 404")));
    }

    #[tokio::test]
    async fn test_refused_connection_maps_to_connection_failed() {
        let client = AppwriteClient::new(AppwriteConfig {
            endpoint: "http://127.0.0.1:1/v1".to_string(),
            project_id: "proj42".to_string(),
            session: Some(secrecy::SecretString::from("secret".to_string())),
        });
        let err = client.list("bucket1").await.unwrap_err();
        assert!(matches!(err, ProviderError::ConnectionFailed(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_current_user_requires_session() {
        let err = client().current_user().await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConnected));
    }
}
