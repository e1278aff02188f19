//! File View Controller
//!
//! Owns the fetched collection, the view state and the current session, and
//! drives every user action against the backend traits. UIs never hold logic:
//! they call controller methods and subscribe to `ViewEvents`.
//!
//! Mutations (upload/delete) always end in a full reload; the in-memory
//! collection is only ever replaced wholesale.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::dashboard_config::{DashboardConfig, DEFAULT_QUOTA_BYTES};
use crate::format::{file_icon, format_file_size, format_relative_date, IconKind};
use crate::providers::{
    unique_id, AppwriteClient, AppwriteConfig, ObjectMeta, ObjectStore, Permission, ProviderError,
    Session, SessionClient, StorageInfo, UploadFile,
};
use crate::view::{derive, file_count_label, SortKey, ViewFilter, ViewState};

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this file?";

/// Source of the current instant (Recent filter, relative dates)
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where the UI should navigate when the controller gives up the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    /// Sign-in page (no or expired session)
    Login,
    /// Public landing page (after logout)
    Home,
}

/// One rendered file entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileCard {
    pub id: String,
    pub name: String,
    pub icon: IconKind,
    pub size: String,
    pub age: String,
}

impl FileCard {
    pub fn from_meta(meta: &ObjectMeta, now: DateTime<Utc>) -> Self {
        Self {
            id: meta.id.clone(),
            name: meta.name.clone(),
            icon: file_icon(&meta.mime_type),
            size: format_file_size(meta.size_bytes),
            age: format_relative_date(meta.created_at, now),
        }
    }
}

/// Everything a UI needs to draw the file list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedView {
    pub title: String,
    pub cards: Vec<FileCard>,
    pub count_label: String,
}

impl RenderedView {
    /// Empty-state view
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Progress of a multi-file upload, reported before each file is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    /// Zero-based position of the file being sent
    pub index: usize,
    pub total: usize,
    pub file_name: String,
}

impl UploadProgress {
    /// `(index + 1) / total`
    pub fn fraction(&self) -> f64 {
        (self.index + 1) as f64 / self.total as f64
    }

    pub fn label(&self) -> String {
        format!("Uploading {}... ({}/{})", self.file_name, self.index + 1, self.total)
    }
}

/// Content of the preview pane
#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    /// Images render inline from the preview URL
    Image { name: String, url: Url },
    /// Everything else gets a metadata card
    Details {
        name: String,
        icon: IconKind,
        size: String,
        mime_type: String,
        created: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The user declined the confirmation; nothing was sent
    Cancelled,
    Deleted,
}

/// Observer interface implemented by UIs. Every hook defaults to a no-op.
pub trait ViewEvents: Send + Sync {
    fn session_started(&self, _session: &Session) {}
    fn loading(&self, _active: bool) {}
    fn render(&self, _view: &RenderedView) {}
    fn usage_changed(&self, _usage: &StorageInfo) {}
    fn upload_progress(&self, _progress: &UploadProgress) {}
    fn upload_finished(&self, _uploaded: usize, _total: usize) {}
    fn show_preview(&self, _preview: &Preview) {}
    fn open_url(&self, _url: &Url) {}
    fn alert(&self, _error: &ViewError) {}
    fn redirect(&self, _to: Landing) {}

    /// Blocking yes/no question; declining is the safe default
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// Events sink that ignores everything
pub struct NoopEvents;

impl ViewEvents for NoopEvents {}

/// Failures surfaced at the operation boundary
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Authentication required: {0}")]
    AuthFailed(#[source] ProviderError),

    #[error("Failed to load files: {0}")]
    LoadFailed(#[source] ProviderError),

    #[error("Upload failed: {source}")]
    UploadFailed {
        file_name: String,
        /// Zero-based index of the failing file
        index: usize,
        total: usize,
        /// Files created before the failure; they stay in the bucket
        committed: usize,
        #[source]
        source: ProviderError,
    },

    #[error("Delete failed: {source}")]
    DeleteFailed {
        id: String,
        #[source]
        source: ProviderError,
    },

    #[error("Logout failed: {0}")]
    LogoutFailed(#[source] ProviderError),

    #[error("Unknown file: {0}")]
    UnknownFile(String),

    #[error("Could not resolve file link: {0}")]
    LinkFailed(#[source] ProviderError),
}

/// Everything the controller knows, as one owned value.
///
/// Transitions consume the state and return the next one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    pub session: Option<Session>,
    pub files: Vec<ObjectMeta>,
    pub view: ViewState,
}

impl ControllerState {
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn signed_out(mut self) -> Self {
        self.session = None;
        self
    }

    pub fn with_files(mut self, files: Vec<ObjectMeta>) -> Self {
        self.files = files;
        self
    }

    pub fn with_filter(mut self, filter: ViewFilter) -> Self {
        self.view.filter = filter;
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.view.sort = sort;
        self
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.view.search = term.into();
        self
    }

    pub fn visible(&self, now: DateTime<Utc>) -> Vec<&ObjectMeta> {
        derive(&self.files, &self.view, now)
    }

    pub fn find(&self, id: &str) -> Option<&ObjectMeta> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    pub fn render(&self, now: DateTime<Utc>) -> RenderedView {
        let cards: Vec<FileCard> = self
            .visible(now)
            .into_iter()
            .map(|meta| FileCard::from_meta(meta, now))
            .collect();
        RenderedView {
            title: self.view.filter.title().to_string(),
            count_label: file_count_label(cards.len()),
            cards,
        }
    }
}

pub struct FileViewController {
    session_client: Box<dyn SessionClient>,
    store: Box<dyn ObjectStore>,
    events: Arc<dyn ViewEvents>,
    clock: Arc<dyn Clock>,
    bucket: String,
    quota_bytes: u64,
    state: ControllerState,
}

impl FileViewController {
    pub fn new(
        session_client: Box<dyn SessionClient>,
        store: Box<dyn ObjectStore>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            session_client,
            store,
            events: Arc::new(NoopEvents),
            clock: Arc::new(SystemClock),
            bucket: bucket.into(),
            quota_bytes: DEFAULT_QUOTA_BYTES,
            state: ControllerState::default(),
        }
    }

    /// Controller backed by the Appwrite REST API
    pub fn from_config(config: &DashboardConfig) -> Result<Self, ProviderError> {
        let client = AppwriteClient::new(AppwriteConfig::from_dashboard_config(config)?);
        Ok(Self::new(Box::new(client.clone()), Box::new(client), config.bucket_id.clone())
            .with_quota(config.quota_bytes))
    }

    pub fn with_events(mut self, events: Arc<dyn ViewEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    /// Initial view state (applied before the first render)
    pub fn with_view(mut self, view: ViewState) -> Self {
        self.state.view = view;
        self
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.state.session.as_ref()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn visible(&self) -> Vec<&ObjectMeta> {
        self.state.visible(self.clock.now())
    }

    fn transition(&mut self, f: impl FnOnce(ControllerState) -> ControllerState) {
        let state = std::mem::take(&mut self.state);
        self.state = f(state);
    }

    /// Acquire the session, load the collection and publish the usage summary
    pub async fn initialize(&mut self) -> Result<Session, ViewError> {
        let session = match self.session_client.current_user().await {
            Ok(session) => session,
            Err(source) => {
                warn!("No valid session, redirecting to login: {}", source);
                self.transition(ControllerState::signed_out);
                self.events.redirect(Landing::Login);
                return Err(ViewError::AuthFailed(source));
            }
        };

        info!("Dashboard initialized for {} ({})", session.user_name, session.user_id);
        self.transition(|s| s.with_session(session.clone()));
        self.events.session_started(&session);

        if let Err(e) = self.reload().await {
            warn!("Initial load failed: {}", e);
        }
        self.publish_usage();
        Ok(session)
    }

    /// Replace the collection with a fresh listing.
    ///
    /// On failure the collection becomes empty and the empty state is rendered.
    pub async fn reload(&mut self) -> Result<usize, ViewError> {
        self.events.loading(true);
        let result = self.store.list(&self.bucket).await;

        let outcome = match result {
            Ok(files) => {
                let count = files.len();
                debug!("Loaded {} files from bucket {}", count, self.bucket);
                self.transition(|s| s.with_files(files));
                Ok(count)
            }
            Err(source) => {
                warn!("Error loading files: {}", source);
                self.transition(|s| s.with_files(Vec::new()));
                Err(ViewError::LoadFailed(source))
            }
        };

        self.render();
        self.events.loading(false);
        outcome
    }

    /// Derive and publish the current view
    pub fn render(&self) -> RenderedView {
        let view = self.state.render(self.clock.now());
        self.events.render(&view);
        view
    }

    pub fn set_filter(&mut self, filter: ViewFilter) -> RenderedView {
        self.transition(|s| s.with_filter(filter));
        self.render()
    }

    pub fn set_sort(&mut self, sort: SortKey) -> RenderedView {
        self.transition(|s| s.with_sort(sort));
        self.render()
    }

    pub fn set_search(&mut self, term: impl Into<String>) -> RenderedView {
        let term = term.into();
        self.transition(|s| s.with_search(term));
        self.render()
    }

    /// Used space of the loaded collection against the quota
    pub fn usage(&self) -> StorageInfo {
        StorageInfo::new(self.state.total_bytes(), self.quota_bytes)
    }

    fn publish_usage(&self) {
        let usage = self.usage();
        self.events.usage_changed(&usage);
    }

    async fn refresh_after_mutation(&mut self) {
        if let Err(e) = self.reload().await {
            warn!("Reload after change failed: {}", e);
        }
        self.publish_usage();
    }

    /// Upload files one after another in input order.
    ///
    /// The first failure stops the batch. Files sent before it stay in the
    /// bucket, and the collection is not reloaded.
    pub async fn upload(&mut self, files: &[UploadFile]) -> Result<Vec<ObjectMeta>, ViewError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let user_id = match self.state.session {
            Some(ref session) => session.user_id.clone(),
            None => {
                self.events.redirect(Landing::Login);
                return Err(ViewError::AuthFailed(ProviderError::NotConnected));
            }
        };
        let permissions = Permission::owner_only(&user_id);
        let total = files.len();
        let mut created = Vec::with_capacity(total);

        for (index, file) in files.iter().enumerate() {
            let progress = UploadProgress { index, total, file_name: file.name.clone() };
            debug!("{}", progress.label());
            self.events.upload_progress(&progress);

            let id = unique_id();
            match self.store.create(&self.bucket, &id, file, &permissions).await {
                Ok(meta) => created.push(meta),
                Err(source) => {
                    warn!("Upload of {} failed: {}", file.name, source);
                    let err = ViewError::UploadFailed {
                        file_name: file.name.clone(),
                        index,
                        total,
                        committed: created.len(),
                        source,
                    };
                    self.events.upload_finished(created.len(), total);
                    self.events.alert(&err);
                    return Err(err);
                }
            }
        }

        info!("Uploaded {} file(s)", created.len());
        self.events.upload_finished(created.len(), total);
        self.refresh_after_mutation().await;
        Ok(created)
    }

    /// Delete one object after the user confirms
    pub async fn delete_one(&mut self, id: &str) -> Result<DeleteOutcome, ViewError> {
        if !self.events.confirm(DELETE_PROMPT) {
            debug!("Delete of {} cancelled", id);
            return Ok(DeleteOutcome::Cancelled);
        }

        match self.store.delete(&self.bucket, id).await {
            Ok(()) => {
                self.refresh_after_mutation().await;
                Ok(DeleteOutcome::Deleted)
            }
            Err(source) => {
                warn!("Delete of {} failed: {}", id, source);
                let err = ViewError::DeleteFailed { id: id.to_string(), source };
                self.events.alert(&err);
                Err(err)
            }
        }
    }

    /// Resolve the download URL and hand it to the UI to open
    pub fn download(&self, id: &str) -> Result<Url, ViewError> {
        let url = self
            .store
            .download_url(&self.bucket, id)
            .map_err(|e| self.report(ViewError::LinkFailed(e)))?;
        self.events.open_url(&url);
        Ok(url)
    }

    /// Build the preview for a loaded object
    pub fn preview(&self, id: &str) -> Result<Preview, ViewError> {
        let meta = self
            .state
            .find(id)
            .ok_or_else(|| self.report(ViewError::UnknownFile(id.to_string())))?;

        let preview = if meta.is_image() {
            let url = self
                .store
                .preview_url(&self.bucket, id)
                .map_err(|e| self.report(ViewError::LinkFailed(e)))?;
            Preview::Image { name: meta.name.clone(), url }
        } else {
            Preview::Details {
                name: meta.name.clone(),
                icon: file_icon(&meta.mime_type),
                size: format_file_size(meta.size_bytes),
                mime_type: meta.mime_type.clone(),
                created: format_relative_date(meta.created_at, self.clock.now()),
            }
        };

        self.events.show_preview(&preview);
        Ok(preview)
    }

    /// End the session; the UI is sent to the landing page whatever the outcome
    pub async fn logout(&mut self) -> Result<(), ViewError> {
        let result = self.session_client.end_session().await;
        self.transition(ControllerState::signed_out);
        self.events.redirect(Landing::Home);

        result.map_err(|e| {
            warn!("Logout error: {}", e);
            ViewError::LogoutFailed(e)
        })
    }

    fn report(&self, err: ViewError) -> ViewError {
        warn!("{}", err);
        self.events.alert(&err);
        err
    }
}
