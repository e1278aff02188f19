// BucketDeck - File dashboard for Appwrite storage buckets
// Library crate: backend clients, view derivation and the file view controller

pub mod controller;
pub mod dashboard_config;
pub mod format;
pub mod providers;
pub mod view;

pub use controller::{
    Clock, ControllerState, DeleteOutcome, FileCard, FileViewController, Landing, NoopEvents,
    Preview, RenderedView, SystemClock, UploadProgress, ViewError, ViewEvents, DELETE_PROMPT,
};
pub use dashboard_config::{ConfigError, DashboardConfig, DEFAULT_QUOTA_BYTES};
pub use format::{file_icon, format_file_size, format_relative_date, IconKind};
pub use providers::{
    AppwriteClient, ObjectMeta, ObjectStore, Permission, ProviderError, Session, SessionClient,
    StorageInfo, UploadFile,
};
pub use view::{derive, SortKey, ViewFilter, ViewState};
