//! File view derivation
//!
//! The visible file list is a pure function of the fetched collection, the three
//! `ViewState` fields and the current instant (needed by the Recent filter):
//!
//! ```text
//! visible = sort(search(filter(collection, filter), search), sort)
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::providers::ObjectMeta;

/// How far back the Recent filter reaches
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Sidebar section selecting a subset of the collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewFilter {
    #[default]
    All,
    Recent,
    Images,
    Documents,
    /// Placeholder section; soft delete does not exist, so it is always empty
    Trash,
}

impl ViewFilter {
    pub fn title(&self) -> &'static str {
        match self {
            ViewFilter::All => "All Files",
            ViewFilter::Recent => "Recent",
            ViewFilter::Images => "Images",
            ViewFilter::Documents => "Documents",
            ViewFilter::Trash => "Trash",
        }
    }

    pub fn matches(&self, file: &ObjectMeta, now: DateTime<Utc>) -> bool {
        match self {
            ViewFilter::All => true,
            ViewFilter::Recent => file.created_at > now - Duration::days(RECENT_WINDOW_DAYS),
            ViewFilter::Images => file.mime_type.starts_with("image/"),
            ViewFilter::Documents => {
                let mime = &file.mime_type;
                mime.contains("pdf") || mime.contains("document") || mime.contains("text")
            }
            ViewFilter::Trash => false,
        }
    }
}

impl fmt::Display for ViewFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewFilter::All => "all",
            ViewFilter::Recent => "recent",
            ViewFilter::Images => "images",
            ViewFilter::Documents => "documents",
            ViewFilter::Trash => "trash",
        };
        f.write_str(name)
    }
}

impl FromStr for ViewFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ViewFilter::All),
            "recent" => Ok(ViewFilter::Recent),
            "images" => Ok(ViewFilter::Images),
            "documents" => Ok(ViewFilter::Documents),
            "trash" => Ok(ViewFilter::Trash),
            other => Err(format!(
                "unknown filter '{}' (expected all, recent, images, documents or trash)",
                other
            )),
        }
    }
}

/// Ordering applied after filtering and search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Ascending by name
    #[default]
    Name,
    /// Newest first
    Date,
    /// Largest first
    Size,
    /// Ascending by MIME type
    Type,
}

impl SortKey {
    pub fn compare(&self, a: &ObjectMeta, b: &ObjectMeta) -> Ordering {
        match self {
            SortKey::Name => locale_compare(&a.name, &b.name),
            SortKey::Date => b.created_at.cmp(&a.created_at),
            SortKey::Size => b.size_bytes.cmp(&a.size_bytes),
            SortKey::Type => locale_compare(&a.mime_type, &b.mime_type),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortKey::Name => "name",
            SortKey::Date => "date",
            SortKey::Size => "size",
            SortKey::Type => "type",
        };
        f.write_str(name)
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "date" => Ok(SortKey::Date),
            "size" => Ok(SortKey::Size),
            "type" => Ok(SortKey::Type),
            other => Err(format!("unknown sort key '{}' (expected name, date, size or type)", other)),
        }
    }
}

/// Filter, sort key and search term selected by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub filter: ViewFilter,
    pub sort: SortKey,
    pub search: String,
}

impl ViewState {
    pub fn new(filter: ViewFilter, sort: SortKey, search: impl Into<String>) -> Self {
        Self { filter, sort, search: search.into() }
    }
}

/// Case-insensitive name match; an empty term matches everything.
pub fn matches_search(file: &ObjectMeta, term: &str) -> bool {
    term.is_empty() || file.name.to_lowercase().contains(&term.to_lowercase())
}

/// Derive the visible files from the full collection.
pub fn derive<'a>(files: &'a [ObjectMeta], state: &ViewState, now: DateTime<Utc>) -> Vec<&'a ObjectMeta> {
    let mut visible: Vec<&ObjectMeta> = files
        .iter()
        .filter(|f| state.filter.matches(f, now))
        .filter(|f| matches_search(f, &state.search))
        .collect();
    // sort_by is stable, equal keys keep collection order
    visible.sort_by(|a, b| state.sort.compare(a, b));
    visible
}

/// Locale-style string ordering.
///
/// Levels, first difference wins: base letters ignoring accents and case,
/// then accents (unaccented first), then case (lowercase first), then code points.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    primary_key(a)
        .cmp(primary_key(b))
        .then_with(|| accent_key(a).cmp(accent_key(b)))
        .then_with(|| case_order(a, b))
        .then_with(|| a.cmp(b))
}

fn primary_key(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd().filter(|c| !is_combining_mark(*c)).flat_map(char::to_lowercase)
}

fn accent_key(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd().flat_map(char::to_lowercase)
}

fn case_order(a: &str, b: &str) -> Ordering {
    for (ca, cb) in a.nfd().zip(b.nfd()) {
        if ca != cb {
            return match (ca.is_lowercase(), cb.is_lowercase()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            };
        }
    }
    Ordering::Equal
}

/// `"1 file"`, `"3 files"`
pub fn file_count_label(count: usize) -> String {
    format!("{} file{}", count, if count == 1 { "" } else { "s" })
}
