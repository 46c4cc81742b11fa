//! File listings of drafts and records.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};

use crate::error::{InvalidInputError, UploadError};
use crate::upload::{self, UploadOptions, UploadOutcome, UploadSource};
use crate::{Api, Result};

/// Whether a file slot holds committed content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[default]
    Pending,
    #[serde(alias = "completed")]
    Committed,
}

/// Links of a single file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileLinks {
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// One file of a draft or record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub key: String,
    #[serde(default)]
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub links: FileLinks,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileEntry {
    pub fn is_committed(&self) -> bool {
        self.status == FileStatus::Committed
    }

    /// Stream the file content into `dir/<key>` and return that path.
    ///
    /// Keys come from the server; one that would resolve outside `dir`
    /// is rejected before any request.
    #[instrument(skip(self, api), fields(key = %self.key))]
    pub async fn download(&self, api: &Api, dir: &Path) -> Result<PathBuf> {
        let dest = download_path(dir, &self.key)?;
        let url = self
            .links
            .content
            .as_deref()
            .ok_or_else(|| UploadError::MissingLink {
                key: self.key.clone(),
                link: "content",
            })?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        api.download(url, &dest).await?;
        debug!(dest = %dest.display(), "file downloaded");
        Ok(dest)
    }
}

/// The reply of a files endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileListing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub entries: Vec<FileEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileListing {
    pub fn get(&self, key: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.key.as_str()).collect()
    }

    /// Sum of the known entry sizes.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().filter_map(|e| e.size).sum()
    }
}

async fn fetch_listing(api: &Api, url: &str) -> Result<FileListing> {
    api.get(url, &[]).await
}

/// Files of a draft. Slots can be created, filled and removed.
#[derive(Debug, Clone)]
pub struct DraftFiles {
    api: Api,
    url: String,
    listing: FileListing,
}

impl DraftFiles {
    pub(crate) fn new(api: Api, url: String) -> Self {
        Self {
            api,
            url,
            listing: FileListing::default(),
        }
    }

    pub(crate) fn set_url(&mut self, url: String) {
        self.url = url;
    }

    pub(crate) fn api(&self) -> &Api {
        &self.api
    }

    /// The files endpoint this listing comes from.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn listing(&self) -> &FileListing {
        &self.listing
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.listing.entries
    }

    pub fn get(&self, key: &str) -> Option<&FileEntry> {
        self.listing.get(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.listing.keys()
    }

    pub fn total_size(&self) -> u64 {
        self.listing.total_size()
    }

    /// Re-fetch the listing.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn refresh(&mut self) -> Result<&mut Self> {
        self.listing = fetch_listing(&self.api, &self.url).await?;
        Ok(self)
    }

    /// Register an empty file slot and return it.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn create_slot(&mut self, key: &str) -> Result<FileEntry> {
        validate_key(key)?;
        let listing: FileListing = self
            .api
            .post(&self.url, Some(json!([{ "key": key }])))
            .await?;

        let entry = listing
            .get(key)
            .cloned()
            .ok_or_else(|| UploadError::SlotNotCreated {
                key: key.to_string(),
            })?;
        debug!(key, "file slot created");
        self.listing = listing;
        Ok(entry)
    }

    /// Delete a file or slot by key.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn delete(&mut self, key: &str) -> Result<()> {
        let url = match self.get(key).and_then(|e| e.links.self_.clone()) {
            Some(url) => url,
            None => format!("{}/{}", self.api.url(&self.url), key),
        };
        self.api.delete(&url).await?;
        self.listing.entries.retain(|e| e.key != key);
        info!(key, "file deleted");
        Ok(())
    }

    /// Create a slot, upload into it and commit it, retrying the transfer.
    pub async fn upload(
        &mut self,
        source: UploadSource,
        options: UploadOptions,
    ) -> Result<UploadOutcome> {
        upload::upload(self, source, options).await
    }
}

/// Files of a published record. Read-only.
#[derive(Debug, Clone)]
pub struct RecordFiles {
    api: Api,
    url: String,
    listing: FileListing,
}

impl RecordFiles {
    pub(crate) fn new(api: Api, url: String) -> Self {
        Self {
            api,
            url,
            listing: FileListing::default(),
        }
    }

    pub fn listing(&self) -> &FileListing {
        &self.listing
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.listing.entries
    }

    pub fn get(&self, key: &str) -> Option<&FileEntry> {
        self.listing.get(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.listing.keys()
    }

    pub fn total_size(&self) -> u64 {
        self.listing.total_size()
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn refresh(&mut self) -> Result<&mut Self> {
        self.listing = fetch_listing(&self.api, &self.url).await?;
        Ok(self)
    }

    /// Download every file into `dir`.
    ///
    /// All keys are checked first, so an unsafe key fails the call before
    /// anything is written.
    pub async fn download_all(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        for entry in &self.listing.entries {
            download_path(dir, &entry.key)?;
        }
        let mut paths = Vec::with_capacity(self.listing.entries.len());
        for entry in &self.listing.entries {
            paths.push(entry.download(&self.api, dir).await?);
        }
        Ok(paths)
    }
}

pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(InvalidInputError::Field {
            name: "key".to_string(),
            reason: "cannot be empty".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Join a server-supplied key onto `dir`, refusing anything that is not a
/// plain relative path.
pub(crate) fn download_path(dir: &Path, key: &str) -> Result<PathBuf> {
    let unsafe_key = |reason: &str| -> crate::Error {
        InvalidInputError::Field {
            name: "key".to_string(),
            reason: format!("'{key}' {reason}"),
        }
        .into()
    };

    let mut normal = 0;
    for component in Path::new(key).components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            Component::ParentDir => return Err(unsafe_key("contains '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_key("is an absolute path"));
            }
        }
    }
    if normal == 0 {
        return Err(unsafe_key("does not name a file"));
    }
    Ok(dir.join(key))
}
