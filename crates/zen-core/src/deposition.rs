//! Legacy Zenodo deposition API (`/api/deposit/depositions`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use crate::error::InvalidInputError;
use crate::files::{FileEntry, FileLinks, FileStatus};
use crate::types::RecordId;
use crate::upload::{self, UploadOptions, UploadOutcome, UploadSource};
use crate::{Api, Error, Result};

/// Links of a deposition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepositionLinks {
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newversion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_draft: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// A file attached to a deposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositionFile {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub filesize: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default)]
    pub links: BTreeMap<String, Value>,
}

impl DepositionFile {
    fn link(&self, name: &str) -> Option<String> {
        self.links.get(name).and_then(Value::as_str).map(str::to_string)
    }

    /// The same file in the shape draft listings use.
    pub fn to_entry(&self) -> FileEntry {
        FileEntry {
            key: self.filename.clone(),
            status: FileStatus::Committed,
            checksum: self.checksum.clone(),
            size: Some(self.filesize),
            mimetype: None,
            links: FileLinks {
                self_: self.link("self"),
                content: self.link("download"),
                ..FileLinks::default()
            },
            extra: Map::new(),
        }
    }
}

/// Snapshot of a deposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositionData {
    pub id: RecordId,
    #[serde(default)]
    pub title: String,
    /// `inprogress`, `done` or `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub submitted: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub files: Vec<DepositionFile>,
    #[serde(default)]
    pub links: DepositionLinks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A deposition bound to the API it came from.
#[derive(Debug, Clone)]
pub struct Deposition {
    data: DepositionData,
    api: Api,
}

impl Deposition {
    pub fn from_data(api: Api, data: DepositionData) -> Self {
        Self { data, api }
    }

    pub fn data(&self) -> &DepositionData {
        &self.data
    }

    pub fn id(&self) -> &RecordId {
        &self.data.id
    }

    pub fn title(&self) -> &str {
        &self.data.title
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.data.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data.metadata
    }

    /// Whether the deposition has been published at least once.
    pub fn is_published(&self) -> bool {
        self.data.submitted
    }

    /// Whether an edit session is open on a published deposition.
    pub fn is_editing(&self) -> bool {
        self.data.submitted && self.data.state.as_deref() == Some("inprogress")
    }

    fn url(&self, suffix: &str) -> String {
        match (&self.data.links.self_, suffix) {
            (Some(url), "") => url.clone(),
            _ => self.api.url(&format!(
                "/api/deposit/depositions/{}{}",
                self.data.id, suffix
            )),
        }
    }

    fn action_url(&self, action: &str, link: Option<&String>) -> String {
        match link {
            Some(url) => url.clone(),
            None => self.url(&format!("/actions/{action}")),
        }
    }

    async fn action(&mut self, action: &str, link: Option<String>) -> Result<&mut Self> {
        let url = self.action_url(action, link.as_ref());
        debug!(action, "deposition action");
        let data = self.api.post(&url, None).await?;
        self.data = data;
        Ok(self)
    }

    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn refresh(&mut self) -> Result<&mut Self> {
        let url = self.url("");
        let data = self.api.get(&url, &[]).await?;
        self.data = data;
        Ok(self)
    }

    /// Save the local metadata.
    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn update(&mut self) -> Result<&mut Self> {
        let url = self.url("");
        let body = json!({ "metadata": self.data.metadata });
        let data = self.api.put(&url, body).await?;
        self.data = data;
        Ok(self)
    }

    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn publish(&mut self) -> Result<&mut Self> {
        let link = self.data.links.publish.clone();
        self.action("publish", link).await?;
        info!(id = %self.data.id, "deposition published");
        Ok(self)
    }

    /// Unlock a published deposition for editing.
    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn edit(&mut self) -> Result<&mut Self> {
        let link = self.data.links.edit.clone();
        self.action("edit", link).await
    }

    /// Drop unsaved edits of a published deposition.
    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn discard(&mut self) -> Result<&mut Self> {
        let link = self.data.links.discard.clone();
        self.action("discard", link).await
    }

    /// Create a new version and return its draft deposition.
    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn new_version(&self) -> Result<Deposition> {
        let url = self.action_url("newversion", self.data.links.newversion.as_ref());
        let parent: DepositionData = self.api.post(&url, None).await?;
        let draft_url = parent.links.latest_draft.ok_or(Error::MissingLink {
            url,
            link: "latest_draft",
        })?;
        let data: DepositionData = self.api.get(&draft_url, &[]).await?;
        info!(id = %data.id, "new deposition version created");
        Ok(Deposition::from_data(self.api.clone(), data))
    }

    /// Delete an unpublished deposition.
    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn delete(self) -> Result<()> {
        let url = self.url("");
        self.api.delete(&url).await?;
        info!(id = %self.data.id, "deposition deleted");
        Ok(())
    }

    /// Upload `source` into the deposition's bucket, retrying the `PUT`.
    ///
    /// Unless `options.force` is set, a file already in the snapshot under
    /// the same name and checksum is skipped. On success the deposition is
    /// re-fetched so `data().files` lists the new file.
    #[instrument(skip(self, options), fields(id = %self.data.id))]
    pub async fn upload(
        &mut self,
        source: UploadSource,
        options: UploadOptions,
    ) -> Result<UploadOutcome> {
        let key = match &options.key {
            Some(key) => Some(key.clone()),
            None => source.default_key().ok(),
        };
        let existing = key
            .and_then(|key| self.data.files.iter().find(|f| f.filename == key))
            .map(DepositionFile::to_entry);

        let outcome = upload::upload_to_bucket(
            &self.api,
            self.data.links.bucket.as_deref(),
            existing.as_ref(),
            source,
            options,
        )
        .await?;

        if !outcome.is_skipped() {
            if let Err(e) = self.refresh().await {
                warn!(key = %outcome.entry.key, error = %e, "upload finished but the deposition could not be refreshed");
            }
        }
        Ok(outcome)
    }

    /// Delete a file by name.
    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn delete_file(&mut self, filename: &str) -> Result<()> {
        let file = self
            .data
            .files
            .iter()
            .find(|f| f.filename == filename)
            .ok_or_else(|| InvalidInputError::Field {
                name: "filename".to_string(),
                reason: format!("deposition {} has no file '{filename}'", self.data.id),
            })?;
        let url = match file.link("self") {
            Some(url) => url,
            None => self.url(&format!("/files/{}", file.id)),
        };

        self.api.delete(&url).await?;
        self.data.files.retain(|f| f.filename != filename);
        info!(filename, "deposition file deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn list_files(&self) -> Result<Vec<DepositionFile>> {
        let url = match &self.data.links.files {
            Some(url) => url.clone(),
            None => self.url("/files"),
        };
        self.api.get(&url, &[]).await
    }
}
