//! Drafts and published records.
//!
//! Both share one JSON shape, [`RecordData`], and the read-only accessors of
//! [`RepositoryItem`]. A [`Draft`] can be edited, uploaded to and published;
//! a [`Record`] can be reopened for editing or versioned.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::access::Access;
use crate::error::InvalidInputError;
use crate::files::{DraftFiles, RecordFiles};
use crate::types::RecordId;
use crate::upload::{UploadOptions, UploadOutcome, UploadSource};
use crate::{Api, Result};

/// Fields sent back on every [`Draft::update`].
const UPDATE_FIELDS: &[&str] = &["access", "files", "metadata"];

/// The `files` options object of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl Default for FilesOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            extra: Map::new(),
        }
    }
}

/// A persistent identifier entry under `pids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pid {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Links of a record or draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordLinks {
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_draft: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl RecordLinks {
    /// Look up any link by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "self" => self.self_.as_deref(),
            "self_html" => self.self_html.as_deref(),
            "files" => self.files.as_deref(),
            "publish" => self.publish.as_deref(),
            "draft" => self.draft.as_deref(),
            "record" => self.record.as_deref(),
            "latest" => self.latest.as_deref(),
            "latest_draft" => self.latest_draft.as_deref(),
            "versions" => self.versions.as_deref(),
            other => self.other.get(other).and_then(Value::as_str),
        }
    }
}

/// Snapshot of a record or draft as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordData {
    pub id: RecordId,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<FilesOptions>,
    #[serde(default)]
    pub links: RecordLinks,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub conceptrecid: Option<RecordId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pids: BTreeMap<String, Pid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_draft: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<u64>,
    /// Custom and unknown top-level fields, kept for round-tripping.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An empty string means "no concept id yet".
fn deserialize_optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<RecordId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(value) => RecordId::deserialize(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Read-only view shared by drafts and records.
pub trait RepositoryItem {
    /// The current snapshot.
    fn data(&self) -> &RecordData;

    /// The API handle this item issues requests through.
    fn api(&self) -> &Api;

    fn id(&self) -> &RecordId {
        &self.data().id
    }

    fn metadata(&self) -> &Map<String, Value> {
        &self.data().metadata
    }

    fn access(&self) -> Option<&Access> {
        self.data().access.as_ref()
    }

    fn links(&self) -> &RecordLinks {
        &self.data().links
    }

    fn concept_id(&self) -> Option<&RecordId> {
        self.data().conceptrecid.as_ref()
    }

    /// DOI from `pids.doi.identifier`.
    fn doi(&self) -> Option<&str> {
        self.data().pids.get("doi").map(|pid| pid.identifier.as_str())
    }

    fn title(&self) -> Option<&str> {
        self.metadata().get("title").and_then(Value::as_str)
    }

    /// Whether the server reports the record as published.
    fn is_published(&self) -> bool {
        self.data().is_published.unwrap_or(false)
    }

    fn created(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.data().created.as_deref())
    }

    fn updated(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.data().updated.as_deref())
    }

    /// Write the snapshot to `path` as pretty JSON.
    fn save_json(&self, path: &Path) -> Result<()> {
        crate::state::write_snapshot(path, self.data())
    }
}

/// An unpublished, editable record.
#[derive(Debug, Clone)]
pub struct Draft {
    data: RecordData,
    api: Api,
    files: DraftFiles,
}

impl Draft {
    /// Wrap a snapshot. The file listing starts empty; see [`Draft::load`].
    pub fn from_data(api: Api, data: RecordData) -> Self {
        let files = DraftFiles::new(api.clone(), draft_files_url(&data));
        Self { data, api, files }
    }

    /// Wrap a snapshot and fetch its file listing.
    pub async fn load(api: Api, data: RecordData) -> Result<Self> {
        let mut draft = Self::from_data(api, data);
        draft.files.refresh().await?;
        Ok(draft)
    }

    /// Mutable access to the snapshot, for local edits before [`Draft::update`].
    pub fn data_mut(&mut self) -> &mut RecordData {
        &mut self.data
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data.metadata
    }

    pub fn set_access(&mut self, access: Access) {
        self.data.access = Some(access);
    }

    /// A draft of a record that was already published, i.e. an edit in progress.
    pub fn is_editing(&self) -> bool {
        self.data.is_published.unwrap_or(false)
    }

    pub fn files(&self) -> &DraftFiles {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut DraftFiles {
        &mut self.files
    }

    fn self_url(&self) -> String {
        match &self.data.links.self_ {
            Some(url) => url.clone(),
            None => self.api.url(&format!("/api/records/{}/draft", self.data.id)),
        }
    }

    /// Replace the snapshot with the server's copy, discarding local edits.
    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn refresh(&mut self) -> Result<&mut Self> {
        let url = self.self_url();
        let data = self.api.get(&url, &[]).await?;
        self.replace(data);
        Ok(self)
    }

    /// Save `access`, `files`, `metadata` and the named extra top-level fields.
    ///
    /// Every extra field must exist in the snapshot; otherwise nothing is sent.
    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn update(&mut self, extra_fields: &[&str]) -> Result<&mut Self> {
        let snapshot = serde_json::to_value(&self.data)?;
        let Value::Object(snapshot) = snapshot else {
            return Err(InvalidInputError::Other {
                message: "draft snapshot is not a JSON object".to_string(),
            }
            .into());
        };

        let mut body = Map::new();
        for field in UPDATE_FIELDS {
            if let Some(value) = snapshot.get(*field) {
                body.insert((*field).to_string(), value.clone());
            }
        }
        for field in extra_fields {
            let value = snapshot.get(*field).ok_or_else(|| InvalidInputError::Field {
                name: (*field).to_string(),
                reason: "not present in the draft".to_string(),
            })?;
            body.insert((*field).to_string(), value.clone());
        }

        let url = self.self_url();
        debug!(fields = ?body.keys().collect::<Vec<_>>(), "updating draft");
        let data = self.api.put(&url, Value::Object(body)).await?;
        self.replace(data);
        Ok(self)
    }

    /// Publish the draft and return the resulting record.
    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn publish(self) -> Result<Record> {
        let url = match &self.data.links.publish {
            Some(url) => url.clone(),
            None => self
                .api
                .url(&format!("/api/records/{}/draft/actions/publish", self.data.id)),
        };
        let data: RecordData = self.api.post(&url, None).await?;
        info!(id = %data.id, "draft published");
        Ok(Record::from_data(self.api, data))
    }

    /// Discard the draft on the server.
    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn delete(self) -> Result<()> {
        let url = self.self_url();
        self.api.delete(&url).await?;
        info!(id = %self.data.id, "draft deleted");
        Ok(())
    }

    /// Upload a file into this draft. See [`crate::upload`].
    pub async fn upload(
        &mut self,
        source: UploadSource,
        options: UploadOptions,
    ) -> Result<UploadOutcome> {
        self.files.upload(source, options).await
    }

    fn replace(&mut self, data: RecordData) {
        self.files.set_url(draft_files_url(&data));
        self.data = data;
    }
}

impl RepositoryItem for Draft {
    fn data(&self) -> &RecordData {
        &self.data
    }

    fn api(&self) -> &Api {
        &self.api
    }
}

fn draft_files_url(data: &RecordData) -> String {
    data.links
        .files
        .clone()
        .unwrap_or_else(|| format!("/api/records/{}/draft/files", data.id))
}

/// A published record.
#[derive(Debug, Clone)]
pub struct Record {
    data: RecordData,
    api: Api,
}

impl Record {
    pub fn from_data(api: Api, data: RecordData) -> Self {
        Self { data, api }
    }

    fn path(&self, suffix: &str) -> String {
        self.api
            .url(&format!("/api/records/{}{}", self.data.id, suffix))
    }

    /// Replace the snapshot with the server's copy.
    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn refresh(&mut self) -> Result<&mut Self> {
        let url = self.path("");
        let data = self.api.get(&url, &[]).await?;
        self.data = data;
        Ok(self)
    }

    /// Open a draft to edit this record.
    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn edit(&self) -> Result<Draft> {
        let url = self.path("/draft");
        let data: RecordData = self.api.post(&url, None).await?;
        Draft::load(self.api.clone(), data).await
    }

    /// Create a new version of this record, returned as a draft.
    #[instrument(skip(self), fields(id = %self.data.id))]
    pub async fn new_version(&self) -> Result<Draft> {
        let url = self.path("/versions");
        let data: RecordData = self.api.post(&url, None).await?;
        info!(id = %data.id, "new version draft created");
        Draft::load(self.api.clone(), data).await
    }

    /// Fetch the published file listing.
    pub async fn files(&self) -> Result<RecordFiles> {
        let url = self
            .data
            .links
            .files
            .clone()
            .unwrap_or_else(|| self.path("/files"));
        let mut files = RecordFiles::new(self.api.clone(), url);
        files.refresh().await?;
        Ok(files)
    }
}

impl RepositoryItem for Record {
    fn data(&self) -> &RecordData {
        &self.data
    }

    fn api(&self) -> &Api {
        &self.api
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_support::{BASE, MockTransport};
    use crate::transport::{Body, Method};
    use serde_json::json;

    fn draft_json(id: &str, title: &str) -> Value {
        json!({
            "id": id,
            "metadata": {"title": title},
            "access": {"record": "public", "files": "public"},
            "files": {"enabled": true},
            "links": {
                "self": format!("{BASE}/api/records/{id}/draft"),
                "files": format!("{BASE}/api/records/{id}/draft/files"),
                "publish": format!("{BASE}/api/records/{id}/draft/actions/publish"),
            },
            "conceptrecid": "",
            "pids": {"doi": {"identifier": "10.5281/zenodo.123", "provider": "datacite"}},
            "is_published": false,
            "custom_fields": {"code:programmingLanguage": ["rust"]},
        })
    }

    fn draft(mock: &MockTransport, id: &str) -> Draft {
        Draft::from_data(
            mock.api(),
            serde_json::from_value(draft_json(id, "Local")).unwrap(),
        )
    }

    #[test]
    fn accessors() {
        let mock = MockTransport::new();
        let draft = draft(&mock, "abc-123");
        assert_eq!(draft.id().as_str(), "abc-123");
        assert_eq!(draft.title(), Some("Local"));
        assert_eq!(draft.doi(), Some("10.5281/zenodo.123"));
        assert_eq!(draft.concept_id(), None);
        assert!(!draft.is_published());
        assert!(!draft.is_editing());
        assert!(draft.access().unwrap().is_public());
        assert!(draft.data().extra.contains_key("custom_fields"));
    }

    #[test]
    fn unknown_fields_round_trip() {
        let raw = draft_json("abc-123", "T");
        let data: RecordData = serde_json::from_value(raw).unwrap();
        let back = serde_json::to_value(&data).unwrap();
        assert_eq!(back["custom_fields"]["code:programmingLanguage"][0], "rust");
        assert!(back.get("status").is_none());
    }

    #[tokio::test]
    async fn refresh_replaces_snapshot() {
        let mock = MockTransport::new();
        let url = format!("{BASE}/api/records/abc-123/draft");
        mock.on(Method::Get, &url, 200, draft_json("abc-123", "Server"));
        let mut draft = draft(&mock, "abc-123");
        draft.metadata_mut().insert("title".into(), json!("Unsaved"));

        draft.refresh().await.unwrap();
        assert_eq!(draft.title(), Some("Server"));
        assert_eq!(mock.count(Method::Get, &url), 1);
    }

    #[tokio::test]
    async fn update_sends_fixed_fields_and_extras() {
        let mock = MockTransport::new();
        let url = format!("{BASE}/api/records/abc-123/draft");
        mock.on(Method::Put, &url, 200, draft_json("abc-123", "Saved"));
        let mut draft = draft(&mock, "abc-123");

        draft.update(&["custom_fields"]).await.unwrap();

        let call = &mock.calls()[0];
        let Body::Json(body) = &call.body else {
            panic!("expected JSON body");
        };
        let mut keys: Vec<_> = body.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["access", "custom_fields", "files", "metadata"]);
        assert_eq!(draft.title(), Some("Saved"));
    }

    #[tokio::test]
    async fn update_with_unknown_field_sends_nothing() {
        let mock = MockTransport::new();
        let mut draft = draft(&mock, "abc-123");

        let err = draft.update(&["nonexistent"]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidInput(InvalidInputError::Field { .. })
        ));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn publish_returns_record() {
        let mock = MockTransport::new();
        let mut published = draft_json("abc-123", "Done");
        published["is_published"] = json!(true);
        mock.on(
            Method::Post,
            &format!("{BASE}/api/records/abc-123/draft/actions/publish"),
            202,
            published,
        );

        let record = draft(&mock, "abc-123").publish().await.unwrap();
        assert!(record.is_published());
        assert_eq!(record.title(), Some("Done"));
    }

    #[tokio::test]
    async fn delete_hits_self_link_once() {
        let mock = MockTransport::new();
        let url = format!("{BASE}/api/records/abc-123/draft");
        mock.on(Method::Delete, &url, 204, Value::Null);

        draft(&mock, "abc-123").delete().await.unwrap();
        assert_eq!(mock.count(Method::Delete, &url), 1);
    }

    #[tokio::test]
    async fn failing_publish_propagates_api_error() {
        let mock = MockTransport::new();
        mock.on(
            Method::Post,
            &format!("{BASE}/api/records/abc-123/draft/actions/publish"),
            400,
            json!({"message": "A validation error occurred.",
                   "errors": [{"field": "metadata.creators", "messages": ["Missing data for required field."]}]}),
        );

        let err = draft(&mock, "abc-123").publish().await.unwrap_err();
        assert_eq!(
            err.as_api().unwrap().description,
            "A validation error occurred. Field 'metadata.creators'. Missing data for required field."
        );
    }

    #[tokio::test]
    async fn record_edit_and_new_version() {
        let mock = MockTransport::new();
        let mut published = draft_json("abc-123", "Published");
        published["is_published"] = json!(true);
        let record = Record::from_data(mock.api(), serde_json::from_value(published.clone()).unwrap());

        mock.on(
            Method::Post,
            &format!("{BASE}/api/records/abc-123/draft"),
            201,
            published,
        );
        mock.on(
            Method::Get,
            &format!("{BASE}/api/records/abc-123/draft/files"),
            200,
            json!({"enabled": true, "entries": []}),
        );
        mock.on(
            Method::Post,
            &format!("{BASE}/api/records/abc-123/versions"),
            201,
            draft_json("def-456", "Published"),
        );
        mock.on(
            Method::Get,
            &format!("{BASE}/api/records/def-456/draft/files"),
            200,
            json!({"enabled": true, "entries": []}),
        );

        let editing = record.edit().await.unwrap();
        assert!(editing.is_editing());
        let next = record.new_version().await.unwrap();
        assert_eq!(next.id().as_str(), "def-456");
    }

    #[test]
    fn timestamps_parse() {
        let mut raw = draft_json("abc-123", "T");
        raw["created"] = json!("2024-03-01T10:00:00.123456+00:00");
        let mock = MockTransport::new();
        let draft = Draft::from_data(mock.api(), serde_json::from_value(raw).unwrap());
        assert_eq!(draft.created().unwrap().to_rfc3339(), "2024-03-01T10:00:00.123456+00:00");
        assert!(draft.updated().is_none());
    }
}
