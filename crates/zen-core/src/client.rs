//! Entry point for repository operations.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};

use crate::access::Access;
use crate::deposition::{Deposition, DepositionData};
use crate::license::License;
use crate::pagination::{Page, Pages};
use crate::query::{DepositionQuery, LicenseQuery, RecordQuery};
use crate::record::{Draft, Record, RecordData, RepositoryItem};
use crate::state;
use crate::types::RecordId;
use crate::{Api, Result};

/// Default path of the license vocabulary.
pub const LICENSES_PATH: &str = "/api/licenses";

/// Settings for a new draft.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftOptions {
    pub access: Access,
    pub files_enabled: bool,
}

impl Default for DraftOptions {
    fn default() -> Self {
        Self {
            access: Access::public(),
            files_enabled: true,
        }
    }
}

/// The legacy listing returns a bare array; newer deployments wrap it in a page.
#[derive(Deserialize)]
#[serde(untagged)]
enum DepositionListing {
    Items(Vec<DepositionData>),
    Page(Page<DepositionData>),
}

/// Repository client.
///
/// # Example
///
/// ```no_run
/// use zen_core::{Api, ApiConfig, BaseUrl, Client, RecordQuery};
/// # async fn example(transport: impl zen_core::Transport + 'static) -> zen_core::Result<()> {
/// let api = Api::new(ApiConfig::new(BaseUrl::sandbox()), transport);
/// let client = Client::new(api);
/// let records = client.search_records(&RecordQuery::new().q("soil")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    api: Api,
    licenses_path: String,
}

impl Client {
    pub fn new(api: Api) -> Self {
        Self {
            api,
            licenses_path: LICENSES_PATH.to_string(),
        }
    }

    /// Use another license vocabulary path, e.g. `/api/vocabularies/licenses`.
    pub fn with_licenses_path(mut self, path: impl Into<String>) -> Self {
        self.licenses_path = path.into();
        self
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    async fn first_page<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        limit: Option<usize>,
    ) -> Result<Pages<T>> {
        let first: Page<T> = self.api.get(path, params).await?;
        Ok(Pages::new(self.api.clone(), first, limit))
    }

    /// Lazily page through published records.
    #[instrument(skip(self))]
    pub async fn record_pages(&self, query: &RecordQuery) -> Result<Pages<RecordData>> {
        self.first_page("/api/records", &query.params(), query.limit)
            .await
    }

    /// Search published records and collect every page.
    pub async fn search_records(&self, query: &RecordQuery) -> Result<Vec<Record>> {
        let items = self.record_pages(query).await?.collect_items().await?;
        debug!(count = items.len(), "records collected");
        Ok(items
            .into_iter()
            .map(|data| Record::from_data(self.api.clone(), data))
            .collect())
    }

    /// Lazily page through the caller's drafts and records.
    #[instrument(skip(self))]
    pub async fn draft_pages(&self, query: &RecordQuery) -> Result<Pages<RecordData>> {
        self.first_page("/api/user/records", &query.params(), query.limit)
            .await
    }

    /// List the caller's drafts. File listings are not fetched.
    pub async fn list_drafts(&self, query: &RecordQuery) -> Result<Vec<Draft>> {
        let items = self.draft_pages(query).await?.collect_items().await?;
        Ok(items
            .into_iter()
            .map(|data| Draft::from_data(self.api.clone(), data))
            .collect())
    }

    /// Create an empty draft.
    #[instrument(skip(self))]
    pub async fn create_draft(&self, options: DraftOptions) -> Result<Draft> {
        let body = json!({
            "access": options.access,
            "files": { "enabled": options.files_enabled },
        });
        let data: RecordData = self.api.post("/api/records", Some(body)).await?;
        info!(id = %data.id, "new draft created");
        Draft::load(self.api.clone(), data).await
    }

    #[instrument(skip(self))]
    pub async fn get_draft(&self, id: &RecordId) -> Result<Draft> {
        let data: RecordData = self
            .api
            .get(&format!("/api/records/{id}/draft"), &[])
            .await?;
        Draft::load(self.api.clone(), data).await
    }

    #[instrument(skip(self))]
    pub async fn get_record(&self, id: &RecordId) -> Result<Record> {
        let data: RecordData = self.api.get(&format!("/api/records/{id}"), &[]).await?;
        Ok(Record::from_data(self.api.clone(), data))
    }

    /// Resume the draft pinned by `path`, or create one and pin it.
    ///
    /// An existing file only contributes its `id`; the draft is always
    /// fetched from the server.
    #[instrument(skip(self, options), fields(path = %path.display()))]
    pub async fn load_or_create_draft(&self, path: &Path, options: DraftOptions) -> Result<Draft> {
        match state::read_draft_id(path)? {
            Some(id) => {
                let draft = self.get_draft(&id).await?;
                info!(id = %id, "draft loaded");
                Ok(draft)
            }
            None => {
                let draft = self.create_draft(options).await?;
                draft.save_json(path)?;
                info!(id = %draft.id(), "draft saved");
                Ok(draft)
            }
        }
    }

    /// List the caller's legacy depositions.
    ///
    /// Follows `links.next` when the server pages its reply; otherwise
    /// requests `page=2, 3, ...` until an empty page.
    #[instrument(skip(self))]
    pub async fn list_depositions(&self, query: &DepositionQuery) -> Result<Vec<Deposition>> {
        let path = "/api/deposit/depositions";
        let listing: DepositionListing = self.api.get(path, &query.params(1)).await?;

        let items = match listing {
            DepositionListing::Page(first) => {
                Pages::new(self.api.clone(), first, query.limit)
                    .collect_items()
                    .await?
            }
            DepositionListing::Items(mut items) => {
                let mut page = 1;
                let mut batch_len = items.len();
                while batch_len > 0 && query.limit.is_none_or(|limit| page <= limit) {
                    page += 1;
                    let batch: Vec<DepositionData> =
                        self.api.get(path, &query.params(page as u32)).await?;
                    batch_len = batch.len();
                    items.extend(batch);
                }
                items
            }
        };

        Ok(items
            .into_iter()
            .map(|data| Deposition::from_data(self.api.clone(), data))
            .collect())
    }

    /// Create an empty deposition, optionally with metadata.
    #[instrument(skip(self, metadata))]
    pub async fn create_deposition(&self, metadata: Option<Map<String, Value>>) -> Result<Deposition> {
        let body = match metadata {
            Some(metadata) => json!({ "metadata": metadata }),
            None => json!({}),
        };
        let data: DepositionData = self
            .api
            .post("/api/deposit/depositions", Some(body))
            .await?;
        info!(id = %data.id, "new deposition created");
        Ok(Deposition::from_data(self.api.clone(), data))
    }

    #[instrument(skip(self))]
    pub async fn get_deposition(&self, id: &RecordId) -> Result<Deposition> {
        let data = self
            .api
            .get(&format!("/api/deposit/depositions/{id}"), &[])
            .await?;
        Ok(Deposition::from_data(self.api.clone(), data))
    }

    /// Lazily page through licenses.
    #[instrument(skip(self))]
    pub async fn license_pages(&self, query: &LicenseQuery) -> Result<Pages<License>> {
        self.first_page(&self.licenses_path, &query.params(), query.limit)
            .await
    }

    /// Search licenses and collect every page.
    pub async fn list_licenses(&self, query: &LicenseQuery) -> Result<Vec<License>> {
        self.license_pages(query).await?.collect_items().await
    }

    #[instrument(skip(self))]
    pub async fn get_license(&self, id: &str) -> Result<License> {
        self.api
            .get(&format!("{}/{}", self.licenses_path, id), &[])
            .await
    }
}
