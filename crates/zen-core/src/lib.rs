//! zen-core - Zenodo / InvenioRDM client library.
//!
//! All requests flow through an [`Api`] handle built from an [`ApiConfig`]
//! and a [`Transport`]. The [`Client`] offers listings and lookups; the
//! entities it returns ([`Draft`], [`Record`], [`Deposition`]) carry a clone
//! of the handle and issue their own follow-up requests.
//!
//! This crate has no HTTP stack of its own; `zen-http` provides the
//! production transport.
//!
//! # Example
//!
//! ```no_run
//! use zen_core::{AccessToken, Api, ApiConfig, BaseUrl, Client, DraftOptions, UploadOptions, UploadSource};
//!
//! # async fn example(transport: impl zen_core::Transport + 'static) -> zen_core::Result<()> {
//! let config = ApiConfig::new(BaseUrl::sandbox()).with_token(AccessToken::new("..."));
//! let client = Client::new(Api::new(config, transport));
//!
//! let mut draft = client.create_draft(DraftOptions::default()).await?;
//! draft.metadata_mut().insert("title".into(), "Soil samples".into());
//! draft.update(&[]).await?;
//!
//! let source = UploadSource::parse("samples.csv")?;
//! draft.upload(source, UploadOptions::default()).await?;
//! let record = draft.publish().await?;
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod api;
pub mod checksum;
pub mod client;
pub mod deposition;
pub mod error;
pub mod files;
pub mod license;
pub mod pagination;
pub mod query;
pub mod record;
pub mod state;
pub mod token;
pub mod transport;
pub mod types;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export primary types at crate root for convenience
pub use access::{Access, AccessLevel, Embargo};
pub use api::{Api, ApiConfig};
pub use client::{Client, DraftOptions};
pub use deposition::{Deposition, DepositionData, DepositionFile};
pub use error::{ApiError, Error};
pub use files::{DraftFiles, FileEntry, FileStatus, RecordFiles};
pub use license::License;
pub use pagination::{Page, Pages};
pub use query::{DepositionQuery, LicenseQuery, RecordQuery};
pub use record::{Draft, Record, RecordData, RepositoryItem};
pub use token::{AccessToken, TokenPlacement};
pub use transport::{Body, FileBody, Method, Request, Response, Transport};
pub use types::{BaseUrl, DepositionSort, DepositionStatus, RecordId, RecordSort};
pub use upload::{UploadOptions, UploadOutcome, UploadSource, UploadState};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
