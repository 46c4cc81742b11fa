//! Query parameters for listing endpoints.

use crate::Result;
use crate::types::{DepositionSort, DepositionStatus, RecordSort};

type Params = Vec<(&'static str, String)>;

fn push_common(params: &mut Params, q: &Option<String>, size: Option<u32>) {
    if let Some(q) = q {
        params.push(("q", q.clone()));
    }
    if let Some(size) = size {
        params.push(("size", size.to_string()));
    }
}

/// Search over records, or over the caller's drafts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub q: Option<String>,
    pub sort: Option<RecordSort>,
    /// Page size.
    pub size: Option<u32>,
    pub all_versions: bool,
    /// Further pages to fetch after the first.
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn q(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    /// Set the sort order from its wire value.
    pub fn sort(mut self, sort: &str) -> Result<Self> {
        self.sort = Some(sort.parse()?);
        Ok(self)
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn all_versions(mut self, all_versions: bool) -> Self {
        self.all_versions = all_versions;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn params(&self) -> Params {
        let mut params = Vec::new();
        push_common(&mut params, &self.q, self.size);
        if let Some(sort) = self.sort {
            params.push(("sort", sort.to_string()));
        }
        params.push(("page", "1".to_string()));
        if self.all_versions {
            params.push(("allversions", "true".to_string()));
        }
        params
    }
}

/// Search over the caller's legacy depositions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositionQuery {
    pub q: Option<String>,
    pub status: Option<DepositionStatus>,
    pub sort: Option<DepositionSort>,
    pub size: Option<u32>,
    pub all_versions: bool,
    pub limit: Option<usize>,
}

impl DepositionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn q(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    /// Set the status filter from its wire value.
    pub fn status(mut self, status: &str) -> Result<Self> {
        self.status = Some(status.parse()?);
        Ok(self)
    }

    /// Set the sort order from its wire value.
    pub fn sort(mut self, sort: &str) -> Result<Self> {
        self.sort = Some(sort.parse()?);
        Ok(self)
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn all_versions(mut self, all_versions: bool) -> Self {
        self.all_versions = all_versions;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn params(&self, page: u32) -> Params {
        let mut params = Vec::new();
        push_common(&mut params, &self.q, self.size);
        if let Some(status) = self.status {
            params.push(("status", status.to_string()));
        }
        if let Some(sort) = self.sort {
            params.push(("sort", sort.to_string()));
        }
        params.push(("page", page.to_string()));
        if self.all_versions {
            params.push(("all_versions", "true".to_string()));
        }
        params
    }
}

/// Search over the license vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LicenseQuery {
    pub q: Option<String>,
    pub size: Option<u32>,
    pub limit: Option<usize>,
}

impl LicenseQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn q(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn params(&self) -> Params {
        let mut params = Vec::new();
        push_common(&mut params, &self.q, self.size);
        params.push(("page", "1".to_string()));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_params() {
        let query = RecordQuery::new()
            .q("title:soil")
            .sort("newest")
            .unwrap()
            .size(25)
            .all_versions(true);
        assert_eq!(
            query.params(),
            vec![
                ("q", "title:soil".to_string()),
                ("size", "25".to_string()),
                ("sort", "newest".to_string()),
                ("page", "1".to_string()),
                ("allversions", "true".to_string()),
            ]
        );
    }

    #[test]
    fn deposition_params_use_snake_case_flag() {
        let query = DepositionQuery::new()
            .status("draft")
            .unwrap()
            .sort("-mostrecent")
            .unwrap()
            .all_versions(true);
        let params = query.params(3);
        assert!(params.contains(&("status", "draft".to_string())));
        assert!(params.contains(&("sort", "-mostrecent".to_string())));
        assert!(params.contains(&("page", "3".to_string())));
        assert!(params.contains(&("all_versions", "true".to_string())));
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(RecordQuery::new().sort("mostrecent").is_err());
        assert!(DepositionQuery::new().status("archived").is_err());
        assert!(DepositionQuery::new().sort("newest").is_err());
    }
}
