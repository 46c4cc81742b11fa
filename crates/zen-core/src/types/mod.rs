//! Validated value types.
//!
//! These types enforce their invariants at construction time, so a value
//! that reaches the request layer is already known to be well formed.

mod base_url;
mod options;
mod record_id;

pub use base_url::{BaseUrl, SANDBOX_URL, ZENODO_URL};
pub use options::{DepositionSort, DepositionStatus, RecordSort};
pub use record_id::RecordId;
