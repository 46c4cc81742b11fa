//! zen-http - reqwest-backed transport for zen-core.
//!
//! ```no_run
//! use zen_core::{AccessToken, Api, ApiConfig, BaseUrl, Client};
//! use zen_http::ReqwestTransport;
//!
//! # fn example() -> zen_core::Result<()> {
//! let config = ApiConfig::new(BaseUrl::sandbox()).with_token(AccessToken::new("..."));
//! let client = Client::new(Api::new(config, ReqwestTransport::new()?));
//! # Ok(())
//! # }
//! ```

mod progress;
mod transport;

pub use transport::{
    DEFAULT_CONNECT_TIMEOUT, ReqwestTransport, ReqwestTransportBuilder, transport_error,
};
