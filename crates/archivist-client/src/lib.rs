//! Archivist client
//!
//! Async client for an Archivist ledger service. One [`Archivist`] handle per
//! tenant; endpoint clients hang off it.
//!
//! # Core Concepts
//!
//! - [`Archivist`]: Tenant handle bound to a URL and credential
//! - [`Transport`]: Seam every request goes through; [`HttpTransport`] in production
//! - [`ConfirmationWaiter`]: Capped exponential polling until CONFIRMED, FAILED or `max_time`
//! - [`SubjectImportCoordinator`]: Mirrors a subject from one tenant into another
//! - [`ArchivistConfig`]: URL, credential file, confirmation budget and backoff
//!
//! # Example
//!
//! ```rust,no_run
//! use archivist_client::{Archivist, ArchivistConfig, AssetRequest};
//!
//! # async fn run() -> Result<(), archivist_client::ArchivistError> {
//! let archivist = Archivist::new(ArchivistConfig::new("https://app.example.io"), "token")?;
//! let asset = archivist
//!     .assets()
//!     .create(AssetRequest::new().attr("arc_display_name", "Front door"), true)
//!     .await?;
//! println!("{} is {:?}", asset.identity, asset.confirmation_status);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod archivist;
mod config;
mod confirmer;
mod coordinator;
mod endpoints;
mod error;
mod http;
pub mod logging;
mod params;
mod transport;

pub use archivist::Archivist;
pub use config::{ArchivistConfig, BackoffPolicy, DEFAULT_MAX_TIME_SECS};
pub use confirmer::{ConfirmationWaiter, Probe, ResourceReader};
pub use coordinator::{decode_b64_subject, encode_b64_subject, SubjectImportCoordinator};
pub use endpoints::{
    AccessPoliciesClient, AssetRequest, AssetsClient, EventRequest, EventsClient,
    LocationsClient, SubjectsClient, HOME_LOCATION,
};
pub use error::{ArchivistError, ArchivistResult, TransportError};
pub use http::{HttpTransport, RATE_LIMIT_RESET, REQUEST_TOTAL_COUNT, TOTAL_COUNT};
pub use params::{deep_merge, flatten_params, Criteria};
pub use transport::{Method, Request, Response, Transport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
