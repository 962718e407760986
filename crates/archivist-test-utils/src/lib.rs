//! Testing utilities for the Archivist workspace
//!
//! In-memory service, tenant handles wired to it, and shared fixtures.

#![allow(missing_docs)]

mod ledger;
mod query;

pub use ledger::{InMemoryLedger, LedgerTransport};
pub use query::DEFAULT_PAGE_SIZE;

use archivist_client::{Archivist, ArchivistConfig, AssetRequest, BackoffPolicy};
use archivist_model::{AccessPermission, Filter, Predicate};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_URL: &str = "https://ledger.test";

/// Config with millisecond polling and a short budget
pub fn fast_config() -> ArchivistConfig {
    ArchivistConfig::new(TEST_URL)
        .with_backoff(
            BackoffPolicy::default()
                .with_initial_interval(Duration::from_millis(1))
                .with_max_interval(Duration::from_millis(8)),
        )
        .with_max_time(Duration::from_secs(2))
}

/// Handle for `tenant` on `ledger`
pub fn tenant(ledger: &Arc<InMemoryLedger>, name: &str) -> Archivist {
    Archivist::with_transport(Arc::new(ledger.transport(name)), fast_config())
}

/// Asset carrying the attributes the acme policy filters on
pub fn acme_asset(display_name: &str) -> AssetRequest {
    AssetRequest::new()
        .attr("arc_display_name", display_name)
        .attr("arc_display_type", "acme_display_type")
        .attr("ext_vendor_name", "acme")
        .attr("serial", "SN-1")
}

/// Filter: display type AND vendor
pub fn acme_filter() -> Filter {
    Filter::open()
        .and_any_of([Predicate::attribute("arc_display_type", "acme_display_type")])
        .and_any_of([Predicate::attribute("ext_vendor_name", "acme")])
}

/// Permission for `subject` to see display name and vendor
pub fn acme_permission(subject: &str) -> AccessPermission {
    AccessPermission::for_subjects([subject])
        .with_behaviours(["RecordEvidence"])
        .with_include_attributes(["arc_display_name", "ext_vendor_name"])
}
