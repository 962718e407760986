//! Archivist access policy evaluation
//!
//! Pure evaluation of access policy filters against assets, independent of
//! any transport.
//!
//! # Core Concepts
//!
//! - [`matches`]: AND over groups, OR over predicates, exact string equality
//! - [`Matchable`]: Anything a predicate can be evaluated against
//! - [`AccessPolicyMatcher`]: Snapshot of policies answering "which policies
//!   match this asset" and "which assets match this policy"
//! - [`Visibility`]: Attributes a set of subjects may observe on an asset
//!
//! # Example
//!
//! ```rust
//! use archivist_model::{Attributes, Filter, Predicate};
//!
//! let attrs = Attributes::new()
//!     .with("arc_display_type", "acme_display_type")
//!     .with("ext_vendor_name", "acme");
//! let filter = Filter::open()
//!     .and_any_of([Predicate::attribute("arc_display_type", "acme_display_type")])
//!     .and_any_of([Predicate::attribute("ext_vendor_name", "acme")]);
//!
//! assert!(archivist_policy::matches(&attrs, &filter));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod matcher;
mod redaction;

pub use matcher::{matches, predicate_holds, AccessPolicyMatcher, Matchable};
pub use redaction::{redact, visible_attributes, Visibility};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
