//! Archivist data model
//!
//! Typed records exchanged with an Archivist ledger service.
//!
//! # Core Concepts
//!
//! - [`Asset`]: Ledger-tracked record with attributes and a proof mechanism
//! - [`Event`]: Recorded change against an asset
//! - [`Subject`]: Identity record that can be granted access
//! - [`AccessPolicy`]: Filter + permissions granting subjects visibility into assets
//! - [`Filter`]: OR-groups of `attributes.<key>=<value>` predicates, ANDed together
//! - [`ConfirmationStatus`]: Asynchronous settlement state shared by assets, events and subjects
//!
//! # Example
//!
//! ```rust
//! use archivist_model::{Filter, Predicate};
//!
//! let filter = Filter::open()
//!     .and_any_of(["attributes.arc_display_type=door".parse::<Predicate>().unwrap()]);
//! assert_eq!(filter.groups().len(), 1);
//! ```

#![warn(unreachable_pub)]

mod access_policy;
mod asset;
mod attributes;
mod confirmation;
mod error;
mod event;
mod filter;
mod location;
mod subject;

pub use access_policy::{AccessPermission, AccessPolicy, UserAttributeGroup};
pub use asset::{Asset, ProofMechanism, BEHAVIOURS};
pub use attributes::{
    is_reserved_key, Attributes, ARC_DESCRIPTION, ARC_DISPLAY_NAME, ARC_DISPLAY_TYPE,
    ARC_NAMESPACE,
};
pub use confirmation::{allowed_transitions, validate_transition, Confirmable, ConfirmationStatus};
pub use error::ModelError;
pub use event::Event;
pub use filter::{Filter, FilterGroup, Predicate, PredicateTarget, ATTRIBUTES_PREFIX};
pub use location::Location;
pub use subject::{Subject, SELF_SUBJECT_ID};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
