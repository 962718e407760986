//! Endpoint clients
//!
//! Each client borrows an [`Archivist`](crate::Archivist) and covers one
//! collection of the service.
//!
//! | client | path |
//! |---|---|
//! | [`AssetsClient`] | `v2/assets` |
//! | [`EventsClient`] | `v2/assets/<id>/events`, `v2/publicassets/<id>/events` |
//! | [`AccessPoliciesClient`] | `iam/v1/access_policies` |
//! | [`SubjectsClient`] | `iam/v1/subjects` |
//! | [`LocationsClient`] | `v2/locations` |

mod access_policies;
mod assets;
mod events;
mod locations;
mod subjects;

pub use access_policies::AccessPoliciesClient;
pub use assets::{AssetRequest, AssetsClient, HOME_LOCATION};
pub use events::{EventRequest, EventsClient};
pub use locations::LocationsClient;
pub use subjects::SubjectsClient;

/// `v2` collections
pub(crate) const V2: &str = "v2";
/// Identity and access collections
pub(crate) const IAM_V1: &str = "iam/v1";

/// `<subpath>/<identity>`
pub(crate) fn resource_path(subpath: &str, identity: &str) -> String {
    format!("{subpath}/{}", identity.trim_start_matches('/'))
}
