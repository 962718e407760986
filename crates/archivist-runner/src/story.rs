//! Story documents
//!
//! A story is a YAML document with a `steps:` list. Each entry carries a
//! `step:` header and the action's keyword arguments next to it:
//!
//! ```yaml
//! steps:
//!   - step:
//!       action: ASSETS_CREATE_IF_NOT_EXISTS
//!       description: Create the front door
//!       asset_label: front door
//!       wait_for_confirmation: true
//!     selector:
//!       - attributes:
//!         - arc_display_name
//!     attributes:
//!       arc_display_name: Front door
//! ```
//!
//! Parsing resolves every action name up front, so a story with a typo fails
//! before anything reaches the service.

use crate::error::{RunnerError, RunnerResult};
use crate::labels::EntityKind;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::{self, Display};
use std::path::Path;
use std::str::FromStr;

macro_rules! actions {
    ($($variant:ident => $name:literal,)+) => {
        /// Operation a step performs
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(missing_docs)]
        pub enum Action {
            $($variant,)+
        }

        impl Action {
            /// Every supported action
            pub const ALL: &'static [Action] = &[$(Action::$variant,)+];

            /// Name used in story files
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl FromStr for Action {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(other.to_string()),
                }
            }
        }
    };
}

actions! {
    AssetsCreate => "ASSETS_CREATE",
    AssetsCreateIfNotExists => "ASSETS_CREATE_IF_NOT_EXISTS",
    AssetsCount => "ASSETS_COUNT",
    AssetsList => "ASSETS_LIST",
    AssetsWaitForConfirmed => "ASSETS_WAIT_FOR_CONFIRMED",
    EventsCreate => "EVENTS_CREATE",
    EventsCount => "EVENTS_COUNT",
    EventsList => "EVENTS_LIST",
    AccessPoliciesCreate => "ACCESS_POLICIES_CREATE",
    AccessPoliciesRead => "ACCESS_POLICIES_READ",
    AccessPoliciesUpdate => "ACCESS_POLICIES_UPDATE",
    AccessPoliciesDelete => "ACCESS_POLICIES_DELETE",
    AccessPoliciesList => "ACCESS_POLICIES_LIST",
    AccessPoliciesCountMatchingAccessPolicies => "ACCESS_POLICIES_COUNT_MATCHING_ACCESS_POLICIES",
    AccessPoliciesListMatchingAccessPolicies => "ACCESS_POLICIES_LIST_MATCHING_ACCESS_POLICIES",
    AccessPoliciesCountMatchingAssets => "ACCESS_POLICIES_COUNT_MATCHING_ASSETS",
    AccessPoliciesListMatchingAssets => "ACCESS_POLICIES_LIST_MATCHING_ASSETS",
    SubjectsCreate => "SUBJECTS_CREATE",
    SubjectsCreateFromB64 => "SUBJECTS_CREATE_FROM_B64",
    SubjectsRead => "SUBJECTS_READ",
    SubjectsUpdate => "SUBJECTS_UPDATE",
    SubjectsDelete => "SUBJECTS_DELETE",
    SubjectsList => "SUBJECTS_LIST",
    SubjectsCount => "SUBJECTS_COUNT",
    SubjectsWait => "SUBJECTS_WAIT",
    LocationsCreateIfNotExists => "LOCATIONS_CREATE_IF_NOT_EXISTS",
    LocationsRead => "LOCATIONS_READ",
    LocationsList => "LOCATIONS_LIST",
    LocationsCount => "LOCATIONS_COUNT",
}

impl Action {
    /// Kind of labelled entity this action creates, if any
    ///
    /// Events are recorded against the asset named by `asset_label` and are
    /// not labelled themselves.
    #[must_use]
    pub fn creates(&self) -> Option<EntityKind> {
        match self {
            Self::AssetsCreate | Self::AssetsCreateIfNotExists => Some(EntityKind::Asset),
            Self::AccessPoliciesCreate => Some(EntityKind::AccessPolicy),
            Self::SubjectsCreate | Self::SubjectsCreateFromB64 => Some(EntityKind::Subject),
            Self::LocationsCreateIfNotExists => Some(EntityKind::Location),
            _ => None,
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `step:` block as written
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHeader {
    action: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    print_response: bool,
    #[serde(default)]
    wait_for_confirmation: bool,
    #[serde(default)]
    asset_label: Option<String>,
    #[serde(default)]
    subject_label: Option<String>,
    #[serde(default)]
    location_label: Option<String>,
    #[serde(default)]
    access_policy_label: Option<String>,
    #[serde(default)]
    delete: bool,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    step: RawHeader,
    #[serde(flatten)]
    args: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStory {
    #[serde(default)]
    fixtures: Option<Value>,
    steps: Vec<RawStep>,
}

/// One resolved step
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// 1-based position in the story
    pub number: usize,
    /// Operation
    pub action: Action,
    /// Free text, logged when the step starts
    pub description: Option<String>,
    /// Print the response on completion
    pub print_response: bool,
    /// Wait for the created entity to be CONFIRMED
    pub wait_for_confirmation: bool,
    /// Asset registered by, or targeted by, this step
    pub asset_label: Option<String>,
    /// Subject registered by, or targeted by, this step
    pub subject_label: Option<String>,
    /// Location registered by, or targeted by, this step
    pub location_label: Option<String>,
    /// Access policy registered by, or targeted by, this step
    pub access_policy_label: Option<String>,
    /// Delete the created entity after the last step
    pub delete: bool,
    /// Keyword arguments
    pub args: Map<String, Value>,
}

impl Step {
    /// Label this step uses for entities of `kind`
    #[must_use]
    pub fn label_for(&self, kind: EntityKind) -> Option<&str> {
        match kind {
            EntityKind::Asset => self.asset_label.as_deref(),
            EntityKind::Subject => self.subject_label.as_deref(),
            EntityKind::Location => self.location_label.as_deref(),
            EntityKind::AccessPolicy => self.access_policy_label.as_deref(),
        }
    }

    fn resolve(number: usize, raw: RawStep) -> RunnerResult<Self> {
        let RawStep { step, args } = raw;
        let action: Action = step
            .action
            .parse()
            .map_err(|action| RunnerError::UnknownAction { step: number, action })?;
        if step.delete && !matches!(action.creates(), Some(kind) if kind.is_deletable()) {
            return Err(RunnerError::NotDeletable { step: number, action });
        }
        Ok(Self {
            number,
            action,
            description: step.description,
            print_response: step.print_response,
            wait_for_confirmation: step.wait_for_confirmation,
            asset_label: step.asset_label,
            subject_label: step.subject_label,
            location_label: step.location_label,
            access_policy_label: step.access_policy_label,
            delete: step.delete,
            args,
        })
    }
}

/// Parsed story
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Story {
    /// Per-label defaults merged into create bodies and list filters
    pub fixtures: Option<Value>,
    /// Steps in order
    pub steps: Vec<Step>,
}

impl Story {
    /// Parse a story from YAML
    ///
    /// # Errors
    /// Malformed YAML, an unknown action, or `delete` on an action whose entity
    /// cannot be deleted.
    pub fn from_yaml(source: &str) -> RunnerResult<Self> {
        let raw: RawStory = serde_yaml::from_str(source)?;
        let steps = raw
            .steps
            .into_iter()
            .enumerate()
            .map(|(i, step)| Step::resolve(i + 1, step))
            .collect::<RunnerResult<Vec<_>>>()?;
        Ok(Self {
            fixtures: raw.fixtures,
            steps,
        })
    }

    /// Read and parse a story file
    ///
    /// # Errors
    /// As [`from_yaml`](Self::from_yaml), or the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> RunnerResult<Self> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).map_err(|e| RunnerError::io_error(path, e))?;
        Self::from_yaml(&source)
    }

    /// Number of steps
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True if there are no steps
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
