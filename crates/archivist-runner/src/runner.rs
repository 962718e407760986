//! Story execution
//!
//! Steps run strictly in order against one tenant. Entities created by a
//! step marked `delete: true` are deleted newest first once the steps are
//! done, including when a step fails part way.

use crate::error::{RunnerError, RunnerResult};
use crate::labels::{EntityKind, LabelRegistry};
use crate::story::{Action, Step, Story};
use archivist_client::{
    decode_b64_subject, Archivist, ArchivistError, AssetRequest, Criteria, EventRequest,
};
use archivist_model::{AccessPermission, Attributes, Filter};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::Instrument;

/// Arguments shared by record creation and filtered reads
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RecordArgs {
    identity: Option<String>,
    props: Map<String, Value>,
    attrs: Map<String, Value>,
    asset_attrs: Map<String, Value>,
    behaviours: Option<Vec<String>>,
}

impl RecordArgs {
    fn criteria(&self) -> Criteria {
        let criteria = self
            .props
            .iter()
            .fold(Criteria::new(), |c, (k, v)| c.prop(k.clone(), v.clone()));
        self.attrs
            .iter()
            .fold(criteria, |c, (k, v)| c.attr(k.clone(), v.clone()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PolicyArgs {
    identity: Option<String>,
    props: Map<String, Value>,
    filters: Option<Filter>,
    access_permissions: Option<Vec<AccessPermission>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SubjectArgs {
    identity: Option<String>,
    props: Map<String, Value>,
    display_name: Option<String>,
    wallet_pub_key: Option<Vec<String>>,
    tessera_pub_key: Option<Vec<String>>,
    base64_link: Option<String>,
}

/// Result of one completed step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    /// 1-based position in the story
    pub number: usize,
    /// Operation performed
    pub action: String,
    /// Step description, if any
    pub description: Option<String>,
    /// Whether the story asked for the response to be printed
    pub print_response: bool,
    /// Service response
    pub response: Value,
}

/// Everything a run produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Completed steps in order
    pub outcomes: Vec<StepOutcome>,
    /// Identities deleted after the last step, in deletion order
    pub deleted: Vec<String>,
}

/// Runs stories against one tenant
#[derive(Debug)]
pub struct StoryRunner {
    archivist: Archivist,
    labels: LabelRegistry,
    deferred: Vec<(EntityKind, String)>,
}

fn attributes(map: Map<String, Value>) -> Attributes {
    map.into_iter().collect()
}

fn to_value(value: impl Serialize) -> RunnerResult<Value> {
    Ok(serde_json::to_value(value)?)
}

impl StoryRunner {
    /// Runner for `archivist`
    #[must_use]
    pub fn new(archivist: Archivist) -> Self {
        Self {
            archivist,
            labels: LabelRegistry::new(),
            deferred: Vec::new(),
        }
    }

    /// Labels registered so far
    #[must_use]
    pub fn labels(&self) -> &LabelRegistry {
        &self.labels
    }

    /// Run every step, then the deferred deletions
    ///
    /// # Errors
    /// The first failing step. Deletions still run; their failures are logged
    /// and only reported when every step succeeded.
    pub async fn run(&mut self, story: &Story) -> RunnerResult<RunReport> {
        let archivist = match &story.fixtures {
            Some(fixtures) => self.archivist.clone().with_fixtures(fixtures.clone()),
            None => self.archivist.clone(),
        };
        tracing::info!(steps = story.len(), url = archivist.url(), "running story");

        let mut outcomes = Vec::with_capacity(story.len());
        let mut failure = None;
        for step in &story.steps {
            let span = tracing::info_span!("step", number = step.number, action = %step.action);
            match self.run_step(&archivist, step).instrument(span).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(step = step.number, error = %e, "step failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        let cleanup = self.delete_deferred(&archivist).await;
        if let Some(e) = failure {
            return Err(e);
        }
        Ok(RunReport {
            outcomes,
            deleted: cleanup?,
        })
    }

    async fn run_step(&mut self, archivist: &Archivist, step: &Step) -> RunnerResult<StepOutcome> {
        if let Some(description) = &step.description {
            tracing::info!("{description}");
        }
        let response = self.dispatch(archivist, step).await?;
        Ok(StepOutcome {
            number: step.number,
            action: step.action.as_str().to_string(),
            description: step.description.clone(),
            print_response: step.print_response,
            response,
        })
    }

    async fn delete_deferred(&mut self, archivist: &Archivist) -> RunnerResult<Vec<String>> {
        let mut deleted = Vec::new();
        let mut first_error = None;
        while let Some((kind, identity)) = self.deferred.pop() {
            let result = match kind {
                EntityKind::AccessPolicy => archivist.access_policies().delete(&identity).await,
                EntityKind::Subject => archivist.subjects().delete(&identity).await,
                EntityKind::Asset | EntityKind::Location => continue,
            };
            match result {
                Ok(_) => {
                    tracing::info!(%identity, "deleted");
                    deleted.push(identity);
                }
                Err(source) => {
                    tracing::warn!(%identity, error = %source, "deferred delete failed");
                    first_error.get_or_insert(RunnerError::Cleanup { identity, source });
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(deleted),
        }
    }

    fn args<T: DeserializeOwned>(&self, step: &Step) -> RunnerResult<T> {
        serde_json::from_value(self.raw_args(step)?).map_err(|source| RunnerError::InvalidArguments {
            step: step.number,
            action: step.action,
            source,
        })
    }

    fn raw_args(&self, step: &Step) -> RunnerResult<Value> {
        self.labels.substitute(Value::Object(step.args.clone()))
    }

    /// Identity a step targets: its label for `kind`, else an explicit `identity`
    fn target(&self, step: &Step, kind: EntityKind, explicit: Option<String>) -> RunnerResult<String> {
        match step.label_for(kind) {
            Some(label) => Ok(self.labels.resolve(label, kind)?.to_string()),
            None => explicit.ok_or_else(|| missing(step, "identity")),
        }
    }

    fn created(&mut self, step: &Step, kind: EntityKind, identity: &str) {
        if let Some(label) = step.label_for(kind) {
            self.labels.register(label, kind, identity);
        }
        if step.delete {
            self.deferred.push((kind, identity.to_string()));
        }
    }

    fn forget(&mut self, identity: &str) {
        self.deferred.retain(|(_, deferred)| deferred != identity);
    }

    #[allow(clippy::too_many_lines)]
    async fn dispatch(&mut self, archivist: &Archivist, step: &Step) -> RunnerResult<Value> {
        let failed = |source: ArchivistError| RunnerError::Step {
            step: step.number,
            action: step.action,
            source,
        };
        let confirm = step.wait_for_confirmation;

        match step.action {
            Action::AssetsCreate => {
                let args: RecordArgs = self.args(step)?;
                let mut request = AssetRequest::new().attributes(attributes(args.attrs));
                if let Some(behaviours) = args.behaviours {
                    request = request.behaviours(behaviours);
                }
                let request = args
                    .props
                    .into_iter()
                    .fold(request, |r, (k, v)| r.prop(k, v));
                let asset = archivist.assets().create(request, confirm).await.map_err(failed)?;
                self.created(step, EntityKind::Asset, &asset.identity);
                to_value(&asset)
            }
            Action::AssetsCreateIfNotExists => {
                let data = self.raw_args(step)?;
                let (asset, existed) = archivist
                    .assets()
                    .create_if_not_exists(data, confirm)
                    .await
                    .map_err(failed)?;
                tracing::info!(identity = %asset.identity, existed, "asset ready");
                self.created(step, EntityKind::Asset, &asset.identity);
                to_value(&asset)
            }
            Action::AssetsCount => {
                let args: RecordArgs = self.args(step)?;
                let count = archivist.assets().count(&args.criteria()).await.map_err(failed)?;
                Ok(json!({ "count": count }))
            }
            Action::AssetsList => {
                let args: RecordArgs = self.args(step)?;
                to_value(archivist.assets().list(&args.criteria()).await.map_err(failed)?)
            }
            Action::AssetsWaitForConfirmed => {
                let args: RecordArgs = self.args(step)?;
                archivist
                    .assets()
                    .wait_for_confirmed(&args.criteria())
                    .await
                    .map_err(failed)?;
                Ok(Value::Null)
            }

            Action::EventsCreate => {
                let args: RecordArgs = self.args(step)?;
                let asset = self.target(step, EntityKind::Asset, args.identity)?;
                if !args.props.contains_key("operation") {
                    return Err(missing(step, "props.operation"));
                }
                let request = args
                    .props
                    .into_iter()
                    .fold(EventRequest::default(), |r, (k, v)| r.prop(k, v))
                    .attributes(attributes(args.attrs))
                    .asset_attributes(attributes(args.asset_attrs));
                let event = archivist
                    .events()
                    .create(&asset, request, confirm)
                    .await
                    .map_err(failed)?;
                to_value(&event)
            }
            Action::EventsCount | Action::EventsList => {
                let args: RecordArgs = self.args(step)?;
                let events = archivist.events();
                let asset = match (step.asset_label.as_deref(), args.identity.clone()) {
                    (None, None) => events.wildcard().to_string(),
                    (_, explicit) => self.target(step, EntityKind::Asset, explicit)?,
                };
                let criteria = args.criteria();
                if step.action == Action::EventsCount {
                    let count = events.count(&asset, &criteria).await.map_err(failed)?;
                    Ok(json!({ "count": count }))
                } else {
                    to_value(events.list(&asset, &criteria).await.map_err(failed)?)
                }
            }

            Action::AccessPoliciesCreate => {
                let args: PolicyArgs = self.args(step)?;
                let policy = archivist
                    .access_policies()
                    .create(
                        Value::Object(args.props),
                        &args.filters.unwrap_or_default(),
                        &args.access_permissions.unwrap_or_default(),
                    )
                    .await
                    .map_err(failed)?;
                self.created(step, EntityKind::AccessPolicy, &policy.identity);
                to_value(&policy)
            }
            Action::AccessPoliciesRead => {
                let args: PolicyArgs = self.args(step)?;
                let identity = self.target(step, EntityKind::AccessPolicy, args.identity)?;
                to_value(archivist.access_policies().read(&identity).await.map_err(failed)?)
            }
            Action::AccessPoliciesUpdate => {
                let args: PolicyArgs = self.args(step)?;
                let identity = self.target(step, EntityKind::AccessPolicy, args.identity)?;
                let policy = archivist
                    .access_policies()
                    .update(
                        &identity,
                        Value::Object(args.props),
                        args.filters.as_ref(),
                        args.access_permissions.as_deref(),
                    )
                    .await
                    .map_err(failed)?;
                to_value(&policy)
            }
            Action::AccessPoliciesDelete => {
                let args: PolicyArgs = self.args(step)?;
                let identity = self.target(step, EntityKind::AccessPolicy, args.identity)?;
                let response = archivist
                    .access_policies()
                    .delete(&identity)
                    .await
                    .map_err(failed)?;
                self.forget(&identity);
                Ok(response)
            }
            Action::AccessPoliciesList => {
                let args: RecordArgs = self.args(step)?;
                to_value(
                    archivist
                        .access_policies()
                        .list(&args.criteria())
                        .await
                        .map_err(failed)?,
                )
            }
            Action::AccessPoliciesCountMatchingAccessPolicies
            | Action::AccessPoliciesListMatchingAccessPolicies => {
                let args: RecordArgs = self.args(step)?;
                let asset = self.target(step, EntityKind::Asset, args.identity.clone())?;
                let policies = archivist.access_policies();
                let criteria = args.criteria();
                if step.action == Action::AccessPoliciesCountMatchingAccessPolicies {
                    let count = policies
                        .count_matching_access_policies(&asset, &criteria)
                        .await
                        .map_err(failed)?;
                    Ok(json!({ "count": count }))
                } else {
                    to_value(
                        policies
                            .list_matching_access_policies(&asset, &criteria)
                            .await
                            .map_err(failed)?,
                    )
                }
            }
            Action::AccessPoliciesCountMatchingAssets | Action::AccessPoliciesListMatchingAssets => {
                let args: RecordArgs = self.args(step)?;
                let policy = self.target(step, EntityKind::AccessPolicy, args.identity.clone())?;
                let policies = archivist.access_policies();
                let criteria = args.criteria();
                if step.action == Action::AccessPoliciesCountMatchingAssets {
                    let count = policies
                        .count_matching_assets(&policy, &criteria)
                        .await
                        .map_err(failed)?;
                    Ok(json!({ "count": count }))
                } else {
                    to_value(
                        policies
                            .list_matching_assets(&policy, &criteria)
                            .await
                            .map_err(failed)?,
                    )
                }
            }

            Action::SubjectsCreate => {
                let args: SubjectArgs = self.args(step)?;
                let name = args.display_name.ok_or_else(|| missing(step, "display_name"))?;
                let subjects = archivist.subjects();
                let mut subject = subjects
                    .create(
                        &name,
                        &args.wallet_pub_key.unwrap_or_default(),
                        &args.tessera_pub_key.unwrap_or_default(),
                    )
                    .await
                    .map_err(failed)?;
                self.created(step, EntityKind::Subject, &subject.identity);
                if confirm {
                    subject = subjects
                        .wait_for_confirmation(&subject.identity)
                        .await
                        .map_err(failed)?;
                }
                to_value(&subject)
            }
            Action::SubjectsCreateFromB64 => {
                let args: SubjectArgs = self.args(step)?;
                let name = args.display_name.ok_or_else(|| missing(step, "display_name"))?;
                let link = args.base64_link.ok_or_else(|| missing(step, "base64_link"))?;
                let source = decode_b64_subject(&link).map_err(failed)?;
                if !source.has_key_material() {
                    return Err(failed(ArchivistError::Import(format!(
                        "subject link for {name} has no wallet key"
                    ))));
                }
                let subjects = archivist.subjects();
                let mirror = subjects
                    .create(&name, &source.wallet_pub_key, &source.tessera_pub_key)
                    .await
                    .map_err(failed)?;
                // registered before waiting so a failed confirmation is still cleaned up
                self.created(step, EntityKind::Subject, &mirror.identity);
                to_value(
                    subjects
                        .wait_for_confirmation(&mirror.identity)
                        .await
                        .map_err(failed)?,
                )
            }
            Action::SubjectsRead => {
                let args: SubjectArgs = self.args(step)?;
                let identity = self.target(step, EntityKind::Subject, args.identity)?;
                to_value(archivist.subjects().read(&identity).await.map_err(failed)?)
            }
            Action::SubjectsUpdate => {
                let args: SubjectArgs = self.args(step)?;
                let identity = self.target(step, EntityKind::Subject, args.identity)?;
                let subject = archivist
                    .subjects()
                    .update(
                        &identity,
                        args.display_name.as_deref(),
                        args.wallet_pub_key.as_deref(),
                        args.tessera_pub_key.as_deref(),
                    )
                    .await
                    .map_err(failed)?;
                to_value(&subject)
            }
            Action::SubjectsDelete => {
                let args: SubjectArgs = self.args(step)?;
                let identity = self.target(step, EntityKind::Subject, args.identity)?;
                let response = archivist.subjects().delete(&identity).await.map_err(failed)?;
                self.forget(&identity);
                Ok(response)
            }
            Action::SubjectsList | Action::SubjectsCount => {
                let args: SubjectArgs = self.args(step)?;
                let criteria = Criteria::from_value(&Value::Object(args.props));
                let subjects = archivist.subjects();
                if step.action == Action::SubjectsCount {
                    let count = subjects.count(&criteria).await.map_err(failed)?;
                    Ok(json!({ "count": count }))
                } else {
                    to_value(subjects.list(&criteria).await.map_err(failed)?)
                }
            }
            Action::SubjectsWait => {
                let args: SubjectArgs = self.args(step)?;
                let identity = self.target(step, EntityKind::Subject, args.identity)?;
                to_value(
                    archivist
                        .subjects()
                        .wait_for_confirmation(&identity)
                        .await
                        .map_err(failed)?,
                )
            }

            Action::LocationsCreateIfNotExists => {
                let data = self.raw_args(step)?;
                let (location, existed) = archivist
                    .locations()
                    .create_if_not_exists(data)
                    .await
                    .map_err(failed)?;
                tracing::info!(identity = %location.identity, existed, "location ready");
                self.created(step, EntityKind::Location, &location.identity);
                to_value(&location)
            }
            Action::LocationsRead => {
                let args: RecordArgs = self.args(step)?;
                let identity = self.target(step, EntityKind::Location, args.identity)?;
                to_value(archivist.locations().read(&identity).await.map_err(failed)?)
            }
            Action::LocationsList | Action::LocationsCount => {
                let args: RecordArgs = self.args(step)?;
                let locations = archivist.locations();
                let criteria = args.criteria();
                if step.action == Action::LocationsCount {
                    let count = locations.count(&criteria).await.map_err(failed)?;
                    Ok(json!({ "count": count }))
                } else {
                    to_value(locations.list(&criteria).await.map_err(failed)?)
                }
            }
        }
    }
}

fn missing(step: &Step, argument: &'static str) -> RunnerError {
    RunnerError::MissingArgument {
        step: step.number,
        action: step.action,
        argument,
    }
}
