//! In-memory Archivist service
//!
//! One [`InMemoryLedger`] holds any number of tenants. Each tenant talks to it
//! through its own [`LedgerTransport`], which routes requests the way the real
//! service lays out its paths.
//!
//! Confirmable records (assets, events, subjects) are created PENDING and
//! settle after a configurable number of further requests. Assets of another
//! tenant are visible when one of that tenant's policies names a subject
//! carrying the reader's wallet key; the reader then sees only the included
//! attributes. A foreign asset no such policy matches is left out of listings
//! and reads answer 404, as the service does, rather than returning the
//! attribute-less view [`redact`] produces.

use crate::query::{matches_query, page};
use archivist_client::{deep_merge, Method, Request, Response, Transport, TransportError};
use archivist_model::{
    AccessPolicy, Asset, ConfirmationStatus, Event, Location, Subject, SELF_SUBJECT_ID,
};
use archivist_policy::{redact, AccessPolicyMatcher};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Outcome scripted for the next confirmable record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Confirm,
    Fail,
    Hold,
}

#[derive(Debug)]
struct Settlement {
    identity: String,
    remaining: u32,
    outcome: Outcome,
}

#[derive(Debug, Default)]
struct Tenant {
    self_subject: Subject,
    assets: Vec<Asset>,
    events: Vec<Event>,
    policies: Vec<AccessPolicy>,
    subjects: Vec<Subject>,
    locations: Vec<Location>,
}

impl Tenant {
    fn new(name: &str) -> Self {
        let mut self_subject = Subject::new(
            name,
            vec![format!("{name}-wallet-key")],
            vec![format!("{name}-tessera-key")],
        );
        self_subject.identity = SELF_SUBJECT_ID.to_string();
        self_subject.confirmation_status = Some(ConfirmationStatus::Confirmed);
        Self {
            self_subject,
            ..Self::default()
        }
    }

    /// Identities of this tenant's subjects that mirror `reader`
    fn subjects_held_by(&self, reader: &Subject) -> Vec<String> {
        self.subjects
            .iter()
            .filter(|s| s.shares_keys_with(reader))
            .map(|s| s.identity.clone())
            .collect()
    }

    fn settle(&mut self, identity: &str, status: ConfirmationStatus) {
        if let Some(a) = self.assets.iter_mut().find(|a| a.identity == identity) {
            a.confirmation_status = Some(status);
        } else if let Some(e) = self.events.iter_mut().find(|e| e.identity == identity) {
            e.confirmation_status = Some(status);
        } else if let Some(s) = self.subjects.iter_mut().find(|s| s.identity == identity) {
            s.confirmation_status = Some(status);
        }
    }
}

#[derive(Debug)]
struct LedgerState {
    tenants: BTreeMap<String, Tenant>,
    settlements: Vec<(String, Settlement)>,
    settle_after: u32,
    next_outcome: Option<Outcome>,
    log: Vec<(String, Method, String)>,
}

type Handled = Result<Response, TransportError>;

/// Shared in-memory service
#[derive(Debug)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                tenants: BTreeMap::new(),
                settlements: Vec::new(),
                settle_after: 1,
                next_outcome: None,
                log: Vec::new(),
            }),
        }
    }
}

impl InMemoryLedger {
    /// Empty ledger; records confirm on the first request after creation
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Settle records after `requests` further requests
    pub fn settle_after(&self, requests: u32) {
        self.state.lock().settle_after = requests.max(1);
    }

    /// The next confirmable record settles FAILED
    pub fn fail_next(&self) {
        self.state.lock().next_outcome = Some(Outcome::Fail);
    }

    /// The next confirmable record stays PENDING forever
    pub fn hold_next(&self) {
        self.state.lock().next_outcome = Some(Outcome::Hold);
    }

    /// Transport for `tenant`, creating the tenant on first use
    #[must_use]
    pub fn transport(self: &Arc<Self>, tenant: &str) -> LedgerTransport {
        self.state
            .lock()
            .tenants
            .entry(tenant.to_string())
            .or_insert_with(|| Tenant::new(tenant));
        LedgerTransport {
            ledger: Arc::clone(self),
            tenant: tenant.to_string(),
        }
    }

    /// Self subject of `tenant`
    #[must_use]
    pub fn self_subject(&self, tenant: &str) -> Option<Subject> {
        self.state
            .lock()
            .tenants
            .get(tenant)
            .map(|t| t.self_subject.clone())
    }

    /// Every request seen so far, as `(tenant, method, path)`
    #[must_use]
    pub fn requests(&self) -> Vec<(String, Method, String)> {
        self.state.lock().log.clone()
    }

    fn handle(&self, tenant: &str, request: &Request) -> Handled {
        let mut state = self.state.lock();
        state
            .log
            .push((tenant.to_string(), request.method, request.path.clone()));
        state.tick();
        state.route(tenant, request)
    }
}

impl LedgerState {
    /// Advance every pending settlement by one request
    fn tick(&mut self) {
        let mut settled = Vec::new();
        self.settlements.retain_mut(|(tenant, s)| {
            if s.outcome == Outcome::Hold {
                return true;
            }
            s.remaining = s.remaining.saturating_sub(1);
            if s.remaining > 0 {
                return true;
            }
            let status = match s.outcome {
                Outcome::Fail => ConfirmationStatus::Failed,
                _ => ConfirmationStatus::Confirmed,
            };
            settled.push((tenant.clone(), s.identity.clone(), status));
            false
        });
        for (tenant, identity, status) in settled {
            if let Some(t) = self.tenants.get_mut(&tenant) {
                t.settle(&identity, status);
            }
        }
    }

    fn schedule(&mut self, tenant: &str, identity: &str) {
        let outcome = self.next_outcome.take().unwrap_or(Outcome::Confirm);
        self.settlements.push((
            tenant.to_string(),
            Settlement {
                identity: identity.to_string(),
                remaining: self.settle_after,
                outcome,
            },
        ));
    }

    fn tenant(&mut self, name: &str) -> Result<&mut Tenant, TransportError> {
        self.tenants
            .get_mut(name)
            .ok_or_else(|| TransportError::NotFound(format!("tenant {name}")))
    }

    fn route(&mut self, tenant: &str, request: &Request) -> Handled {
        let segments: Vec<&str> = request.path.split('/').filter(|s| !s.is_empty()).collect();
        let method = request.method;

        match (method, segments.as_slice()) {
            (Method::Post, ["v2", "assets"]) => self.create_asset(tenant, request),
            (Method::Get, ["v2", "assets"]) => self.list_assets(tenant, request),
            (Method::Get, ["v2", "assets", id]) => self.read_asset(tenant, &format!("assets/{id}")),
            (Method::Post, ["v2", "assets" | "publicassets", id, "events"]) => {
                self.create_event(tenant, &format!("assets/{id}"), request)
            }
            (Method::Get, ["v2", "assets" | "publicassets", id, "events"]) => {
                self.list_events(tenant, id, request)
            }
            (Method::Get, ["v2", "assets" | "publicassets", id, "events", eid]) => {
                let identity = format!("assets/{id}/events/{eid}");
                let t = self.tenant(tenant)?;
                find(&t.events, |e| e.identity == identity, &request.path)
            }
            (Method::Post, ["v2", "locations"]) => {
                let mut location: Location = body(request)?;
                location.identity = new_identity("locations");
                let t = self.tenant(tenant)?;
                t.locations.push(location.clone());
                respond(&location)
            }
            (Method::Get, ["v2", "locations"]) => {
                let t = self.tenant(tenant)?;
                listing(&t.locations, "locations", request)
            }
            (Method::Get, ["v2", "locations", id]) => {
                let identity = format!("locations/{id}");
                let t = self.tenant(tenant)?;
                find(&t.locations, |l| l.identity == identity, &request.path)
            }
            (Method::Post, ["iam", "v1", "subjects"]) => {
                let mut subject: Subject = body(request)?;
                subject.identity = new_identity("subjects");
                subject.confirmation_status = Some(ConfirmationStatus::Pending);
                let identity = subject.identity.clone();
                self.tenant(tenant)?.subjects.push(subject.clone());
                self.schedule(tenant, &identity);
                respond(&subject)
            }
            (Method::Get, ["iam", "v1", "subjects"]) => {
                let t = self.tenant(tenant)?;
                listing(&t.subjects, "subjects", request)
            }
            (_, ["iam", "v1", "subjects", id]) => {
                let identity = format!("subjects/{id}");
                let t = self.tenant(tenant)?;
                if identity == SELF_SUBJECT_ID {
                    return match method {
                        Method::Get => respond(&t.self_subject),
                        _ => Err(forbidden(&request.path)),
                    };
                }
                update_or_delete(&mut t.subjects, |s| s.identity == identity, request)
            }
            (Method::Post, ["iam", "v1", "access_policies"]) => {
                let mut policy: AccessPolicy = body(request)?;
                policy.identity = new_identity("access_policies");
                self.tenant(tenant)?.policies.push(policy.clone());
                respond(&policy)
            }
            (Method::Get, ["iam", "v1", "access_policies"]) => {
                let t = self.tenant(tenant)?;
                listing(&t.policies, "access_policies", request)
            }
            (Method::Get, ["iam", "v1", "access_policies", id, "assets"]) => {
                let identity = format!("access_policies/{id}");
                let t = self.tenant(tenant)?;
                let policy = t
                    .policies
                    .iter()
                    .find(|p| p.identity == identity)
                    .ok_or_else(|| TransportError::NotFound(request.path.clone()))?;
                let matched: Vec<&Asset> =
                    AccessPolicyMatcher::assets_matching(policy, t.assets.iter());
                listing(matched, "assets", request)
            }
            (_, ["iam", "v1", "access_policies", id]) => {
                let identity = format!("access_policies/{id}");
                let t = self.tenant(tenant)?;
                update_or_delete(&mut t.policies, |p| p.identity == identity, request)
            }
            (Method::Get, ["iam", "v1", "assets", id, "access_policies"]) => {
                let identity = format!("assets/{id}");
                let t = self.tenant(tenant)?;
                let asset = t
                    .assets
                    .iter()
                    .find(|a| a.identity == identity)
                    .ok_or_else(|| TransportError::NotFound(request.path.clone()))?;
                let matcher: AccessPolicyMatcher = t.policies.iter().cloned().collect();
                listing(matcher.policies_matching(asset), "access_policies", request)
            }
            _ => Err(TransportError::NotFound(request.path.clone())),
        }
    }

    fn create_asset(&mut self, tenant: &str, request: &Request) -> Handled {
        let mut asset: Asset = body(request)?;
        asset.identity = new_identity("assets");
        asset.confirmation_status = Some(ConfirmationStatus::Pending);
        let identity = asset.identity.clone();
        self.tenant(tenant)?.assets.push(asset.clone());
        self.schedule(tenant, &identity);
        respond(&asset)
    }

    /// Assets `tenant` can see: its own, then shared ones with attributes cut down
    /// Own assets plus foreign assets a policy shares with `tenant`
    fn visible_assets(&self, tenant: &str) -> Vec<Asset> {
        let Some(reader) = self.tenants.get(tenant) else {
            return Vec::new();
        };
        let mut visible = reader.assets.clone();
        for (name, owner) in &self.tenants {
            if name == tenant {
                continue;
            }
            let held = owner.subjects_held_by(&reader.self_subject);
            if held.is_empty() {
                continue;
            }
            for asset in &owner.assets {
                let (view, visibility) = redact(asset, &owner.policies, held.as_slice());
                if !visibility.is_redacted() {
                    visible.push(view);
                }
            }
        }
        visible
    }

    fn list_assets(&self, tenant: &str, request: &Request) -> Handled {
        listing(&self.visible_assets(tenant), "assets", request)
    }

    fn read_asset(&self, tenant: &str, identity: &str) -> Handled {
        let visible = self.visible_assets(tenant);
        find(&visible, |a| a.identity == identity, identity)
    }

    fn create_event(&mut self, tenant: &str, asset_id: &str, request: &Request) -> Handled {
        let mut event: Event = body(request)?;
        let t = self.tenant(tenant)?;
        let asset = t
            .assets
            .iter_mut()
            .find(|a| a.identity == asset_id)
            .ok_or_else(|| TransportError::NotFound(asset_id.to_string()))?;
        for (key, value) in event.asset_attributes.iter() {
            asset.attributes.insert(key, value.clone());
        }

        event.identity = format!("{asset_id}/events/{}", Uuid::new_v4());
        event.asset_identity = asset_id.to_string();
        event.confirmation_status = Some(ConfirmationStatus::Pending);
        t.events.push(event.clone());
        let identity = event.identity.clone();
        self.schedule(tenant, &identity);
        respond(&event)
    }

    fn list_events(&mut self, tenant: &str, asset: &str, request: &Request) -> Handled {
        let t = self.tenant(tenant)?;
        let prefix = format!("assets/{asset}/");
        let events: Vec<&Event> = t
            .events
            .iter()
            .filter(|e| asset == "-" || e.identity.starts_with(&prefix))
            .collect();
        listing(events, "events", request)
    }
}

fn new_identity(label: &str) -> String {
    format!("{label}/{}", Uuid::new_v4())
}

fn forbidden(path: &str) -> TransportError {
    TransportError::Forbidden(path.to_string())
}

fn bad_request(message: impl std::fmt::Display) -> TransportError {
    TransportError::Status {
        code: 400,
        body: message.to_string(),
    }
}

fn body<T: DeserializeOwned>(request: &Request) -> Result<T, TransportError> {
    let value = request.body.clone().unwrap_or(Value::Object(Map::new()));
    serde_json::from_value(value).map_err(bad_request)
}

fn to_value<T: Serialize>(record: &T) -> Result<Value, TransportError> {
    serde_json::to_value(record).map_err(|e| TransportError::Status {
        code: 500,
        body: e.to_string(),
    })
}

fn respond<T: Serialize>(record: &T) -> Handled {
    Ok(Response::json(to_value(record)?))
}

fn find<T: Serialize>(records: &[T], pred: impl Fn(&T) -> bool, path: &str) -> Handled {
    records
        .iter()
        .find(|r| pred(r))
        .map_or_else(|| Err(TransportError::NotFound(path.to_string())), respond)
}

fn listing<'a, T: Serialize + 'a>(
    records: impl IntoIterator<Item = &'a T>,
    label: &str,
    request: &Request,
) -> Handled {
    let mut matched = Vec::new();
    for record in records {
        let value = to_value(record)?;
        if matches_query(&value, &request.query) {
            matched.push(value);
        }
    }
    Ok(page(matched, label, &request.query, request.count_only))
}

/// GET, PATCH (deep merge) or DELETE of one record in `records`
fn update_or_delete<T: Serialize + DeserializeOwned>(
    records: &mut Vec<T>,
    pred: impl Fn(&T) -> bool,
    request: &Request,
) -> Handled {
    let idx = records
        .iter()
        .position(&pred)
        .ok_or_else(|| TransportError::NotFound(request.path.clone()))?;

    match request.method {
        Method::Get => respond(&records[idx]),
        Method::Patch => {
            let current = to_value(&records[idx])?;
            let patch = request.body.clone().unwrap_or(Value::Object(Map::new()));
            let updated: T = serde_json::from_value(deep_merge(Some(&current), patch))
                .map_err(bad_request)?;
            records[idx] = updated;
            respond(&records[idx])
        }
        Method::Delete => {
            records.remove(idx);
            Ok(Response::json(Value::Object(Map::new())))
        }
        Method::Post => Err(forbidden(&request.path)),
    }
}

/// One tenant's view of an [`InMemoryLedger`]
#[derive(Debug, Clone)]
pub struct LedgerTransport {
    ledger: Arc<InMemoryLedger>,
    tenant: String,
}

impl LedgerTransport {
    /// Tenant name
    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Shared ledger
    #[must_use]
    pub fn ledger(&self) -> &Arc<InMemoryLedger> {
        &self.ledger
    }
}

#[async_trait]
impl Transport for LedgerTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let result = self.ledger.handle(&self.tenant, &request);
        tracing::trace!(
            tenant = %self.tenant,
            method = request.method.as_str(),
            path = %request.path,
            ok = result.is_ok(),
            "ledger request"
        );
        result
    }

    fn describe(&self) -> String {
        format!("in-memory ledger ({})", self.tenant)
    }
}
