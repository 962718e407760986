//! Subjects endpoint

use super::{resource_path, IAM_V1};
use crate::archivist::{decode, decode_all, Archivist};
use crate::confirmer::ResourceReader;
use crate::coordinator::SubjectImportCoordinator;
use crate::error::ArchivistResult;
use crate::params::Criteria;
use archivist_model::{Subject, SELF_SUBJECT_ID};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const LABEL: &str = "subjects";

/// Access to `iam/v1/subjects`
#[derive(Debug, Clone, Copy)]
pub struct SubjectsClient<'a> {
    archivist: &'a Archivist,
}

impl<'a> SubjectsClient<'a> {
    pub(crate) fn new(archivist: &'a Archivist) -> Self {
        Self { archivist }
    }

    fn collection() -> String {
        format!("{IAM_V1}/{LABEL}")
    }

    /// Tenant this client talks to
    #[inline]
    #[must_use]
    pub fn archivist(&self) -> &'a Archivist {
        self.archivist
    }

    /// Create a subject from key material
    pub async fn create(
        &self,
        display_name: &str,
        wallet_pub_key: &[String],
        tessera_pub_key: &[String],
    ) -> ArchivistResult<Subject> {
        let body = self.archivist.with_fixture(
            LABEL,
            json!({
                "display_name": display_name,
                "wallet_pub_key": wallet_pub_key,
                "tessera_pub_key": tessera_pub_key,
            }),
        );
        self.create_from_data(body).await
    }

    /// Create a subject from a complete request body
    pub async fn create_from_data(&self, data: Value) -> ArchivistResult<Subject> {
        let subject: Subject = decode(self.archivist.post(&Self::collection(), data).await?)?;
        tracing::info!(identity = %subject.identity, "subject created");
        Ok(subject)
    }

    /// Read a subject
    pub async fn read(&self, identity: &str) -> ArchivistResult<Subject> {
        decode(self.archivist.get(&resource_path(IAM_V1, identity)).await?)
    }

    /// This tenant's own subject
    pub async fn read_self(&self) -> ArchivistResult<Subject> {
        self.read(SELF_SUBJECT_ID).await
    }

    /// Update a subject; unset arguments are left unchanged
    pub async fn update(
        &self,
        identity: &str,
        display_name: Option<&str>,
        wallet_pub_key: Option<&[String]>,
        tessera_pub_key: Option<&[String]>,
    ) -> ArchivistResult<Subject> {
        let mut body = Map::new();
        if let Some(name) = display_name {
            body.insert("display_name".into(), Value::from(name));
        }
        if let Some(keys) = wallet_pub_key {
            body.insert("wallet_pub_key".into(), Value::from(keys.to_vec()));
        }
        if let Some(keys) = tessera_pub_key {
            body.insert("tessera_pub_key".into(), Value::from(keys.to_vec()));
        }
        let value = self
            .archivist
            .patch(&resource_path(IAM_V1, identity), Value::Object(body))
            .await?;
        decode(value)
    }

    /// Delete a subject
    pub async fn delete(&self, identity: &str) -> ArchivistResult<Value> {
        self.archivist.delete(&resource_path(IAM_V1, identity)).await
    }

    /// List subjects matching `criteria`
    pub async fn list(&self, criteria: &Criteria) -> ArchivistResult<Vec<Subject>> {
        let query = self.archivist.with_fixture(LABEL, criteria.to_value());
        let records = self
            .archivist
            .list(&Self::collection(), LABEL, &query)
            .await?;
        decode_all(records)
    }

    /// Count subjects matching `criteria`
    pub async fn count(&self, criteria: &Criteria) -> ArchivistResult<u64> {
        let query = self.archivist.with_fixture(LABEL, criteria.to_value());
        self.archivist.count(&Self::collection(), &query).await
    }

    /// Wait for a subject to be CONFIRMED
    pub async fn wait_for_confirmation(&self, identity: &str) -> ArchivistResult<Subject> {
        self.archivist.waiter().wait(self, identity).await
    }

    /// Mirror `source` (read from another tenant) into this tenant
    pub async fn import_subject(&self, display_name: &str, source: &Subject) -> ArchivistResult<Subject> {
        SubjectImportCoordinator::new(self.archivist)
            .import(display_name, source)
            .await
    }

    /// Import a subject exported as base64 JSON
    pub async fn import_from_b64(&self, display_name: &str, encoded: &str) -> ArchivistResult<Subject> {
        SubjectImportCoordinator::new(self.archivist)
            .import_from_b64(display_name, encoded)
            .await
    }

    /// Import each tenant's self subject into the other
    ///
    /// Returns the mirror created here (named `display_name`) and the one
    /// created in `other` (named `other_name`).
    pub async fn share(
        &self,
        display_name: &str,
        other_name: &str,
        other: &Archivist,
    ) -> ArchivistResult<(Subject, Subject)> {
        SubjectImportCoordinator::new(self.archivist)
            .share(display_name, other_name, other)
            .await
    }
}

#[async_trait]
impl ResourceReader for SubjectsClient<'_> {
    type Resource = Subject;

    async fn read_resource(&self, identity: &str) -> ArchivistResult<Subject> {
        self.read(identity).await
    }
}
