//! Cross-tenant subject import
//!
//! Sharing between tenants starts by mirroring a subject: the source tenant's
//! subject record (read there, or exported as base64) is recreated in the
//! destination with the same key material, then confirmed. Access policies in
//! the destination can then name the mirror.

use crate::archivist::Archivist;
use crate::error::{ArchivistError, ArchivistResult};
use archivist_model::Subject;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Decode a subject exported as base64 JSON
///
/// The blob holds `identity`, `wallet_pub_key` and `tessera_pub_key`.
///
/// # Errors
/// `Import` when the blob is not base64 or not a subject.
pub fn decode_b64_subject(encoded: &str) -> ArchivistResult<Subject> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ArchivistError::Import(format!("subject is not base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ArchivistError::Import(format!("subject is not valid JSON: {e}")))
}

/// Encode a subject the way [`decode_b64_subject`] reads it
#[must_use]
pub fn encode_b64_subject(subject: &Subject) -> String {
    let blob = serde_json::json!({
        "identity": subject.identity,
        "wallet_pub_key": subject.wallet_pub_key,
        "tessera_pub_key": subject.tessera_pub_key,
    });
    STANDARD.encode(blob.to_string())
}

/// Imports subjects into one destination tenant
#[derive(Debug, Clone, Copy)]
pub struct SubjectImportCoordinator<'a> {
    destination: &'a Archivist,
}

impl<'a> SubjectImportCoordinator<'a> {
    /// Coordinator importing into `destination`
    #[inline]
    #[must_use]
    pub fn new(destination: &'a Archivist) -> Self {
        Self { destination }
    }

    /// Create a confirmed mirror of `source` named `display_name`
    ///
    /// # Errors
    /// - `Import` if `source` has no wallet key, before any remote call
    /// - create and confirmation errors unchanged
    pub async fn import(&self, display_name: &str, source: &Subject) -> ArchivistResult<Subject> {
        if !source.has_key_material() {
            return Err(ArchivistError::Import(format!(
                "subject {} has no wallet key",
                if source.identity.is_empty() {
                    "<unnamed>"
                } else {
                    source.identity.as_str()
                }
            )));
        }

        let subjects = self.destination.subjects();
        let mirror = subjects
            .create(display_name, &source.wallet_pub_key, &source.tessera_pub_key)
            .await?;
        tracing::info!(
            source = %source.identity,
            mirror = %mirror.identity,
            destination = %self.destination,
            "subject imported"
        );
        subjects.wait_for_confirmation(&mirror.identity).await
    }

    /// Import a base64 export
    pub async fn import_from_b64(
        &self,
        display_name: &str,
        encoded: &str,
    ) -> ArchivistResult<Subject> {
        let source = decode_b64_subject(encoded)?;
        self.import(display_name, &source).await
    }

    /// Mirror each tenant's self subject into the other
    ///
    /// `other`'s self subject lands here as `display_name`; ours lands in
    /// `other` as `other_name`.
    pub async fn share(
        &self,
        display_name: &str,
        other_name: &str,
        other: &Archivist,
    ) -> ArchivistResult<(Subject, Subject)> {
        let theirs = other.subjects().read_self().await?;
        let ours = self.destination.subjects().read_self().await?;

        let here = self.import(display_name, &theirs).await?;
        let there = SubjectImportCoordinator::new(other)
            .import(other_name, &ours)
            .await?;
        Ok((here, there))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArchivistConfig, BackoffPolicy};
    use crate::transport::{Method, MockTransport, Request, Response};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn archivist(mock: MockTransport) -> Archivist {
        let config = ArchivistConfig::new("https://app.example.io")
            .with_backoff(BackoffPolicy::constant(Duration::from_millis(5)))
            .with_max_time(Duration::from_secs(1));
        Archivist::with_transport(Arc::new(mock), config)
    }

    #[tokio::test]
    async fn import_without_keys_makes_no_calls() {
        let mut mock = MockTransport::new();
        mock.expect_send().never();

        let source = Subject::new("src", vec![], vec!["t".into()]);
        let err = SubjectImportCoordinator::new(&archivist(mock))
            .import("mirror", &source)
            .await
            .unwrap_err();
        assert!(matches!(err, ArchivistError::Import(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn import_creates_then_waits() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|r: &Request| r.method == Method::Post)
            .times(1)
            .returning(|r| {
                let body = r.body.unwrap_or_default();
                assert_eq!(body["wallet_pub_key"], json!(["w1"]));
                assert_eq!(body["tessera_pub_key"], json!(["t1"]));
                Ok(Response::json(json!({
                    "identity": "subjects/9",
                    "display_name": body["display_name"],
                    "wallet_pub_key": body["wallet_pub_key"],
                    "confirmation_status": "PENDING"
                })))
            });
        mock.expect_send()
            .withf(|r: &Request| r.method == Method::Get && r.path == "iam/v1/subjects/9")
            .times(1)
            .returning(|_| {
                Ok(Response::json(json!({
                    "identity": "subjects/9",
                    "display_name": "mirror",
                    "wallet_pub_key": ["w1"],
                    "confirmation_status": "CONFIRMED"
                })))
            });

        let source = Subject::new("src", vec!["w1".into()], vec!["t1".into()]);
        let mirror = SubjectImportCoordinator::new(&archivist(mock))
            .import("mirror", &source)
            .await
            .unwrap();
        assert_eq!(mirror.identity, "subjects/9");
        assert_eq!(mirror.display_name, "mirror");
    }

    #[test]
    fn b64_round_trip_and_errors() {
        let mut subject = Subject::new("", vec!["w1".into()], vec!["t1".into()]);
        subject.identity = "subjects/1".into();

        let decoded = decode_b64_subject(&encode_b64_subject(&subject)).unwrap();
        assert_eq!(decoded.identity, "subjects/1");
        assert_eq!(decoded.wallet_pub_key, vec!["w1".to_string()]);

        assert!(matches!(
            decode_b64_subject("not base64!"),
            Err(ArchivistError::Import(_))
        ));
        assert!(matches!(
            decode_b64_subject(&STANDARD.encode("[1, 2]")),
            Err(ArchivistError::Import(_))
        ));
    }
}
