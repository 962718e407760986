//! End-to-end behaviour against the in-memory ledger

use archivist_client::{
    ArchivistError, AssetRequest, BackoffPolicy, ConfirmationWaiter, Criteria, EventRequest,
    Method,
};
use archivist_model::ConfirmationStatus;
use archivist_test_utils::{acme_asset, acme_filter, acme_permission, tenant, InMemoryLedger};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn acme_policy_matches_in_both_directions() {
    let ledger = InMemoryLedger::new();
    let acme = tenant(&ledger, "acme");

    let matching = acme.assets().create(acme_asset("door"), true).await.unwrap();
    let other = acme
        .assets()
        .create(acme_asset("gate").attr("ext_vendor_name", "other"), true)
        .await
        .unwrap();

    let policy = acme
        .access_policies()
        .create(
            json!({"display_name": "acme vendor"}),
            &acme_filter(),
            &[acme_permission("subjects/partner")],
        )
        .await
        .unwrap();

    let policies = acme.access_policies();
    let assets = policies
        .list_matching_assets(&policy.identity, &Criteria::new())
        .await
        .unwrap();
    assert_eq!(
        assets.iter().map(|a| a.identity.as_str()).collect::<Vec<_>>(),
        vec![matching.identity.as_str()]
    );

    let for_matching = policies
        .list_matching_access_policies(&matching.identity, &Criteria::new())
        .await
        .unwrap();
    assert_eq!(for_matching.len(), 1);
    assert_eq!(for_matching[0].identity, policy.identity);
    assert_eq!(
        policies
            .count_matching_access_policies(&other.identity, &Criteria::new())
            .await
            .unwrap(),
        0
    );

    let snapshot = policies.snapshot().await.unwrap();
    assert_eq!(snapshot.count_policies_matching(&matching), 1);
    assert_eq!(snapshot.count_policies_matching(&other), 0);
}

#[tokio::test]
async fn shared_assets_are_redacted_and_revocation_applies_to_later_reads() {
    let ledger = InMemoryLedger::new();
    let acme = tenant(&ledger, "acme");
    let partner = tenant(&ledger, "partner");

    let (partner_in_acme, acme_in_partner) = acme
        .subjects()
        .share("partner", "acme", &partner)
        .await
        .unwrap();
    assert_eq!(partner_in_acme.confirmation_status, Some(ConfirmationStatus::Confirmed));
    assert_eq!(acme_in_partner.display_name, "acme");

    let asset = acme.assets().create(acme_asset("door"), true).await.unwrap();
    let policy = acme
        .access_policies()
        .create(
            json!({"display_name": "share with partner"}),
            &acme_filter(),
            &[acme_permission(&partner_in_acme.identity)],
        )
        .await
        .unwrap();

    let seen = partner.assets().read(&asset.identity).await.unwrap();
    assert_eq!(seen.attributes.get_str("arc_display_name"), Some("door"));
    assert_eq!(seen.attributes.get_str("ext_vendor_name"), Some("acme"));
    assert!(!seen.attributes.contains_key("serial"));
    assert!(!seen.attributes.contains_key("arc_display_type"));

    acme.access_policies().delete(&policy.identity).await.unwrap();

    assert!(acme
        .access_policies()
        .list_matching_access_policies(&asset.identity, &Criteria::new())
        .await
        .unwrap()
        .is_empty());
    // already-fetched copy is owned by the caller and unchanged
    assert_eq!(seen.attributes.get_str("arc_display_name"), Some("door"));

    let err = partner.assets().read(&asset.identity).await.unwrap_err();
    assert!(err.is_transport());
    assert!(partner.assets().list(&Criteria::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_confirmation_stops_polling() {
    let ledger = InMemoryLedger::new();
    let acme = tenant(&ledger, "acme");
    ledger.fail_next();

    let err = acme.assets().create(acme_asset("door"), true).await.unwrap_err();
    assert!(matches!(err, ArchivistError::Confirmation { .. }));

    let reads = ledger
        .requests()
        .into_iter()
        .filter(|(_, method, _)| *method == Method::Get)
        .count();
    assert_eq!(reads, 1);
}

#[tokio::test]
async fn pending_forever_times_out_with_last_status() {
    let ledger = InMemoryLedger::new();
    ledger.hold_next();
    let acme = tenant(&ledger, "acme").with_waiter(ConfirmationWaiter::new(
        BackoffPolicy::constant(Duration::from_millis(5)),
        Duration::from_millis(40),
    ));

    let err = acme.assets().create(acme_asset("door"), true).await.unwrap_err();
    match err {
        ArchivistError::Timeout { last_status, .. } => {
            assert_eq!(last_status, Some(ConfirmationStatus::Pending));
        }
        other => panic!("expected timeout, got {other:?}"),
    }

    let writes = ledger
        .requests()
        .into_iter()
        .filter(|(_, method, _)| *method != Method::Get)
        .count();
    assert_eq!(writes, 1);
}

#[tokio::test]
async fn import_without_key_material_never_reaches_the_service() {
    let ledger = InMemoryLedger::new();
    let acme = tenant(&ledger, "acme");

    let source = archivist_model::Subject::new("nobody", vec![" ".into()], vec![]);
    let err = acme.subjects().import_subject("nobody", &source).await.unwrap_err();

    assert!(matches!(err, ArchivistError::Import(_)));
    assert!(ledger.requests().is_empty());
}

#[tokio::test]
async fn listing_pages_and_counts() {
    let ledger = InMemoryLedger::new();
    let acme = archivist_client::Archivist::with_transport(
        std::sync::Arc::new(ledger.transport("acme")),
        archivist_test_utils::fast_config().with_page_size(2),
    );

    for i in 0..5 {
        acme.assets()
            .create(AssetRequest::new().attr("arc_display_name", format!("a{i}")), false)
            .await
            .unwrap();
    }
    acme.assets()
        .wait_for_confirmed(&Criteria::new())
        .await
        .unwrap();

    assert_eq!(acme.assets().list(&Criteria::new()).await.unwrap().len(), 5);
    assert_eq!(acme.assets().count(&Criteria::new()).await.unwrap(), 5);
    assert_eq!(
        acme.assets()
            .count(&Criteria::new().attr("arc_display_name", "a3"))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn create_if_not_exists_is_idempotent() {
    let ledger = InMemoryLedger::new();
    let acme = tenant(&ledger, "acme");
    let data = json!({
        "selector": ["display_name"],
        "display_name": "Gare du Nord",
        "attributes": {"wavestone_ext": "managed"}
    });

    let (first, existed) = acme.locations().create_if_not_exists(data.clone()).await.unwrap();
    assert!(!existed);
    let (second, existed) = acme.locations().create_if_not_exists(data).await.unwrap();
    assert!(existed);
    assert_eq!(first.identity, second.identity);

    let (asset, existed) = acme
        .assets()
        .create_if_not_exists(
            json!({
                "selector": [{"attributes": ["arc_display_name"]}],
                "attributes": {"arc_display_name": "lift"},
                "location": {
                    "selector": ["display_name"],
                    "display_name": "Gare du Nord"
                }
            }),
            true,
        )
        .await
        .unwrap();
    assert!(!existed);
    assert_eq!(
        asset.attributes.get_str(archivist_client::HOME_LOCATION),
        Some(first.identity.as_str())
    );
}

#[tokio::test]
async fn events_update_asset_attributes() {
    let ledger = InMemoryLedger::new();
    let acme = tenant(&ledger, "acme");
    let asset = acme.assets().create(acme_asset("door"), true).await.unwrap();

    let event = acme
        .events()
        .create(
            &asset.identity,
            EventRequest::new("Record", "RecordEvidence")
                .attr("arc_description", "inspection")
                .asset_attr("condition", "good"),
            true,
        )
        .await
        .unwrap();
    assert_eq!(event.confirmation_status, Some(ConfirmationStatus::Confirmed));
    assert_eq!(event.asset_identity, asset.identity);

    let asset = acme.assets().read(&asset.identity).await.unwrap();
    assert_eq!(asset.attributes.get_str("condition"), Some("good"));

    let events = acme.events();
    assert_eq!(events.count(events.wildcard(), &Criteria::new()).await.unwrap(), 1);
    assert_eq!(events.list(&asset.identity, &Criteria::new()).await.unwrap().len(), 1);
}
