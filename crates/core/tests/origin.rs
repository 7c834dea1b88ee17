//! Recognized-device detection on sign-in.

mod common;

use std::sync::Arc;

use async_trait::async_trait;

use gatekey_core::audit::{NewSecurityLog, SecurityLog};
use gatekey_core::error::StoreError;
use gatekey_core::notify::TracingNotifier;
use gatekey_core::origin::{DeviceVerdict, OriginVerifier};
use gatekey_core::store::{SecurityLogStore, StoreResult};
use gatekey_core::types::{DbId, Page};

use common::{fingerprint, harness, PASSWORD, USERNAME};

async fn actions(h: &common::Harness) -> Vec<String> {
    let account = h.sessions.find_account(USERNAME).await.unwrap();
    h.store
        .find_all_by_account(account.id)
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.action)
        .collect()
}

#[tokio::test]
async fn unseen_device_is_flagged_exactly_once() {
    let h = harness();
    h.signup().await;
    let london = fingerprint("81.2.69.1", "London", "121");

    h.sessions
        .signin(USERNAME, PASSWORD, Some(london.clone()))
        .await
        .unwrap();
    h.sessions
        .signin(USERNAME, PASSWORD, Some(london))
        .await
        .unwrap();

    assert_eq!(
        actions(&h).await,
        vec!["created", "unrecognized_device", "signin"]
    );
    assert_eq!(h.notifier.count("unrecognized_device"), 1);
}

#[tokio::test]
async fn ip_change_alone_is_recognized() {
    let h = harness();
    h.signup().await;

    h.sessions
        .signin(USERNAME, PASSWORD, Some(fingerprint("81.2.69.1", "London", "121")))
        .await
        .unwrap();
    h.sessions
        .signin(USERNAME, PASSWORD, Some(fingerprint("81.2.69.250", "London", "121")))
        .await
        .unwrap();

    assert_eq!(h.notifier.count("unrecognized_device"), 1);
}

#[tokio::test]
async fn new_city_or_browser_version_is_unrecognized() {
    let h = harness();
    h.signup().await;

    for metadata in [
        fingerprint("81.2.69.1", "London", "121"),
        fingerprint("81.2.69.1", "Leeds", "121"),
        fingerprint("81.2.69.1", "London", "122"),
    ] {
        h.sessions
            .signin(USERNAME, PASSWORD, Some(metadata))
            .await
            .unwrap();
    }

    assert_eq!(h.notifier.count("unrecognized_device"), 3);
}

#[tokio::test]
async fn signin_without_fingerprint_skips_verification() {
    let h = harness();
    h.signup().await;
    h.sessions.signin(USERNAME, PASSWORD, None).await.unwrap();

    assert_eq!(actions(&h).await, vec!["created"]);
    assert_eq!(h.notifier.count("unrecognized_device"), 0);
}

#[tokio::test]
async fn verdicts_are_reported() {
    let h = harness();
    h.signup().await;
    let account = h.sessions.find_account(USERNAME).await.unwrap();
    let verifier = OriginVerifier::new(h.store.clone(), h.notifier.clone());
    let paris = fingerprint("203.0.113.9", "Paris", "121");

    assert_eq!(verifier.verify(&account, &paris).await, DeviceVerdict::Unrecognized);
    assert_eq!(verifier.verify(&account, &paris).await, DeviceVerdict::Recognized);
}

struct BrokenLogStore;

#[async_trait]
impl SecurityLogStore for BrokenLogStore {
    async fn record(&self, _: NewSecurityLog) -> StoreResult<SecurityLog> {
        Err(StoreError::new("database unavailable"))
    }

    async fn find_all_by_account(&self, _: DbId) -> StoreResult<Vec<SecurityLog>> {
        Err(StoreError::new("database unavailable"))
    }

    async fn list_by_account(&self, _: DbId, _: Page) -> StoreResult<Vec<SecurityLog>> {
        Err(StoreError::new("database unavailable"))
    }
}

#[tokio::test]
async fn storage_failure_is_unverified_not_an_error() {
    let h = harness();
    h.signup().await;
    let account = h.sessions.find_account(USERNAME).await.unwrap();

    let verifier = OriginVerifier::new(Arc::new(BrokenLogStore), Arc::new(TracingNotifier));
    let verdict = verifier
        .verify(&account, &fingerprint("81.2.69.1", "London", "121"))
        .await;
    assert_eq!(verdict, DeviceVerdict::Unverified);
}
