//! Integration tests for multi-component page coordination
//!
//! Walks the page lifecycle end to end: initialization, navigation, edits
//! from several components, reconciliation, and the save/retry loop.

use dashstate::{ManualClock, MultiComponentPageState, SavePayload, StateError};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

fn wizard_page() -> (MultiComponentPageState, ManualClock) {
    let clock = ManualClock::new(1_000);
    let mut page = MultiComponentPageState::with_clock(Arc::new(clock.clone()));

    let mut initial = Map::new();
    initial.insert("name".to_string(), json!(""));
    page.initialize_page(
        "Wizard",
        vec!["Step1".into(), "Step2".into(), "Step3".into()],
        initial,
    )
    .unwrap();
    (page, clock)
}

/// Capture slot for the payload a save function receives.
fn capture_payload() -> (Arc<Mutex<Option<SavePayload>>>, Arc<Mutex<Option<SavePayload>>>) {
    let slot = Arc::new(Mutex::new(None));
    (Arc::clone(&slot), slot)
}

#[tokio::test]
async fn wizard_edits_merge_into_one_save() {
    let (mut page, clock) = wizard_page();

    page.update_field("name", json!("Acme"), Some("Step1"));
    clock.advance(10);
    page.navigate_to_component("Step2");
    page.update_field("name", json!("Acme Corp"), Some("Step2"));

    let (captured, sink) = capture_payload();
    let result = page
        .save_changes(
            move |payload| {
                *sink.lock().unwrap() = Some(payload);
                async move { Ok(json!({"status": "ok"})) }
            },
            None,
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.data, Some(json!({"status": "ok"})));
    assert!(!page.has_pending_changes());

    let payload = captured.lock().unwrap().take().unwrap();
    assert_eq!(payload.fields.len(), 1);
    assert_eq!(payload.fields["name"], json!("Acme Corp"));
    assert_eq!(payload.metadata.page, "Wizard");
    assert_eq!(payload.metadata.components, ["Step1", "Step2", "Step3"]);

    // The winning edit's provenance survives reconciliation.
    let change = &payload.metadata.change_history["name"];
    assert_eq!(change.component, "Step2");
    assert_eq!(change.timestamp, 1_010);
}

#[tokio::test]
async fn failed_save_leaves_everything_retryable() {
    let (mut page, _clock) = wizard_page();
    page.update_field("name", json!("Acme Corp"), Some("Step2"));
    let pending_before = page.pending_changes().clone();

    let result = page
        .save_changes(
            |_payload| async move {
                Err(StateError::SaveFailed("endpoint returned 500".to_string()))
            },
            None,
        )
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.error.is_some());
    assert_eq!(page.field_value("name"), Some(&json!("Acme Corp")));
    assert_eq!(page.pending_changes(), &pending_before);

    // A retry with a healthy endpoint drains the same pending set.
    let retry = page
        .save_changes(|_payload| async move { Ok(json!({})) }, None)
        .await
        .unwrap();
    assert!(retry.success);
    assert!(!page.has_pending_changes());
}

#[tokio::test]
async fn extra_fields_ride_on_the_payload_root() {
    let (mut page, _clock) = wizard_page();
    page.update_field("name", json!("Acme"), None);

    let mut extra = Map::new();
    extra.insert("draft".to_string(), json!(true));

    let (captured, sink) = capture_payload();
    page.save_changes(
        move |payload| {
            *sink.lock().unwrap() = Some(payload);
            async move { Ok(Value::Null) }
        },
        Some(extra),
    )
    .await
    .unwrap();

    let payload = captured.lock().unwrap().take().unwrap();
    let wire = serde_json::to_value(&payload).unwrap();

    assert_eq!(wire["draft"], json!(true));
    assert_eq!(wire["fields"]["name"], json!("Acme"));
    assert_eq!(wire["metadata"]["page"], json!("Wizard"));
    assert!(wire["metadata"]["changeHistory"]["name"]["component"].is_string());
}

#[test]
fn last_write_wins_across_components() {
    let (mut page, clock) = wizard_page();

    page.update_field("x", json!(1), Some("Step1"));
    clock.advance(1);
    page.update_field("x", json!(2), Some("Step2"));

    assert_eq!(page.field_value("x"), Some(&json!(2)));

    let reconciled = page.reconcile_changes();
    assert_eq!(reconciled["x"].value, json!(2));
    assert_eq!(reconciled["x"].component, "Step2");
}

#[test]
fn reconciliation_is_stable_between_saves() {
    let (mut page, _clock) = wizard_page();
    page.update_field("a", json!("1"), None);

    let first = page.reconcile_changes();
    let second = page.reconcile_changes();
    assert_eq!(first, second);
}

#[test]
fn navigation_guards_hold_at_the_edges() {
    let (mut page, _clock) = wizard_page();

    // Unknown target: rejected, nothing moves.
    assert!(!page.navigate_to_component("NotAComponent"));
    assert_eq!(page.active_component(), Some("Step1"));
    assert_eq!(page.component_history(), ["Step1"]);

    // Back at the root of the history: refused.
    assert!(!page.navigate_back());
    assert_eq!(page.active_component(), Some("Step1"));
}

#[test]
fn field_defaults_apply_only_to_untracked_fields() {
    let (mut page, _clock) = wizard_page();

    assert_eq!(page.field_value_or("name", json!("fallback")), json!(""));
    assert_eq!(page.field_value_or("missing", json!("fallback")), json!("fallback"));

    page.update_field("missing", json!(42), None);
    assert_eq!(page.field_value_or("missing", json!("fallback")), json!(42));
}

#[tokio::test]
async fn reset_discards_a_session_completely() {
    let (mut page, _clock) = wizard_page();
    page.update_field("name", json!("Acme"), None);
    page.navigate_to_component("Step2");

    page.reset_page();

    assert!(!page.is_initialized());
    assert!(page.components().is_empty());

    // Saving after reset is a caller error until re-initialization.
    let err = page
        .save_changes(|_payload| async move { Ok(Value::Null) }, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StateError::PageNotInitialized));
}

#[test]
fn reinitialization_starts_a_fresh_session() {
    let (mut page, _clock) = wizard_page();
    page.update_field("name", json!("Acme"), None);
    page.navigate_to_component("Step3");

    let mut initial = Map::new();
    initial.insert("email".to_string(), json!(""));
    page.initialize_page("Settings", vec!["General".into()], initial)
        .unwrap();

    assert_eq!(page.page(), Some("Settings"));
    assert_eq!(page.active_component(), Some("General"));
    assert_eq!(page.component_history(), ["General"]);
    assert!(page.field_value("name").is_none());
    assert!(!page.has_pending_changes());
}
