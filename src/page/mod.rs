//! Multi-component page state coordination
//!
//! Several independently-rendered UI components can cooperate on one logical
//! record: each pushes field edits into the coordinator, which keeps one
//! canonical value per field, reconciles conflicting edits by last write
//! wins, and submits the merged record to a save endpoint.
//!
//! The coordinator also tracks which component is active and provides
//! back/forward navigation between components via a history stack.
//!
//! The save payload is snapshotted before the endpoint call is awaited, so
//! edits arriving while a save is in flight apply to the canonical state
//! immediately but ride along with the next save instead. Callers that keep
//! editing after a save starts should trigger another save once it resolves.

pub mod save;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, StateError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// A pending, not-yet-persisted edit to one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    /// The edited value.
    pub value: Value,
    /// Component the edit originated from.
    pub component: String,
    /// Arrival time, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Contextual metadata accompanying a save.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMetadata {
    /// Page identity the record belongs to.
    pub page: String,
    /// Components participating in the page.
    pub components: Vec<String>,
    /// The reconciled pending edits, with per-field provenance.
    pub change_history: HashMap<String, FieldChange>,
}

/// Payload submitted to a save endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SavePayload {
    /// Reconciled field values, one per edited field.
    pub fields: Map<String, Value>,
    /// Save context.
    pub metadata: SaveMetadata,
    /// Caller-supplied extra fields, flattened onto the payload root.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of a [`MultiComponentPageState::save_changes`] call.
///
/// Save failures resolve to `success: false` rather than an `Err`, because
/// the coordinator keeps the pending changes and the caller is expected to
/// surface the error and retry.
#[derive(Debug, Clone)]
pub struct SaveResult {
    /// Whether the endpoint accepted the payload.
    pub success: bool,
    /// Endpoint response body on success.
    pub data: Option<Value>,
    /// Failure description on failure.
    pub error: Option<String>,
}

impl SaveResult {
    fn succeeded(data: Option<Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Coordinates field edits and navigation across the components of one
/// logical page.
///
/// One instance corresponds to one page navigation session; the host owns it
/// and re-initializes it when the user navigates to a different page.
pub struct MultiComponentPageState {
    clock: Arc<dyn Clock>,
    page: Option<String>,
    components: Vec<String>,
    active_component: Option<String>,
    component_history: Vec<String>,
    field_state: Map<String, Value>,
    field_changes: HashMap<String, FieldChange>,
    saving: bool,
}

impl Default for MultiComponentPageState {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiComponentPageState {
    /// Uninitialized coordinator with the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Uninitialized coordinator with an injected time source.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            page: None,
            components: Vec::new(),
            active_component: None,
            component_history: Vec::new(),
            field_state: Map::new(),
            field_changes: HashMap::new(),
            saving: false,
        }
    }

    /// Begin a page session.
    ///
    /// The first component is primary and becomes active; the history stack
    /// is reset to it. `initial_fields` replaces the canonical field state
    /// and all pending changes are discarded. Fails when `components` is
    /// empty.
    pub fn initialize_page(
        &mut self,
        page: impl Into<String>,
        components: Vec<String>,
        initial_fields: Map<String, Value>,
    ) -> Result<()> {
        if components.is_empty() {
            return Err(StateError::InvalidInput(
                "a page needs at least one component".to_string(),
            ));
        }

        let primary = components[0].clone();
        self.page = Some(page.into());
        self.active_component = Some(primary.clone());
        self.component_history = vec![primary];
        self.components = components;
        self.field_state = initial_fields;
        self.field_changes.clear();
        self.saving = false;
        Ok(())
    }

    /// Whether `initialize_page` has been called since construction or the
    /// last `reset_page`.
    pub fn is_initialized(&self) -> bool {
        self.page.is_some()
    }

    /// Page identity, once initialized.
    pub fn page(&self) -> Option<&str> {
        self.page.as_deref()
    }

    /// Components participating in the page.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The currently displayed component.
    pub fn active_component(&self) -> Option<&str> {
        self.active_component.as_deref()
    }

    /// Navigation stack; the last element is the active component.
    pub fn component_history(&self) -> &[String] {
        &self.component_history
    }

    /// Switch the active component to `name`.
    ///
    /// Rejected (returns `false`, nothing mutated) when `name` is not one of
    /// the page's components. Navigating to the component already on top of
    /// the history stack activates it without growing the stack.
    pub fn navigate_to_component(&mut self, name: &str) -> bool {
        if !self.components.iter().any(|component| component == name) {
            warn!("navigation rejected: {name} is not a component of this page");
            return false;
        }

        self.active_component = Some(name.to_string());
        if self.component_history.last().map(String::as_str) != Some(name) {
            self.component_history.push(name.to_string());
        }
        true
    }

    /// Pop the history stack and activate the previous component. Returns
    /// `false` without mutating when there is nowhere to go back to.
    pub fn navigate_back(&mut self) -> bool {
        if self.component_history.len() <= 1 {
            return false;
        }
        self.component_history.pop();
        self.active_component = self.component_history.last().cloned();
        true
    }

    /// Record an edit to `name`.
    ///
    /// The canonical field state is updated synchronously, so any component
    /// reading it sees the new value immediately; a pending change recording
    /// the source component and arrival time replaces any earlier pending
    /// change for the same field. `source` defaults to the active component.
    pub fn update_field(&mut self, name: &str, value: Value, source: Option<&str>) {
        let component = source
            .map(str::to_owned)
            .or_else(|| self.active_component.clone())
            .unwrap_or_default();
        let now = self.clock.now_ms();

        self.field_state.insert(name.to_string(), value.clone());
        self.field_changes.insert(
            name.to_string(),
            FieldChange {
                value,
                component,
                timestamp: now,
            },
        );
    }

    /// Canonical value of `name`, if tracked.
    pub fn field_value(&self, name: &str) -> Option<&Value> {
        self.field_state.get(name)
    }

    /// Canonical value of `name`, or `default` when untracked.
    pub fn field_value_or(&self, name: &str, default: Value) -> Value {
        self.field_state.get(name).cloned().unwrap_or(default)
    }

    /// Whether any edits are waiting to be saved.
    pub fn has_pending_changes(&self) -> bool {
        !self.field_changes.is_empty()
    }

    /// The pending edits, keyed by field name.
    pub fn pending_changes(&self) -> &HashMap<String, FieldChange> {
        &self.field_changes
    }

    /// Whether a save is currently awaiting its endpoint.
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Collapse the pending edits to the most recent change per field.
    ///
    /// `update_field` already keeps one change per field with ties broken by
    /// arrival, so this is a snapshot; it is idempotent and does not clear
    /// the pending set.
    pub fn reconcile_changes(&self) -> HashMap<String, FieldChange> {
        self.field_changes.clone()
    }

    /// Submit the reconciled pending edits through `save`.
    ///
    /// With no pending edits this is a no-op success and `save` is never
    /// invoked. On endpoint success the pending set is cleared; on endpoint
    /// failure it is left untouched so the caller can retry, and the failure
    /// is reported in the returned [`SaveResult`]. Calling again while a
    /// save is in flight is a caller error.
    pub async fn save_changes<F, Fut>(
        &mut self,
        save: F,
        extra: Option<Map<String, Value>>,
    ) -> Result<SaveResult>
    where
        F: FnOnce(SavePayload) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if !self.is_initialized() {
            return Err(StateError::PageNotInitialized);
        }
        if self.saving {
            return Err(StateError::SaveInFlight);
        }
        if self.field_changes.is_empty() {
            debug!("save skipped: no pending changes");
            return Ok(SaveResult::succeeded(None));
        }

        let payload = self.build_payload(extra.unwrap_or_default());

        self.saving = true;
        let outcome = save(payload).await;
        self.saving = false;

        match outcome {
            Ok(data) => {
                self.field_changes.clear();
                Ok(SaveResult::succeeded(Some(data)))
            }
            Err(err) => {
                warn!(
                    "save failed, keeping {} pending changes: {err}",
                    self.field_changes.len()
                );
                Ok(SaveResult::failed(err.to_string()))
            }
        }
    }

    /// Return to the uninitialized state, discarding all page, navigation,
    /// and field state.
    pub fn reset_page(&mut self) {
        self.page = None;
        self.components.clear();
        self.active_component = None;
        self.component_history.clear();
        self.field_state = Map::new();
        self.field_changes.clear();
        self.saving = false;
    }

    fn build_payload(&self, extra: Map<String, Value>) -> SavePayload {
        let reconciled = self.reconcile_changes();

        let mut fields = Map::new();
        for (name, change) in &reconciled {
            fields.insert(name.clone(), change.value.clone());
        }

        SavePayload {
            fields,
            metadata: SaveMetadata {
                page: self.page.clone().unwrap_or_default(),
                components: self.components.clone(),
                change_history: reconciled,
            },
            extra,
        }
    }
}
