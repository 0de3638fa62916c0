//! # dashstate - dashboard state core for admin panels
//!
//! Process-local state plumbing for admin-panel front ends: a TTL-based
//! cache for dashboard payloads, and a coordinator that lets several UI
//! components cooperate on one logical record.
//!
//! ## Features
//!
//! - **Dashboard cache**: namespaced TTL cache with hit/miss accounting,
//!   oldest-first capacity eviction, and optional durable persistence
//!   ([`DashboardCache`])
//! - **Page coordination**: canonical field state, last-write-wins edit
//!   reconciliation, and component navigation history
//!   ([`MultiComponentPageState`])
//! - **Pluggable collaborators**: storage backends, time sources, and save
//!   endpoints are injected at construction; there are no ambient singletons
//! - **Graceful degradation**: persistence failures are logged and swallowed,
//!   never surfaced to page renders
//!
//! ## Caching dashboard data
//!
//! ```
//! use dashstate::{CacheConfig, DashboardCache, Namespace};
//! use serde_json::json;
//!
//! let mut cache = DashboardCache::new(CacheConfig::default());
//!
//! // On miss, fetch fresh data and store it.
//! if cache.get(Namespace::Dashboards, "sales").is_none() {
//!     let fresh = json!({"total": 100});
//!     cache.set(Namespace::Dashboards, "sales", fresh, Some(5_000));
//! }
//!
//! assert!(cache.get(Namespace::Dashboards, "sales").is_some());
//! ```
//!
//! ## Coordinating a multi-component page
//!
//! ```
//! use dashstate::MultiComponentPageState;
//! use serde_json::{json, Map};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> dashstate::Result<()> {
//! let mut page = MultiComponentPageState::new();
//! page.initialize_page(
//!     "Wizard",
//!     vec!["Step1".into(), "Step2".into()],
//!     Map::new(),
//! )?;
//!
//! page.update_field("name", json!("Acme"), None);
//! page.navigate_to_component("Step2");
//! page.update_field("name", json!("Acme Corp"), None);
//!
//! // The merged record goes to any async save function; see
//! // `HttpSaveEndpoint` for the HTTP case.
//! let result = page
//!     .save_changes(|payload| async move {
//!         assert_eq!(payload.fields["name"], json!("Acme Corp"));
//!         Ok(json!({"saved": true}))
//!     }, None)
//!     .await?;
//!
//! assert!(result.success);
//! assert!(!page.has_pending_changes());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error handling
//!
//! Cache misses are ordinary control flow (`Option`), and a failing storage
//! backend degrades the cache to memory-only. Save failures are the one
//! class of error that must reach the caller: they come back as
//! `SaveResult { success: false, .. }` with the pending edits retained for
//! retry. See [`StateError`] for the caller-error taxonomy.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]

pub mod cache;
pub mod clock;
pub mod error;
pub mod page;

pub use crate::cache::storage::{CacheStorage, JsonFileStorage, MemoryStorage, StorageConfig};
pub use crate::cache::ttl::{CacheEntry, TtlStore};
pub use crate::cache::{CacheConfig, CacheStats, DashboardCache, KeyStats, Namespace};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::error::{Result, StateError};
pub use crate::page::save::HttpSaveEndpoint;
pub use crate::page::{
    FieldChange, MultiComponentPageState, SaveMetadata, SavePayload, SaveResult,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        CacheConfig, DashboardCache, MultiComponentPageState, Namespace, Result, StateError,
    };
}
