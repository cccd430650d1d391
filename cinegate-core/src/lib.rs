//! # Cinegate Core
//!
//! Entitlement and quota engine for a streaming catalog. Given a viewer, an
//! asset and a requested resolution, the engine decides whether playback may
//! start and meters the view against the viewer's daily allowance and
//! invite-earned bonus credits.
//!
//! ## Overview
//!
//! - **Plan Registry** ([`domain::entitlements::registry`]): total, immutable
//!   mapping from [`Plan`](cinegate_model::Plan) to capabilities
//! - **Daily Counter Manager** ([`domain::entitlements::counter`]):
//!   calendar-day reset rule in a fixed reference timezone
//! - **Bonus Ledger** ([`domain::entitlements::bonus`]): idempotent credits,
//!   spent before the daily allowance
//! - **Access Decision Function** ([`domain::entitlements::access`]): adult,
//!   resolution and quota gates, in that order
//! - **Invite Tracker** ([`domain::referrals`]): invite lifecycle feeding the
//!   bonus ledger
//!
//! Persistence is behind the [`database::ports`] traits. In-memory stores are
//! always available; Postgres stores ship with the `database` feature.
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cinegate_core::{
//!     clock::SystemClock,
//!     database::infrastructure::memory::InMemoryAccountStore,
//!     domain::entitlements::{AccessEngine, PlanRegistry},
//! };
//! use cinegate_model::{Asset, ResolutionTier, WatchRequest};
//!
//! async fn watch() {
//!     let engine = AccessEngine::new(
//!         Arc::new(InMemoryAccountStore::new()),
//!         Arc::new(PlanRegistry::default()),
//!         Arc::new(SystemClock),
//!     );
//!     let request = WatchRequest::anonymous(
//!         Asset::new("the-matrix", false),
//!         ResolutionTier::P480,
//!     );
//!     let decision = engine.decide(&request).await;
//!     println!("allowed: {}", decision.allowed);
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Injectable time source
pub mod clock;

/// Persistence ports and their implementations
pub mod database;

/// Entitlement, account and referral business logic
pub mod domain;

/// Store error types
pub mod error;

/// Runtime knobs shared by the engine services
pub mod settings;

#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use error::{StoreError, StoreResult};
pub use settings::EngineSettings;
