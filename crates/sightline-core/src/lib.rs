//! Known-list refresh scheduling and engagement tracking for Sightline.
//!
//! This crate keeps every live object aware of the objects near it and
//! tracks which actors are currently in combat.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `sightline-config.yaml`.
//! - [`engagement`] -- [`EngagementTracker`]: attack-stance records and
//!   their expiry sweep.
//! - [`hooks`] -- Known-list specializations for guards, monsters, and
//!   players.
//! - [`notify`] -- The [`Notifier`] seam to the outbound layer.
//! - [`refresh`] -- [`KnownListRefresher`]: the alternating forget/add
//!   refresh cycle with per-region fault isolation.
//! - [`runtime`] -- [`Runtime`]: process-lifetime wiring of all of the
//!   above.
//! - [`service`] -- Periodic background units and their handles.
//!
//! [`EngagementTracker`]: engagement::EngagementTracker
//! [`KnownListRefresher`]: refresh::KnownListRefresher
//! [`Notifier`]: notify::Notifier
//! [`Runtime`]: runtime::Runtime

pub mod config;
pub mod engagement;
pub mod hooks;
pub mod notify;
pub mod refresh;
pub mod runtime;
pub mod service;
