//! Shared type definitions for the Sightline known-list engine.
//!
//! This crate is the single source of truth for identifiers and small
//! value types used across the workspace.
//!
//! # Modules
//!
//! - [`ids`] -- Integer identifier newtypes for objects and regions
//! - [`enums`] -- Object kinds and AI intentions
//! - [`notification`] -- Outbound notifications emitted by the core

pub mod enums;
pub mod ids;
pub mod notification;

pub use enums::{Intention, ObjectKind};
pub use ids::{ObjectId, RegionId};
pub use notification::Notification;
