//! Domain model for projects and their work hierarchy.
//!
//! # Responsibility
//! - Define canonical records shared by repositories and services.
//! - Own field-level validation that must hold before persistence.
//!
//! # Invariants
//! - Every record is identified by a stable UUID v4.
//! - Timestamps are Unix epoch milliseconds.
//! - Completion and progress are derived values and never live on a record.

pub mod notification;
pub mod project;
pub mod user;
pub mod validation;
pub mod work;
