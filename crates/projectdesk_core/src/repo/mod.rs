//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Write paths validate records before any SQL mutation.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.
//! - Multi-record writes run inside one IMMEDIATE transaction.

pub mod error;
pub mod notification_repo;
pub mod project_repo;
pub(crate) mod sql;
pub mod work_repo;
