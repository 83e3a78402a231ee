//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Map repository failures onto typed per-service errors.
//! - Keep the request layer decoupled from storage details.

pub mod notification_service;
pub mod progress_service;
pub mod project_service;
pub mod work_service;
