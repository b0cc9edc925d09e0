//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls and pure lifecycle rules into use-case
//!   level APIs.
//! - Keep the CLI decoupled from storage details.

pub mod executor;
pub mod extension;
pub mod lifecycle_service;
pub mod pause;
