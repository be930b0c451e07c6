//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Keep transport layers (CLI, request handlers) decoupled from storage.

pub mod registration_service;
