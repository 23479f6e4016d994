//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate tree mutations, snapshot publishing and persistence.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod tree_manager;
