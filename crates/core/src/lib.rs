//! Scratch card core - shared domain types.
//!
//! This crate provides the types used across the scratch card components:
//! - `server` - HTTP API, marketplace integration and order ingestion
//! - `cli` - Command-line tools for migrations and admin management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, usernames and card customization types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
