//! Storelink Core - Shared types library.
//!
//! This crate provides common types used across all Storelink components:
//! - `engine` - Product-to-store synchronization and inventory allocation
//! - `integration-tests` - Cross-module test harness
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and shared status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
