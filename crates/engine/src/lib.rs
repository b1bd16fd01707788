//! Storelink engine - master product to external store synchronization.
//!
//! The engine maintains one dashboard master record per product and
//! propagates it into any number of connected external commerce systems
//! ("stores"), each with its own identity space, option/variant graph and
//! inventory ledger.
//!
//! # Architecture
//!
//! - [`payload`] - Pure translation of a master product into a normalized
//!   upsert payload honoring the external system's structural constraints
//! - [`gateway`] - Trait boundary to the external system (upsert, live
//!   inventory, locations); the transport client lives one layer below
//! - [`store`] - Persistence and reconciliation of the per-(product, store)
//!   mapping aggregate
//! - [`inventory`] - Assignment and remote-observation bookkeeping on a
//!   mapping's variant ledger
//! - [`allocation`] - Advisory inventory distribution across fulfillment
//!   locations
//! - [`bulk`] - Batched concurrent fan-out across many products with
//!   isolated partial failure
//! - [`service`] - The facade the API layer calls into
//!
//! # Example
//!
//! ```rust,ignore
//! use storelink_engine::service::{SyncOptions, SyncService};
//!
//! let service = SyncService::new(catalog, gateway, repository);
//! let outcome = service
//!     .sync(product_id, store_id, &SyncOptions::default())
//!     .await?;
//! println!("{} -> {}", outcome.operation, outcome.external_product_id);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod allocation;
pub mod bulk;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod payload;
pub mod service;
pub mod store;
pub mod types;

pub use error::SyncError;
pub use service::SyncService;
