//! AquaCycle Core - Domain types and business rules.
//!
//! This crate provides the types shared by every AquaCycle component:
//! - `server` - REST API for the factory, branches, drivers and fire brigades
//! - `cli` - Migrations, user bootstrap and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Every rule the server enforces inside a transaction has a
//! pure counterpart here so it can be tested without `PostgreSQL`.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, status vocabularies, roles, emails
//! - [`stock`] - Line items, stock status derivation, reservation planning
//! - [`order`] - Order status machine and document numbering
//! - [`recycling`] - Recycling bin fill math and banding
//! - [`emergency`] - Emergency request transitions
//! - [`geo`] - Haversine distance and the injected geocoding directory
//! - [`payroll`] - Driver payroll arithmetic
//! - [`effect`] - Keys for at-most-once side effects

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod effect;
pub mod emergency;
pub mod error;
pub mod geo;
pub mod order;
pub mod payroll;
pub mod recycling;
pub mod stock;
pub mod types;

pub use error::{DomainError, FieldError};
pub use types::*;
