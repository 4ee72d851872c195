//! AquaCycle server library.
//!
//! The HTTP API is exposed as a library so the router can be driven by
//! integration tests and the CLI can reuse repositories and password
//! hashing.
//!
//! # Layers
//!
//! - [`routes`] - axum handlers, role allow-lists and the response envelope
//! - [`services`] - lifecycle orchestration, one transaction per request
//! - [`db`] - sqlx repositories and transaction-scoped statements
//! - [`models`] - records returned by the API

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
