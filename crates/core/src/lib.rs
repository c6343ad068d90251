//! zkcart Core - Shared types library.
//!
//! This crate provides the domain types used across zkcart components:
//! - `storefront` - Cart actions, checkout redirect and proof-gated purchases
//! - `integration-tests` - End-to-end tests against mocked external services
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for EVM addresses, Shopify global IDs and
//!   discount-code lists

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
