//! zkcart storefront library.
//!
//! Cart and checkout actions for a headless Shopify store, plus the Reclaim
//! and zkPass proof gates that must pass before a gated product can be
//! added to the cart. Built as a library so the integration tests can drive
//! the router against an in-memory commerce backend.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod proof;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
