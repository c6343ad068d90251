//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Cart actions (guarded calls into the commerce backend)
//! - `catalog` - Variant selection and per-product proof gates

pub mod cart;
pub mod catalog;

pub use cart::CartActionError;
pub use catalog::{GateError, ProofGate};
