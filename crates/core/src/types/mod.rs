//! Core types for zkcart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod discount;
pub mod gid;

pub use address::{AddressError, EvmAddress};
pub use discount::DiscountCodes;
pub use gid::*;
