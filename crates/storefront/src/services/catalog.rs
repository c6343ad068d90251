//! Variant selection and per-product proof gates.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::shopify::types::{Product, ProductVariant};

/// The proof a product requires before it can be purchased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofGate {
    /// zkTLS proof from a Reclaim provider.
    Reclaim { provider_id: String },
    /// zkPass `TransGate` proof for a schema.
    ZkPass { schema_id: String },
}

impl ProofGate {
    /// Read the gate from a product's metafields. Reclaim wins when both are set.
    #[must_use]
    pub fn for_product(product: &Product) -> Option<Self> {
        if let Some(provider_id) = &product.gate.reclaim_provider_id {
            return Some(Self::Reclaim {
                provider_id: provider_id.clone(),
            });
        }
        product
            .gate
            .zkpass_schema_id
            .as_ref()
            .map(|schema_id| Self::ZkPass {
                schema_id: schema_id.clone(),
            })
    }

    /// Short name used in templates and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Reclaim { .. } => "reclaim",
            Self::ZkPass { .. } => "zkpass",
        }
    }
}

/// A gated product was not unlocked in this session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("Proof required before purchase")]
    Locked { handle: String },
}

/// Check that a product's gate, if any, has been passed.
///
/// # Errors
///
/// Returns `GateError::Locked` if the product is gated and its handle is not
/// in `unlocked`.
pub fn ensure_unlocked(
    gate: Option<&ProofGate>,
    unlocked: &BTreeSet<String>,
    handle: &str,
) -> Result<(), GateError> {
    match gate {
        Some(_) if !unlocked.contains(handle) => Err(GateError::Locked {
            handle: handle.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Pick the variant matching the selected options.
///
/// `selected` is keyed by lowercase option name. A variant matches when every
/// one of its options has that value selected. With no match, a product with
/// exactly one variant still resolves to it.
#[must_use]
pub fn select_variant<'a>(
    product: &'a Product,
    selected: &BTreeMap<String, String>,
) -> Option<&'a ProductVariant> {
    product
        .variants
        .iter()
        .find(|variant| {
            variant.selected_options.iter().all(|option| {
                selected
                    .get(&option.name.to_lowercase())
                    .is_some_and(|value| *value == option.value)
            })
        })
        .or_else(|| match product.variants.as_slice() {
            [only] => Some(only),
            _ => None,
        })
}
