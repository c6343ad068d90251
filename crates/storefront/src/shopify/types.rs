//! Domain types for Shopify Storefront API.
//!
//! These types provide a clean, ergonomic API separate from the raw
//! wire types in `storefront::queries`.

use serde::{Deserialize, Serialize};
use zkcart_core::{CartId, CartLineId, MerchandiseId, ProductId};

// =============================================================================
// Money Types
// =============================================================================

/// Monetary amount with currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Decimal amount as string (preserves precision).
    pub amount: String,
    /// ISO 4217 currency code.
    pub currency_code: String,
}

impl Money {
    /// Format as a display price, e.g. `$19.99` or `19.99 JPY`.
    #[must_use]
    pub fn display(&self) -> String {
        let amount = self.amount.parse::<f64>().map_or_else(
            |_| self.amount.clone(),
            |value| format!("{value:.2}"),
        );

        match self.currency_code.as_str() {
            "USD" | "CAD" | "AUD" => format!("${amount}"),
            "EUR" => format!("€{amount}"),
            "GBP" => format!("£{amount}"),
            "JPY" => format!("¥{}", amount.trim_end_matches(".00")),
            other => format!("{amount} {other}"),
        }
    }
}

/// Price range for a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRange {
    /// Minimum price among all variants.
    pub min_variant_price: Money,
    /// Maximum price among all variants.
    pub max_variant_price: Money,
}

// =============================================================================
// Image Types
// =============================================================================

/// Product image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    /// Image URL.
    pub url: String,
    /// Alt text for accessibility.
    pub alt_text: Option<String>,
    /// Image width in pixels.
    pub width: Option<i64>,
    /// Image height in pixels.
    pub height: Option<i64>,
}

// =============================================================================
// Product Types
// =============================================================================

/// Selected option on a product variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOption {
    /// Option name (e.g., "Size").
    pub name: String,
    /// Selected value (e.g., "Large").
    pub value: String,
}

/// Product option definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductOption {
    /// Option name.
    pub name: String,
    /// Available values.
    pub values: Vec<String>,
}

/// A product variant (specific combination of options).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariant {
    /// Variant ID (the cart's merchandise ID).
    pub id: MerchandiseId,
    /// Variant title (combination of option values).
    pub title: String,
    /// Whether this variant is available for sale.
    pub available_for_sale: bool,
    /// Current price.
    pub price: Money,
    /// Selected options for this variant.
    pub selected_options: Vec<SelectedOption>,
}

/// Proof-gate metafields attached to a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateMetafields {
    /// `custom.reclaim_provider_id` - Reclaim provider the buyer must prove against.
    pub reclaim_provider_id: Option<String>,
    /// `custom.zkpass_schema_id` - zkPass schema the buyer must prove against.
    pub zkpass_schema_id: Option<String>,
}

/// A product in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// URL handle.
    pub handle: String,
    /// Product title.
    pub title: String,
    /// Plain text description.
    pub description: String,
    /// Whether any variant is available.
    pub available_for_sale: bool,
    /// Price range across variants.
    pub price_range: PriceRange,
    /// Featured image.
    pub featured_image: Option<Image>,
    /// Product options.
    pub options: Vec<ProductOption>,
    /// Product variants.
    pub variants: Vec<ProductVariant>,
    /// Proof-gate configuration.
    pub gate: GateMetafields,
}

// =============================================================================
// Cart Types
// =============================================================================

/// Input for adding a line to a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineInput {
    /// Product variant to add.
    pub merchandise_id: MerchandiseId,
    /// Quantity to add.
    pub quantity: i64,
}

/// Input for updating an existing cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineUpdateInput {
    /// Cart line to update.
    pub id: CartLineId,
    /// Variant the line should hold.
    pub merchandise_id: Option<MerchandiseId>,
    /// New quantity.
    pub quantity: Option<i64>,
}

/// Simplified product info for cart merchandise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartMerchandiseProduct {
    /// Product handle.
    pub handle: String,
    /// Product title.
    pub title: String,
    /// Featured image.
    pub featured_image: Option<Image>,
}

/// Merchandise in a cart line (simplified product variant info).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartMerchandise {
    /// Variant ID.
    pub id: MerchandiseId,
    /// Variant title.
    pub title: String,
    /// Selected options.
    pub selected_options: Vec<SelectedOption>,
    /// Parent product info.
    pub product: CartMerchandiseProduct,
}

/// Cost for a cart line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineCost {
    /// Total (after discounts).
    pub total_amount: Money,
}

/// A line item in the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    /// Cart line ID.
    pub id: CartLineId,
    /// Quantity.
    pub quantity: i64,
    /// Line cost.
    pub cost: CartLineCost,
    /// Product variant.
    pub merchandise: CartMerchandise,
}

/// Cart cost summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartCost {
    /// Subtotal before tax/shipping.
    pub subtotal: Money,
    /// Total amount.
    pub total: Money,
    /// Total tax amount.
    pub total_tax: Option<Money>,
}

/// Discount code applied to cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartDiscountCode {
    /// The discount code.
    pub code: String,
    /// Whether the code is applicable.
    pub applicable: bool,
}

/// A shopping cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    /// Cart ID.
    pub id: CartId,
    /// Checkout URL.
    pub checkout_url: String,
    /// Total quantity of items.
    pub total_quantity: i64,
    /// Cost summary.
    pub cost: CartCost,
    /// Applied discount codes.
    pub discount_codes: Vec<CartDiscountCode>,
    /// Line items.
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Find the line holding a given variant.
    #[must_use]
    pub fn line_for_merchandise(&self, merchandise_id: &MerchandiseId) -> Option<&CartLine> {
        self.lines
            .iter()
            .find(|line| &line.merchandise.id == merchandise_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(amount: &str, currency_code: &str) -> Money {
        Money {
            amount: amount.to_string(),
            currency_code: currency_code.to_string(),
        }
    }

    #[test]
    fn test_money_display() {
        assert_eq!(money("19.9", "USD").display(), "$19.90");
        assert_eq!(money("5", "GBP").display(), "£5.00");
        assert_eq!(money("1200.0", "JPY").display(), "¥1200");
        assert_eq!(money("3.5", "CHF").display(), "3.50 CHF");
        assert_eq!(money("n/a", "USD").display(), "$n/a");
    }
}
