//! Wire type to domain type conversions.

use zkcart_core::{CartId, CartLineId, MerchandiseId, ProductId};

use crate::shopify::types::{
    Cart, CartCost, CartDiscountCode, CartLine, CartLineCost, CartMerchandise,
    CartMerchandiseProduct, GateMetafields, Image, Money, PriceRange, Product, ProductOption,
    ProductVariant, SelectedOption,
};

use super::queries::{
    CartFields, ImageFields, MetafieldValue, MoneyFields, SelectedOptionFields, UserErrorFields,
    get_product_by_handle,
};

impl From<MoneyFields> for Money {
    fn from(m: MoneyFields) -> Self {
        Self {
            amount: m.amount,
            currency_code: m.currency_code,
        }
    }
}

impl From<ImageFields> for Image {
    fn from(i: ImageFields) -> Self {
        Self {
            url: i.url,
            alt_text: i.alt_text,
            width: i.width,
            height: i.height,
        }
    }
}

impl From<SelectedOptionFields> for SelectedOption {
    fn from(o: SelectedOptionFields) -> Self {
        Self {
            name: o.name,
            value: o.value,
        }
    }
}

pub fn convert_cart(cart: CartFields) -> Cart {
    Cart {
        id: CartId::new(cart.id),
        checkout_url: cart.checkout_url,
        total_quantity: cart.total_quantity,
        cost: CartCost {
            subtotal: cart.cost.subtotal_amount.into(),
            total: cart.cost.total_amount.into(),
            total_tax: cart.cost.total_tax_amount.map(Money::from),
        },
        discount_codes: cart
            .discount_codes
            .into_iter()
            .map(|d| CartDiscountCode {
                code: d.code,
                applicable: d.applicable,
            })
            .collect(),
        lines: cart
            .lines
            .edges
            .into_iter()
            .map(|edge| {
                let line = edge.node;
                CartLine {
                    id: CartLineId::new(line.id),
                    quantity: line.quantity,
                    cost: CartLineCost {
                        total_amount: line.cost.total_amount.into(),
                    },
                    merchandise: CartMerchandise {
                        id: MerchandiseId::new(line.merchandise.id),
                        title: line.merchandise.title,
                        selected_options: line
                            .merchandise
                            .selected_options
                            .into_iter()
                            .map(SelectedOption::from)
                            .collect(),
                        product: CartMerchandiseProduct {
                            handle: line.merchandise.product.handle,
                            title: line.merchandise.product.title,
                            featured_image: line.merchandise.product.featured_image.map(Image::from),
                        },
                    },
                }
            })
            .collect(),
    }
}

/// Metafield values are trimmed; blank values mean "no gate".
fn metafield_value(field: Option<MetafieldValue>) -> Option<String> {
    field
        .map(|f| f.value.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn convert_product(product: get_product_by_handle::ProductFields) -> Product {
    Product {
        id: ProductId::new(product.id),
        handle: product.handle,
        title: product.title,
        description: product.description,
        available_for_sale: product.available_for_sale,
        price_range: PriceRange {
            min_variant_price: product.price_range.min_variant_price.into(),
            max_variant_price: product.price_range.max_variant_price.into(),
        },
        featured_image: product.featured_image.map(Image::from),
        options: product
            .options
            .into_iter()
            .map(|o| ProductOption {
                name: o.name,
                values: o.option_values.into_iter().map(|v| v.name).collect(),
            })
            .collect(),
        variants: product
            .variants
            .edges
            .into_iter()
            .map(|edge| ProductVariant {
                id: MerchandiseId::new(edge.node.id),
                title: edge.node.title,
                available_for_sale: edge.node.available_for_sale,
                price: edge.node.price.into(),
                selected_options: edge
                    .node
                    .selected_options
                    .into_iter()
                    .map(SelectedOption::from)
                    .collect(),
            })
            .collect(),
        gate: GateMetafields {
            reclaim_provider_id: metafield_value(product.reclaim_provider),
            zkpass_schema_id: metafield_value(product.zkpass_schema),
        },
    }
}

/// Join mutation user errors into one message, prefixed by the offending field.
pub fn join_user_errors(errors: Vec<UserErrorFields>) -> String {
    errors
        .into_iter()
        .map(|e| match e.field {
            Some(field) if !field.is_empty() => format!("{}: {}", field.join("."), e.message),
            _ => e.message,
        })
        .collect::<Vec<_>>()
        .join("; ")
}
