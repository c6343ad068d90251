//! GraphQL operations for the Shopify Storefront API.
//!
//! Each operation is a zero-sized type implementing
//! [`graphql_client::GraphQLQuery`] with its document, variables and
//! response shape, so the client's `execute::<Q>()` stays generic.

use graphql_client::{GraphQLQuery, QueryBody};
use serde::{Deserialize, Serialize};

// =============================================================================
// Documents
// =============================================================================

macro_rules! cart_fields {
    () => {
        r"
fragment CartFields on Cart {
  id
  checkoutUrl
  totalQuantity
  cost {
    subtotalAmount { amount currencyCode }
    totalAmount { amount currencyCode }
    totalTaxAmount { amount currencyCode }
  }
  discountCodes { code applicable }
  lines(first: 100) {
    edges {
      node {
        id
        quantity
        cost { totalAmount { amount currencyCode } }
        merchandise {
          ... on ProductVariant {
            id
            title
            selectedOptions { name value }
            product {
              handle
              title
              featuredImage { url altText width height }
            }
          }
        }
      }
    }
  }
}
"
    };
}

macro_rules! user_errors {
    () => {
        "userErrors { field message }"
    };
}

const GET_PRODUCT_BY_HANDLE: &str = r#"
query GetProductByHandle($handle: String!) {
  product(handle: $handle) {
    id
    handle
    title
    description
    availableForSale
    options { name optionValues { name } }
    priceRange {
      minVariantPrice { amount currencyCode }
      maxVariantPrice { amount currencyCode }
    }
    featuredImage { url altText width height }
    variants(first: 100) {
      edges {
        node {
          id
          title
          availableForSale
          price { amount currencyCode }
          selectedOptions { name value }
        }
      }
    }
    reclaimProvider: metafield(namespace: "custom", key: "reclaim_provider_id") { value }
    zkpassSchema: metafield(namespace: "custom", key: "zkpass_schema_id") { value }
  }
}
"#;

const GET_VARIANT_PRODUCT: &str = r"
query GetVariantProduct($id: ID!) {
  node(id: $id) {
    ... on ProductVariant { product { handle } }
  }
}
";

const GET_CART: &str = concat!(
    "query GetCart($cartId: ID!) { cart(id: $cartId) { ...CartFields } }",
    cart_fields!()
);

const CREATE_CART: &str = concat!(
    "mutation CreateCart { cartCreate { cart { ...CartFields } ",
    user_errors!(),
    " } }",
    cart_fields!()
);

const ADD_TO_CART: &str = concat!(
    "mutation AddToCart($cartId: ID!, $lines: [CartLineInput!]!) { ",
    "cartLinesAdd(cartId: $cartId, lines: $lines) { cart { ...CartFields } ",
    user_errors!(),
    " } }",
    cart_fields!()
);

const REMOVE_FROM_CART: &str = concat!(
    "mutation RemoveFromCart($cartId: ID!, $lineIds: [ID!]!) { ",
    "cartLinesRemove(cartId: $cartId, lineIds: $lineIds) { cart { ...CartFields } ",
    user_errors!(),
    " } }",
    cart_fields!()
);

const UPDATE_CART_LINES: &str = concat!(
    "mutation UpdateCartLines($cartId: ID!, $lines: [CartLineUpdateInput!]!) { ",
    "cartLinesUpdate(cartId: $cartId, lines: $lines) { cart { ...CartFields } ",
    user_errors!(),
    " } }",
    cart_fields!()
);

const UPDATE_CART_DISCOUNT_CODES: &str = concat!(
    "mutation UpdateCartDiscountCodes($cartId: ID!, $discountCodes: [String!]!) { ",
    "cartDiscountCodesUpdate(cartId: $cartId, discountCodes: $discountCodes) { cart { ...CartFields } ",
    user_errors!(),
    " } }",
    cart_fields!()
);

macro_rules! storefront_operation {
    ($name:ident, $module:ident, $operation:literal, $document:expr) => {
        pub struct $name;

        impl GraphQLQuery for $name {
            type Variables = $module::Variables;
            type ResponseData = $module::ResponseData;

            fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
                QueryBody {
                    variables,
                    query: $document,
                    operation_name: $operation,
                }
            }
        }
    };
}

storefront_operation!(
    GetProductByHandle,
    get_product_by_handle,
    "GetProductByHandle",
    GET_PRODUCT_BY_HANDLE
);
storefront_operation!(
    GetVariantProduct,
    get_variant_product,
    "GetVariantProduct",
    GET_VARIANT_PRODUCT
);
storefront_operation!(GetCart, get_cart, "GetCart", GET_CART);
storefront_operation!(CreateCart, create_cart, "CreateCart", CREATE_CART);
storefront_operation!(AddToCart, add_to_cart, "AddToCart", ADD_TO_CART);
storefront_operation!(
    RemoveFromCart,
    remove_from_cart,
    "RemoveFromCart",
    REMOVE_FROM_CART
);
storefront_operation!(
    UpdateCartLines,
    update_cart_lines,
    "UpdateCartLines",
    UPDATE_CART_LINES
);
storefront_operation!(
    UpdateCartDiscountCodes,
    update_cart_discount_codes,
    "UpdateCartDiscountCodes",
    UPDATE_CART_DISCOUNT_CODES
);

// =============================================================================
// Shared wire types
// =============================================================================

/// `MoneyV2` fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyFields {
    pub amount: String,
    pub currency_code: String,
}

/// `Image` fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFields {
    pub url: String,
    pub alt_text: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

/// `SelectedOption` fields.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectedOptionFields {
    pub name: String,
    pub value: String,
}

/// Relay connection wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
}

/// Relay edge wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

/// `Metafield` value.
#[derive(Debug, Clone, Deserialize)]
pub struct MetafieldValue {
    pub value: String,
}

/// `CartUserError` fields.
#[derive(Debug, Clone, Deserialize)]
pub struct UserErrorFields {
    pub field: Option<Vec<String>>,
    pub message: String,
}

/// `CartFields` fragment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartFields {
    pub id: String,
    pub checkout_url: String,
    pub total_quantity: i64,
    pub cost: CartCostFields,
    pub discount_codes: Vec<DiscountCodeFields>,
    pub lines: Connection<CartLineFields>,
}

/// `CartCost` fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartCostFields {
    pub subtotal_amount: MoneyFields,
    pub total_amount: MoneyFields,
    pub total_tax_amount: Option<MoneyFields>,
}

/// `CartDiscountCode` fields.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscountCodeFields {
    pub code: String,
    pub applicable: bool,
}

/// `BaseCartLine` fields.
#[derive(Debug, Clone, Deserialize)]
pub struct CartLineFields {
    pub id: String,
    pub quantity: i64,
    pub cost: CartLineCostFields,
    pub merchandise: MerchandiseFields,
}

/// `CartLineCost` fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineCostFields {
    pub total_amount: MoneyFields,
}

/// `ProductVariant` fields as seen from a cart line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchandiseFields {
    pub id: String,
    pub title: String,
    pub selected_options: Vec<SelectedOptionFields>,
    pub product: MerchandiseProductFields,
}

/// Parent product of cart merchandise.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchandiseProductFields {
    pub handle: String,
    pub title: String,
    pub featured_image: Option<ImageFields>,
}

/// Payload shared by every cart mutation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartMutationPayload {
    pub cart: Option<CartFields>,
    pub user_errors: Vec<UserErrorFields>,
}

// =============================================================================
// Operation modules
// =============================================================================

pub mod get_product_by_handle {
    use super::{Connection, Deserialize, ImageFields, MetafieldValue, MoneyFields, Serialize};
    use super::SelectedOptionFields;

    #[derive(Debug, Clone, Serialize)]
    pub struct Variables {
        pub handle: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub product: Option<ProductFields>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProductFields {
        pub id: String,
        pub handle: String,
        pub title: String,
        pub description: String,
        pub available_for_sale: bool,
        pub options: Vec<OptionFields>,
        pub price_range: PriceRangeFields,
        pub featured_image: Option<ImageFields>,
        pub variants: Connection<VariantFields>,
        pub reclaim_provider: Option<MetafieldValue>,
        pub zkpass_schema: Option<MetafieldValue>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct OptionFields {
        pub name: String,
        pub option_values: Vec<OptionValueFields>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct OptionValueFields {
        pub name: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PriceRangeFields {
        pub min_variant_price: MoneyFields,
        pub max_variant_price: MoneyFields,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct VariantFields {
        pub id: String,
        pub title: String,
        pub available_for_sale: bool,
        pub price: MoneyFields,
        pub selected_options: Vec<SelectedOptionFields>,
    }
}

pub mod get_variant_product {
    use super::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize)]
    pub struct Variables {
        pub id: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub node: Option<VariantNode>,
    }

    /// Any `Node`; only a `ProductVariant` carries a product.
    #[derive(Debug, Clone, Deserialize)]
    pub struct VariantNode {
        #[serde(default)]
        pub product: Option<VariantProduct>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct VariantProduct {
        pub handle: String,
    }
}

pub mod get_cart {
    use super::{CartFields, Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_id: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub cart: Option<CartFields>,
    }
}

pub mod create_cart {
    use super::{CartMutationPayload, Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize)]
    pub struct Variables {}

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_create: Option<CartMutationPayload>,
    }
}

pub mod add_to_cart {
    use super::{CartMutationPayload, Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_id: String,
        pub lines: Vec<CartLineInput>,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CartLineInput {
        pub merchandise_id: String,
        pub quantity: i64,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_lines_add: Option<CartMutationPayload>,
    }
}

pub mod remove_from_cart {
    use super::{CartMutationPayload, Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_id: String,
        pub line_ids: Vec<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_lines_remove: Option<CartMutationPayload>,
    }
}

pub mod update_cart_lines {
    use super::{CartMutationPayload, Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_id: String,
        pub lines: Vec<CartLineUpdateInput>,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CartLineUpdateInput {
        pub id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub merchandise_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub quantity: Option<i64>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_lines_update: Option<CartMutationPayload>,
    }
}

pub mod update_cart_discount_codes {
    use super::{CartMutationPayload, Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_id: String,
        pub discount_codes: Vec<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_discount_codes_update: Option<CartMutationPayload>,
    }
}
