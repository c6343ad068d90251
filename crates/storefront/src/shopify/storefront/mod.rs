//! Shopify Storefront API client implementation.
//!
//! Uses `graphql_client` envelopes with `reqwest` 0.13 for HTTP.
//! Caches products (5-minute TTL) and carts (60-second TTL) using `moka`.

mod cache;
mod conversions;
pub mod queries;

use std::sync::Arc;

use async_trait::async_trait;
use graphql_client::{GraphQLQuery, Response};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};
use zkcart_core::{CartLineId, MerchandiseId};

use crate::config::ShopifyStorefrontConfig;
use crate::shopify::types::{Cart, CartLineInput, CartLineUpdateInput, Product};
use crate::shopify::{CommerceBackend, GraphQLError, GraphQLErrorLocation, ShopifyError};

use cache::StorefrontCache;
use conversions::{convert_cart, convert_product, join_user_errors};
use queries::{
    AddToCart, CartMutationPayload, CreateCart, GetCart, GetProductByHandle, GetVariantProduct,
    RemoveFromCart, UpdateCartDiscountCodes, UpdateCartLines, add_to_cart, create_cart, get_cart,
    get_product_by_handle, get_variant_product, remove_from_cart, update_cart_discount_codes,
    update_cart_lines,
};

// =============================================================================
// StorefrontClient
// =============================================================================

/// Client for the Shopify Storefront API.
///
/// Provides type-safe access to products and cart operations.
#[derive(Clone)]
pub struct StorefrontClient {
    inner: Arc<StorefrontClientInner>,
}

struct StorefrontClientInner {
    client: reqwest::Client,
    endpoint: String,
    access_token: SecretString,
    cache: StorefrontCache,
}

impl StorefrontClient {
    /// Create a new Storefront API client.
    #[must_use]
    pub fn new(config: &ShopifyStorefrontConfig) -> Self {
        let endpoint = format!(
            "https://{}/api/{}/graphql.json",
            config.store, config.api_version
        );

        Self {
            inner: Arc::new(StorefrontClientInner {
                client: reqwest::Client::new(),
                endpoint,
                access_token: config.storefront_private_token.clone(),
                cache: StorefrontCache::new(),
            }),
        }
    }

    /// Execute a GraphQL operation.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, ShopifyError> {
        let request_body = Q::build_query(variables);

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            // Private access tokens use a different header than public tokens
            // See: https://shopify.dev/docs/storefronts/headless/building-with-the-storefront-api/getting-started
            .header(
                "Shopify-Storefront-Private-Token",
                self.inner.access_token.expose_secret(),
            )
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Shopify API returned non-success status"
            );
            return Err(ShopifyError::GraphQL(vec![GraphQLError::message(format!(
                "HTTP {status}: {}",
                response_text.chars().take(200).collect::<String>()
            ))]));
        }

        let response: Response<Q::ResponseData> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse Shopify GraphQL response"
                );
                return Err(ShopifyError::Parse(e));
            }
        };

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            tracing::debug!(errors = ?errors, "GraphQL errors in response");

            return Err(ShopifyError::GraphQL(
                errors
                    .into_iter()
                    .map(|e| GraphQLError {
                        message: e.message,
                        locations: e.locations.map_or_else(Vec::new, |locs| {
                            locs.into_iter()
                                .map(|l| GraphQLErrorLocation {
                                    line: i64::from(l.line),
                                    column: i64::from(l.column),
                                })
                                .collect()
                        }),
                        path: e.path.map_or_else(Vec::new, |p| {
                            p.into_iter()
                                .map(|fragment| match fragment {
                                    graphql_client::PathFragment::Key(s) => {
                                        serde_json::Value::String(s)
                                    }
                                    graphql_client::PathFragment::Index(i) => {
                                        serde_json::Value::Number(i.into())
                                    }
                                })
                                .collect()
                        }),
                    })
                    .collect(),
            ));
        }

        response.data.ok_or_else(|| {
            tracing::error!(
                body = %response_text.chars().take(500).collect::<String>(),
                "Shopify GraphQL response has no data and no errors"
            );
            ShopifyError::GraphQL(vec![GraphQLError::message("No data in response")])
        })
    }

    /// Unwrap a cart mutation payload and revalidate the cached cart.
    ///
    /// A rejected mutation drops the cached cart so the next read goes to
    /// the API.
    async fn finish_mutation(
        &self,
        cart_id: &str,
        payload: Option<CartMutationPayload>,
        failure: &str,
    ) -> Result<Cart, ShopifyError> {
        match mutation_cart(payload, failure) {
            Ok(cart) => {
                self.inner.cache.revalidate_cart(cart_id, &cart).await;
                Ok(cart)
            }
            Err(e) => {
                self.inner.cache.invalidate_cart(cart_id).await;
                Err(e)
            }
        }
    }
}

/// Pull the cart out of a mutation payload, surfacing any user errors.
fn mutation_cart(payload: Option<CartMutationPayload>, failure: &str) -> Result<Cart, ShopifyError> {
    let Some(payload) = payload else {
        return Err(ShopifyError::GraphQL(vec![GraphQLError::message(failure)]));
    };

    if !payload.user_errors.is_empty() {
        return Err(ShopifyError::UserError(join_user_errors(
            payload.user_errors,
        )));
    }

    payload
        .cart
        .map(convert_cart)
        .ok_or_else(|| ShopifyError::GraphQL(vec![GraphQLError::message(failure)]))
}

#[async_trait]
impl CommerceBackend for StorefrontClient {
    /// Create a new empty cart.
    #[instrument(skip(self))]
    async fn create_cart(&self) -> Result<Cart, ShopifyError> {
        let data = self
            .execute::<CreateCart>(create_cart::Variables {})
            .await?;

        let cart = mutation_cart(data.cart_create, "Failed to create cart")?;
        self.inner
            .cache
            .revalidate_cart(cart.id.as_str(), &cart)
            .await;
        Ok(cart)
    }

    /// Get an existing cart (cached for 60 seconds).
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn get_cart(&self, cart_id: &str) -> Result<Option<Cart>, ShopifyError> {
        if let Some(cart) = self.inner.cache.cart(cart_id).await {
            debug!("Cache hit for cart");
            return Ok(Some(cart));
        }

        let variables = get_cart::Variables {
            cart_id: cart_id.to_string(),
        };

        let data = self.execute::<GetCart>(variables).await?;

        let Some(cart) = data.cart.map(convert_cart) else {
            return Ok(None);
        };

        self.inner.cache.revalidate_cart(cart_id, &cart).await;
        Ok(Some(cart))
    }

    /// Add lines to a cart.
    #[instrument(skip(self, lines), fields(cart_id = %cart_id))]
    async fn add_to_cart(
        &self,
        cart_id: &str,
        lines: Vec<CartLineInput>,
    ) -> Result<Cart, ShopifyError> {
        let variables = add_to_cart::Variables {
            cart_id: cart_id.to_string(),
            lines: lines
                .into_iter()
                .map(|line| add_to_cart::CartLineInput {
                    merchandise_id: line.merchandise_id.into_inner(),
                    quantity: line.quantity,
                })
                .collect(),
        };

        let data = self.execute::<AddToCart>(variables).await?;
        self.finish_mutation(cart_id, data.cart_lines_add, "Failed to add to cart")
            .await
    }

    /// Remove lines from a cart.
    #[instrument(skip(self, line_ids), fields(cart_id = %cart_id))]
    async fn remove_from_cart(
        &self,
        cart_id: &str,
        line_ids: Vec<CartLineId>,
    ) -> Result<Cart, ShopifyError> {
        let variables = remove_from_cart::Variables {
            cart_id: cart_id.to_string(),
            line_ids: line_ids.into_iter().map(CartLineId::into_inner).collect(),
        };

        let data = self.execute::<RemoveFromCart>(variables).await?;
        self.finish_mutation(
            cart_id,
            data.cart_lines_remove,
            "Failed to remove from cart",
        )
        .await
    }

    /// Update cart lines.
    #[instrument(skip(self, lines), fields(cart_id = %cart_id))]
    async fn update_cart(
        &self,
        cart_id: &str,
        lines: Vec<CartLineUpdateInput>,
    ) -> Result<Cart, ShopifyError> {
        let variables = update_cart_lines::Variables {
            cart_id: cart_id.to_string(),
            lines: lines
                .into_iter()
                .map(|line| update_cart_lines::CartLineUpdateInput {
                    id: line.id.into_inner(),
                    merchandise_id: line.merchandise_id.map(Into::into),
                    quantity: line.quantity,
                })
                .collect(),
        };

        let data = self.execute::<UpdateCartLines>(variables).await?;
        self.finish_mutation(cart_id, data.cart_lines_update, "Failed to update cart")
            .await
    }

    /// Update discount codes on a cart.
    #[instrument(skip(self, discount_codes), fields(cart_id = %cart_id))]
    async fn update_discount_codes(
        &self,
        cart_id: &str,
        discount_codes: Vec<String>,
    ) -> Result<Cart, ShopifyError> {
        let variables = update_cart_discount_codes::Variables {
            cart_id: cart_id.to_string(),
            discount_codes,
        };

        let data = self.execute::<UpdateCartDiscountCodes>(variables).await?;
        self.finish_mutation(
            cart_id,
            data.cart_discount_codes_update,
            "Failed to update discount codes",
        )
        .await
    }

    /// Get a product by its handle (cached for 5 minutes).
    #[instrument(skip(self), fields(handle = %handle))]
    async fn get_product_by_handle(&self, handle: &str) -> Result<Option<Product>, ShopifyError> {
        if let Some(product) = self.inner.cache.product(handle).await {
            debug!("Cache hit for product");
            return Ok(Some(product));
        }

        let variables = get_product_by_handle::Variables {
            handle: handle.to_string(),
        };

        let data = self.execute::<GetProductByHandle>(variables).await?;

        let Some(product) = data.product.map(convert_product) else {
            return Ok(None);
        };

        self.inner.cache.insert_product(&product).await;
        Ok(Some(product))
    }

    /// Resolve the product a variant belongs to.
    #[instrument(skip(self), fields(merchandise_id = %merchandise_id))]
    async fn get_product_by_variant(
        &self,
        merchandise_id: &MerchandiseId,
    ) -> Result<Option<Product>, ShopifyError> {
        let variables = get_variant_product::Variables {
            id: merchandise_id.as_str().to_string(),
        };

        let data = self.execute::<GetVariantProduct>(variables).await?;

        let Some(handle) = data.node.and_then(|node| node.product).map(|p| p.handle) else {
            return Ok(None);
        };

        self.get_product_by_handle(&handle).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use queries::UserErrorFields;

    #[test]
    fn test_mutation_cart_missing_payload() {
        let err = mutation_cart(None, "Failed to add to cart").unwrap_err();
        assert_eq!(err.to_string(), "GraphQL errors: Failed to add to cart");
    }

    #[test]
    fn test_mutation_cart_user_errors() {
        let payload = CartMutationPayload {
            cart: None,
            user_errors: vec![UserErrorFields {
                field: Some(vec!["discountCodes".to_string()]),
                message: "Code is invalid".to_string(),
            }],
        };
        let err = mutation_cart(Some(payload), "Failed").unwrap_err();
        assert!(matches!(err, ShopifyError::UserError(ref m) if m == "discountCodes: Code is invalid"));
    }
}
