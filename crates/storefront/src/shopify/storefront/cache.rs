//! Response caches for the Storefront API client.

use std::time::Duration;

use moka::future::Cache;

use crate::shopify::types::{Cart, Product};

/// Product entries live for 5 minutes.
const PRODUCT_TTL: Duration = Duration::from_secs(300);

/// Cart entries live for 60 seconds and are replaced after every mutation.
const CART_TTL: Duration = Duration::from_secs(60);

/// Cached product and cart responses.
#[derive(Clone)]
pub struct StorefrontCache {
    products: Cache<String, Box<Product>>,
    carts: Cache<String, Cart>,
}

impl StorefrontCache {
    pub fn new() -> Self {
        Self {
            products: Cache::builder()
                .max_capacity(1000)
                .time_to_live(PRODUCT_TTL)
                .build(),
            carts: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(CART_TTL)
                .build(),
        }
    }

    pub async fn product(&self, handle: &str) -> Option<Product> {
        self.products.get(handle).await.map(|p| *p)
    }

    pub async fn insert_product(&self, product: &Product) {
        self.products
            .insert(product.handle.clone(), Box::new(product.clone()))
            .await;
    }

    pub async fn cart(&self, cart_id: &str) -> Option<Cart> {
        self.carts.get(cart_id).await
    }

    /// Revalidate the cached cart with a fresh copy from the API.
    pub async fn revalidate_cart(&self, cart_id: &str, cart: &Cart) {
        self.carts.insert(cart_id.to_string(), cart.clone()).await;
    }

    pub async fn invalidate_cart(&self, cart_id: &str) {
        self.carts.invalidate(cart_id).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use zkcart_core::CartId;

    use super::*;
    use crate::shopify::types::{CartCost, Money};

    fn cart(quantity: i64) -> Cart {
        let usd = Money {
            amount: "0.0".to_string(),
            currency_code: "USD".to_string(),
        };
        Cart {
            id: CartId::new("gid://shopify/Cart/c1"),
            checkout_url: "https://shop.example/cart/c/c1".to_string(),
            total_quantity: quantity,
            cost: CartCost {
                subtotal: usd.clone(),
                total: usd,
                total_tax: None,
            },
            discount_codes: vec![],
            lines: vec![],
        }
    }

    #[tokio::test]
    async fn test_revalidate_replaces_cached_cart() {
        let cache = StorefrontCache::new();
        cache.revalidate_cart("c1", &cart(1)).await;
        cache.revalidate_cart("c1", &cart(3)).await;

        assert_eq!(cache.cart("c1").await.unwrap().total_quantity, 3);
    }

    #[tokio::test]
    async fn test_invalidate_cart() {
        let cache = StorefrontCache::new();
        cache.revalidate_cart("c1", &cart(1)).await;
        cache.invalidate_cart("c1").await;

        assert!(cache.cart("c1").await.is_none());
    }
}
