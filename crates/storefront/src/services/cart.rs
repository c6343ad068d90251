//! Cart actions.
//!
//! Each action is a guarded call into the commerce backend. The cart ID comes
//! from the session and may be missing; every backend failure collapses into
//! one fixed, user-facing message per action.

use thiserror::Error;
use tracing::instrument;
use zkcart_core::{DiscountCodes, MerchandiseId};

use crate::shopify::types::{Cart, CartLineInput, CartLineUpdateInput};
use crate::shopify::{CommerceBackend, ShopifyError};

/// Cart action failures. The `Display` text is shown to shoppers as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartActionError {
    #[error("Missing cart ID")]
    MissingCartId,

    /// No cart or no variant selected when adding.
    #[error("Error adding item to cart")]
    MissingLineInput,

    #[error("Error adding item to cart")]
    AddItem,

    #[error("Error fetching cart")]
    FetchCart,

    #[error("Item not found in cart")]
    ItemNotFound,

    #[error("Error removing item from cart")]
    RemoveItem,

    #[error("Error updating item quantity")]
    UpdateQuantity,

    #[error("Error creating cart")]
    CreateCart,

    #[error("Error applying discount. Discount code required.")]
    DiscountCodeRequired,

    #[error("Error removing discount. Discount code required.")]
    RemoveDiscountCodeRequired,

    /// Also reported when removing a discount fails.
    #[error("Error applying discount")]
    ApplyDiscount,
}

impl CartActionError {
    /// Whether the shopper's request was incomplete, as opposed to the
    /// backend failing.
    #[must_use]
    pub const fn is_missing_input(&self) -> bool {
        matches!(
            self,
            Self::MissingCartId
                | Self::MissingLineInput
                | Self::DiscountCodeRequired
                | Self::RemoveDiscountCodeRequired
        )
    }
}

fn log_backend_error(action: &str, err: &ShopifyError) {
    tracing::error!(action, error = %err, "Cart backend call failed");
}

/// Fetch the session's cart, mapping errors to the action's message.
async fn fetch_cart(
    backend: &dyn CommerceBackend,
    cart_id: &str,
    on_error: CartActionError,
) -> Result<Cart, CartActionError> {
    match backend.get_cart(cart_id).await {
        Ok(Some(cart)) => Ok(cart),
        Ok(None) => Err(CartActionError::FetchCart),
        Err(e) => {
            log_backend_error("get_cart", &e);
            Err(on_error)
        }
    }
}

/// Add one unit of the selected variant.
///
/// # Errors
///
/// `MissingLineInput` without a cart or variant (the backend is not called),
/// `AddItem` if the backend fails.
#[instrument(skip(backend))]
pub async fn add_item(
    backend: &dyn CommerceBackend,
    cart_id: Option<&str>,
    selected_variant_id: Option<&MerchandiseId>,
) -> Result<Cart, CartActionError> {
    let (Some(cart_id), Some(variant_id)) = (cart_id, selected_variant_id) else {
        return Err(CartActionError::MissingLineInput);
    };

    backend
        .add_to_cart(
            cart_id,
            vec![CartLineInput {
                merchandise_id: variant_id.clone(),
                quantity: 1,
            }],
        )
        .await
        .map_err(|e| {
            log_backend_error("add_to_cart", &e);
            CartActionError::AddItem
        })
}

/// Remove the line holding a variant.
///
/// # Errors
///
/// `MissingCartId`, `FetchCart` if the cart does not exist, `ItemNotFound`
/// if no line holds the variant, `RemoveItem` if the backend fails.
#[instrument(skip(backend))]
pub async fn remove_item(
    backend: &dyn CommerceBackend,
    cart_id: Option<&str>,
    merchandise_id: &MerchandiseId,
) -> Result<Cart, CartActionError> {
    let cart_id = cart_id.ok_or(CartActionError::MissingCartId)?;
    let cart = fetch_cart(backend, cart_id, CartActionError::RemoveItem).await?;

    let line = cart
        .line_for_merchandise(merchandise_id)
        .ok_or(CartActionError::ItemNotFound)?;

    backend
        .remove_from_cart(cart_id, vec![line.id.clone()])
        .await
        .map_err(|e| {
            log_backend_error("remove_from_cart", &e);
            CartActionError::RemoveItem
        })
}

/// Set the quantity of a variant in the cart.
///
/// Zero or less removes an existing line; a missing line is added when the
/// quantity is positive. Zero or less for a missing line changes nothing.
///
/// # Errors
///
/// `MissingCartId`, `FetchCart` if the cart does not exist,
/// `UpdateQuantity` if the backend fails.
#[instrument(skip(backend))]
pub async fn update_item_quantity(
    backend: &dyn CommerceBackend,
    cart_id: Option<&str>,
    merchandise_id: &MerchandiseId,
    quantity: i64,
) -> Result<Cart, CartActionError> {
    let cart_id = cart_id.ok_or(CartActionError::MissingCartId)?;
    let cart = fetch_cart(backend, cart_id, CartActionError::UpdateQuantity).await?;

    let line_id = cart
        .line_for_merchandise(merchandise_id)
        .map(|line| line.id.clone());

    let result = match (line_id, quantity) {
        (Some(line_id), quantity) if quantity <= 0 => {
            backend.remove_from_cart(cart_id, vec![line_id]).await
        }
        (Some(line_id), quantity) => {
            backend
                .update_cart(
                    cart_id,
                    vec![CartLineUpdateInput {
                        id: line_id,
                        merchandise_id: Some(merchandise_id.clone()),
                        quantity: Some(quantity),
                    }],
                )
                .await
        }
        (None, quantity) if quantity <= 0 => return Ok(cart),
        (None, quantity) => {
            backend
                .add_to_cart(
                    cart_id,
                    vec![CartLineInput {
                        merchandise_id: merchandise_id.clone(),
                        quantity,
                    }],
                )
                .await
        }
    };

    result.map_err(|e| {
        log_backend_error("update_item_quantity", &e);
        CartActionError::UpdateQuantity
    })
}

/// Resolve the checkout URL of the session's cart.
///
/// # Errors
///
/// `MissingCartId`, or `FetchCart` if the cart cannot be fetched.
#[instrument(skip(backend))]
pub async fn redirect_to_checkout(
    backend: &dyn CommerceBackend,
    cart_id: Option<&str>,
) -> Result<String, CartActionError> {
    let cart_id = cart_id.ok_or(CartActionError::MissingCartId)?;
    let cart = fetch_cart(backend, cart_id, CartActionError::FetchCart).await?;
    Ok(cart.checkout_url)
}

/// Create an empty cart. The caller stores its ID in the session.
///
/// # Errors
///
/// `CreateCart` if the backend fails.
#[instrument(skip(backend))]
pub async fn create_cart_and_set_cookie(
    backend: &dyn CommerceBackend,
) -> Result<Cart, CartActionError> {
    backend.create_cart().await.map_err(|e| {
        log_backend_error("create_cart", &e);
        CartActionError::CreateCart
    })
}

/// Apply a discount code. Only one code is active at a time, so the cart's
/// codes are replaced by this one.
///
/// # Errors
///
/// `MissingCartId`, `DiscountCodeRequired` for a blank code,
/// `ApplyDiscount` if the backend fails.
#[instrument(skip(backend))]
pub async fn apply_discount(
    backend: &dyn CommerceBackend,
    cart_id: Option<&str>,
    discount_code: Option<&str>,
) -> Result<Cart, CartActionError> {
    let cart_id = cart_id.ok_or(CartActionError::MissingCartId)?;

    let codes = DiscountCodes::default().with_code(discount_code.unwrap_or_default());
    if codes.is_empty() {
        return Err(CartActionError::DiscountCodeRequired);
    }

    backend
        .update_discount_codes(cart_id, codes.into_vec())
        .await
        .map_err(|e| {
            log_backend_error("update_discount_codes", &e);
            CartActionError::ApplyDiscount
        })
}

/// Remove a discount code from the codes currently on the cart.
///
/// # Errors
///
/// `MissingCartId`, `RemoveDiscountCodeRequired` for a blank code,
/// `ApplyDiscount` if the backend fails.
#[instrument(skip(backend))]
pub async fn remove_discount(
    backend: &dyn CommerceBackend,
    cart_id: Option<&str>,
    discount_code: Option<&str>,
    current_codes: &[String],
) -> Result<Cart, CartActionError> {
    let cart_id = cart_id.ok_or(CartActionError::MissingCartId)?;

    let code = discount_code.map(str::trim).unwrap_or_default();
    if code.is_empty() {
        return Err(CartActionError::RemoveDiscountCodeRequired);
    }

    let codes = DiscountCodes::from_codes(current_codes).without_code(code);

    backend
        .update_discount_codes(cart_id, codes.into_vec())
        .await
        .map_err(|e| {
            log_backend_error("update_discount_codes", &e);
            CartActionError::ApplyDiscount
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use zkcart_core::{CartId, CartLineId};

    use super::*;
    use crate::shopify::GraphQLError;
    use crate::shopify::types::{
        CartCost, CartDiscountCode, CartLine, CartLineCost, CartMerchandise,
        CartMerchandiseProduct, Money, Product,
    };

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Get,
        Add(Vec<CartLineInput>),
        Remove(Vec<CartLineId>),
        Update(Vec<CartLineUpdateInput>),
        Discounts(Vec<String>),
        Create,
    }

    /// Records calls and serves a fixed cart.
    struct FakeBackend {
        cart: Option<Cart>,
        fail_mutations: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeBackend {
        fn with_cart(cart: Option<Cart>) -> Self {
            Self {
                cart,
                fail_mutations: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(cart: Option<Cart>) -> Self {
            Self {
                fail_mutations: true,
                ..Self::with_cart(cart)
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn mutate(&self, call: Call) -> Result<Cart, ShopifyError> {
            self.calls.lock().unwrap().push(call);
            if self.fail_mutations {
                return Err(ShopifyError::GraphQL(vec![GraphQLError::message("boom")]));
            }
            Ok(self.cart.clone().unwrap_or_else(|| cart(&[])))
        }
    }

    #[async_trait]
    impl CommerceBackend for FakeBackend {
        async fn create_cart(&self) -> Result<Cart, ShopifyError> {
            self.mutate(Call::Create)
        }

        async fn get_cart(&self, _cart_id: &str) -> Result<Option<Cart>, ShopifyError> {
            self.calls.lock().unwrap().push(Call::Get);
            Ok(self.cart.clone())
        }

        async fn add_to_cart(
            &self,
            _cart_id: &str,
            lines: Vec<CartLineInput>,
        ) -> Result<Cart, ShopifyError> {
            self.mutate(Call::Add(lines))
        }

        async fn remove_from_cart(
            &self,
            _cart_id: &str,
            line_ids: Vec<CartLineId>,
        ) -> Result<Cart, ShopifyError> {
            self.mutate(Call::Remove(line_ids))
        }

        async fn update_cart(
            &self,
            _cart_id: &str,
            lines: Vec<CartLineUpdateInput>,
        ) -> Result<Cart, ShopifyError> {
            self.mutate(Call::Update(lines))
        }

        async fn update_discount_codes(
            &self,
            _cart_id: &str,
            discount_codes: Vec<String>,
        ) -> Result<Cart, ShopifyError> {
            self.mutate(Call::Discounts(discount_codes))
        }

        async fn get_product_by_handle(
            &self,
            _handle: &str,
        ) -> Result<Option<Product>, ShopifyError> {
            Ok(None)
        }

        async fn get_product_by_variant(
            &self,
            _merchandise_id: &MerchandiseId,
        ) -> Result<Option<Product>, ShopifyError> {
            Ok(None)
        }
    }

    fn usd(amount: &str) -> Money {
        Money {
            amount: amount.to_string(),
            currency_code: "USD".to_string(),
        }
    }

    /// A cart with `(line id, merchandise id, quantity)` lines.
    fn cart(lines: &[(&str, &str, i64)]) -> Cart {
        Cart {
            id: CartId::new("gid://shopify/Cart/1"),
            checkout_url: "https://shop.example/checkouts/1".to_string(),
            total_quantity: lines.iter().map(|l| l.2).sum(),
            cost: CartCost {
                subtotal: usd("0.0"),
                total: usd("0.0"),
                total_tax: None,
            },
            discount_codes: vec![CartDiscountCode {
                code: "OLD".to_string(),
                applicable: true,
            }],
            lines: lines
                .iter()
                .map(|(line_id, merchandise_id, quantity)| CartLine {
                    id: CartLineId::new(*line_id),
                    quantity: *quantity,
                    cost: CartLineCost {
                        total_amount: usd("0.0"),
                    },
                    merchandise: CartMerchandise {
                        id: MerchandiseId::new(*merchandise_id),
                        title: "Default Title".to_string(),
                        selected_options: vec![],
                        product: CartMerchandiseProduct {
                            handle: "tee".to_string(),
                            title: "Tee".to_string(),
                            featured_image: None,
                        },
                    },
                })
                .collect(),
        }
    }

    fn merch(id: &str) -> MerchandiseId {
        MerchandiseId::new(id)
    }

    #[tokio::test]
    async fn test_add_item_requires_cart_and_variant() {
        let backend = FakeBackend::with_cart(Some(cart(&[])));

        let err = add_item(&backend, None, Some(&merch("v1"))).await.unwrap_err();
        assert_eq!(err.to_string(), "Error adding item to cart");

        let err = add_item(&backend, Some("c1"), None).await.unwrap_err();
        assert_eq!(err, CartActionError::MissingLineInput);
        assert!(err.is_missing_input());

        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_add_item_adds_one_unit() {
        let backend = FakeBackend::with_cart(Some(cart(&[])));
        add_item(&backend, Some("c1"), Some(&merch("v1"))).await.unwrap();

        assert_eq!(
            backend.calls(),
            vec![Call::Add(vec![CartLineInput {
                merchandise_id: merch("v1"),
                quantity: 1,
            }])]
        );
    }

    #[tokio::test]
    async fn test_add_item_backend_failure() {
        let backend = FakeBackend::failing(Some(cart(&[])));
        let err = add_item(&backend, Some("c1"), Some(&merch("v1")))
            .await
            .unwrap_err();
        assert_eq!(err, CartActionError::AddItem);
        assert!(!err.is_missing_input());
    }

    #[tokio::test]
    async fn test_remove_item() {
        let backend = FakeBackend::with_cart(Some(cart(&[("l1", "v1", 2)])));
        remove_item(&backend, Some("c1"), &merch("v1")).await.unwrap();

        assert_eq!(
            backend.calls(),
            vec![Call::Get, Call::Remove(vec![CartLineId::new("l1")])]
        );
    }

    #[tokio::test]
    async fn test_remove_item_errors() {
        let backend = FakeBackend::with_cart(Some(cart(&[("l1", "v1", 2)])));
        assert_eq!(
            remove_item(&backend, None, &merch("v1")).await.unwrap_err(),
            CartActionError::MissingCartId
        );
        assert_eq!(
            remove_item(&backend, Some("c1"), &merch("v2"))
                .await
                .unwrap_err()
                .to_string(),
            "Item not found in cart"
        );

        let missing = FakeBackend::with_cart(None);
        assert_eq!(
            remove_item(&missing, Some("c1"), &merch("v1"))
                .await
                .unwrap_err()
                .to_string(),
            "Error fetching cart"
        );

        let failing = FakeBackend::failing(Some(cart(&[("l1", "v1", 2)])));
        assert_eq!(
            remove_item(&failing, Some("c1"), &merch("v1"))
                .await
                .unwrap_err()
                .to_string(),
            "Error removing item from cart"
        );
    }

    #[tokio::test]
    async fn test_update_quantity_zero_removes_line() {
        let backend = FakeBackend::with_cart(Some(cart(&[("l1", "v1", 2)])));
        update_item_quantity(&backend, Some("c1"), &merch("v1"), 0)
            .await
            .unwrap();

        assert_eq!(
            backend.calls(),
            vec![Call::Get, Call::Remove(vec![CartLineId::new("l1")])]
        );
    }

    #[tokio::test]
    async fn test_update_quantity_updates_existing_line() {
        let backend = FakeBackend::with_cart(Some(cart(&[("l1", "v1", 2)])));
        update_item_quantity(&backend, Some("c1"), &merch("v1"), 5)
            .await
            .unwrap();

        assert_eq!(
            backend.calls(),
            vec![
                Call::Get,
                Call::Update(vec![CartLineUpdateInput {
                    id: CartLineId::new("l1"),
                    merchandise_id: Some(merch("v1")),
                    quantity: Some(5),
                }])
            ]
        );
    }

    #[tokio::test]
    async fn test_update_quantity_adds_missing_line() {
        let backend = FakeBackend::with_cart(Some(cart(&[])));
        update_item_quantity(&backend, Some("c1"), &merch("v9"), 3)
            .await
            .unwrap();

        assert_eq!(
            backend.calls(),
            vec![
                Call::Get,
                Call::Add(vec![CartLineInput {
                    merchandise_id: merch("v9"),
                    quantity: 3,
                }])
            ]
        );
    }

    #[tokio::test]
    async fn test_update_quantity_zero_on_missing_line_is_noop() {
        let backend = FakeBackend::with_cart(Some(cart(&[])));
        update_item_quantity(&backend, Some("c1"), &merch("v9"), 0)
            .await
            .unwrap();
        assert_eq!(backend.calls(), vec![Call::Get]);
    }

    #[tokio::test]
    async fn test_update_quantity_negative() {
        let backend = FakeBackend::with_cart(Some(cart(&[("l1", "v1", 2)])));
        update_item_quantity(&backend, Some("c1"), &merch("v1"), -1)
            .await
            .unwrap();
        assert_eq!(
            backend.calls(),
            vec![Call::Get, Call::Remove(vec![CartLineId::new("l1")])]
        );

        let backend = FakeBackend::with_cart(Some(cart(&[])));
        update_item_quantity(&backend, Some("c1"), &merch("v9"), -4)
            .await
            .unwrap();
        assert_eq!(backend.calls(), vec![Call::Get]);
    }

    #[tokio::test]
    async fn test_update_quantity_errors() {
        let backend = FakeBackend::with_cart(Some(cart(&[])));
        assert_eq!(
            update_item_quantity(&backend, None, &merch("v1"), 1)
                .await
                .unwrap_err(),
            CartActionError::MissingCartId
        );

        let failing = FakeBackend::failing(Some(cart(&[("l1", "v1", 1)])));
        assert_eq!(
            update_item_quantity(&failing, Some("c1"), &merch("v1"), 2)
                .await
                .unwrap_err()
                .to_string(),
            "Error updating item quantity"
        );
    }

    #[tokio::test]
    async fn test_redirect_to_checkout() {
        let backend = FakeBackend::with_cart(Some(cart(&[])));
        assert_eq!(
            redirect_to_checkout(&backend, Some("c1")).await.unwrap(),
            "https://shop.example/checkouts/1"
        );
        assert_eq!(
            redirect_to_checkout(&backend, None).await.unwrap_err(),
            CartActionError::MissingCartId
        );
        assert_eq!(
            redirect_to_checkout(&FakeBackend::with_cart(None), Some("c1"))
                .await
                .unwrap_err(),
            CartActionError::FetchCart
        );
    }

    #[tokio::test]
    async fn test_create_cart() {
        let backend = FakeBackend::with_cart(None);
        let created = create_cart_and_set_cookie(&backend).await.unwrap();
        assert_eq!(created.id.as_str(), "gid://shopify/Cart/1");

        let failing = FakeBackend::failing(None);
        assert_eq!(
            create_cart_and_set_cookie(&failing)
                .await
                .unwrap_err()
                .to_string(),
            "Error creating cart"
        );
    }

    #[tokio::test]
    async fn test_apply_discount_replaces_codes() {
        let backend = FakeBackend::with_cart(Some(cart(&[])));
        apply_discount(&backend, Some("c1"), Some("  SUMMER "))
            .await
            .unwrap();

        assert_eq!(
            backend.calls(),
            vec![Call::Discounts(vec!["SUMMER".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_apply_discount_errors() {
        let backend = FakeBackend::with_cart(Some(cart(&[])));
        assert_eq!(
            apply_discount(&backend, None, Some("X")).await.unwrap_err(),
            CartActionError::MissingCartId
        );
        assert_eq!(
            apply_discount(&backend, Some("c1"), Some("   "))
                .await
                .unwrap_err()
                .to_string(),
            "Error applying discount. Discount code required."
        );
        assert!(backend.calls().is_empty());

        let failing = FakeBackend::failing(Some(cart(&[])));
        assert_eq!(
            apply_discount(&failing, Some("c1"), Some("X"))
                .await
                .unwrap_err()
                .to_string(),
            "Error applying discount"
        );
    }

    #[tokio::test]
    async fn test_remove_discount() {
        let backend = FakeBackend::with_cart(Some(cart(&[])));
        let current = vec!["A".to_string(), "B".to_string(), "A".to_string()];
        remove_discount(&backend, Some("c1"), Some("B"), &current)
            .await
            .unwrap();

        assert_eq!(backend.calls(), vec![Call::Discounts(vec!["A".to_string()])]);
    }

    #[tokio::test]
    async fn test_remove_discount_errors() {
        let backend = FakeBackend::with_cart(Some(cart(&[])));
        assert_eq!(
            remove_discount(&backend, Some("c1"), None, &[])
                .await
                .unwrap_err()
                .to_string(),
            "Error removing discount. Discount code required."
        );

        let failing = FakeBackend::failing(Some(cart(&[])));
        assert_eq!(
            remove_discount(&failing, Some("c1"), Some("A"), &["A".to_string()])
                .await
                .unwrap_err()
                .to_string(),
            "Error applying discount"
        );
    }
}
