//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! The cart ID lives in the session; every mutation goes through the cart
//! actions in [`crate::services::cart`] and answers with a fragment plus an
//! `HX-Trigger: cart-updated` header.

use std::collections::BTreeMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use zkcart_core::MerchandiseId;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::CspNonce;
use crate::models::session;
use crate::services::CartActionError;
use crate::services::cart as actions;
use crate::services::catalog::{ProofGate, ensure_unlocked, select_variant};
use crate::shopify::types::{Cart, CartLine};
use crate::state::AppState;

/// HTMX event fired after every successful cart mutation.
const CART_UPDATED: (&str, &str) = ("HX-Trigger", "cart-updated");

/// Cart item display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub merchandise_id: String,
    pub handle: String,
    pub title: String,
    pub variant_title: Option<String>,
    pub quantity: i64,
    pub line_price: String,
    pub image_url: Option<String>,
}

/// Applied discount code display data.
#[derive(Clone)]
pub struct DiscountView {
    pub code: String,
    pub applicable: bool,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub total: String,
    pub item_count: i64,
    pub discounts: Vec<DiscountView>,
    /// All applied codes, comma separated, posted back when removing one.
    pub discount_codes: String,
}

impl From<&CartLine> for CartItemView {
    fn from(line: &CartLine) -> Self {
        let merchandise = &line.merchandise;
        Self {
            merchandise_id: merchandise.id.to_string(),
            handle: merchandise.product.handle.clone(),
            title: merchandise.product.title.clone(),
            variant_title: (merchandise.title != "Default Title")
                .then(|| merchandise.title.clone()),
            quantity: line.quantity,
            line_price: line.cost.total_amount.display(),
            image_url: merchandise
                .product
                .featured_image
                .as_ref()
                .map(|img| img.url.clone()),
        }
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.lines.iter().map(CartItemView::from).collect(),
            subtotal: cart.cost.subtotal.display(),
            total: cart.cost.total.display(),
            item_count: cart.total_quantity,
            discounts: cart
                .discount_codes
                .iter()
                .map(|d| DiscountView {
                    code: d.code.clone(),
                    applicable: d.applicable,
                })
                .collect(),
            discount_codes: cart
                .discount_codes
                .iter()
                .map(|d| d.code.as_str())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Add to cart form data.
///
/// Without `variant_id`, the remaining fields are read as option selections
/// (`size=M&color=Red`).
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub handle: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(flatten)]
    pub options: BTreeMap<String, String>,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub merchandise_id: String,
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub merchandise_id: String,
    pub quantity: i64,
}

/// Apply discount form data.
#[derive(Debug, Deserialize)]
pub struct DiscountForm {
    #[serde(default)]
    pub discount_code: Option<String>,
}

/// Remove discount form data.
#[derive(Debug, Deserialize)]
pub struct RemoveDiscountForm {
    #[serde(default)]
    pub discount: Option<String>,
    /// Comma-separated codes currently on the cart.
    #[serde(default)]
    pub discounts: Option<String>,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub cart: CartView,
    pub nonce: String,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: i64,
}

/// Create a cart and remember it in the session.
async fn create_session_cart(state: &AppState, session: &Session) -> Result<Cart> {
    let cart = actions::create_cart_and_set_cookie(state.backend()).await?;
    session::set_cart_id(session, &cart.id).await?;
    tracing::info!(cart_id = %cart.id, "Cart created");
    Ok(cart)
}

/// Answer a successful mutation with the refreshed cart items.
fn cart_updated(cart: &Cart) -> Response {
    (
        AppendHeaders([CART_UPDATED]),
        CartItemsTemplate {
            cart: CartView::from(cart),
        },
    )
        .into_response()
}

/// Display cart page, creating a cart if the session has none.
#[instrument(skip(state, session, nonce))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    CspNonce(nonce): CspNonce,
) -> Result<Response> {
    let existing = match session::cart_id(&session).await {
        Some(cart_id) => state.backend().get_cart(&cart_id).await.map_err(|e| {
            tracing::error!(cart_id = %cart_id, error = %e, "Failed to fetch cart");
            AppError::Cart(CartActionError::FetchCart)
        })?,
        None => None,
    };

    let cart = match existing {
        Some(cart) => cart,
        None => create_session_cart(&state, &session).await?,
    };

    Ok(CartShowTemplate {
        cart: CartView::from(&cart),
        nonce,
    }
    .into_response())
}

/// Create a new cart and store its ID in the session.
#[instrument(skip(state, session))]
pub async fn create(State(state): State<AppState>, session: Session) -> Result<Response> {
    let cart = create_session_cart(&state, &session).await?;
    Ok(cart_updated(&cart))
}

/// Resolve the variant to add, enforcing the product's proof gate.
async fn variant_to_add(
    state: &AppState,
    session: &Session,
    form: &AddToCartForm,
) -> Result<Option<MerchandiseId>> {
    let product = state
        .backend()
        .get_product_by_handle(&form.handle)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", form.handle)))?;

    let gate = ProofGate::for_product(&product);
    ensure_unlocked(
        gate.as_ref(),
        &session::unlocked_products(session).await,
        &product.handle,
    )?;

    let variant = match form.variant_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => product.variants.iter().find(|v| v.id.as_str() == id),
        None => {
            let selected = form
                .options
                .iter()
                .map(|(name, value)| (name.to_lowercase(), value.clone()))
                .collect();
            select_variant(&product, &selected)
        }
    };

    Ok(variant.map(|v| v.id.clone()))
}

/// Add one unit of a product variant (HTMX).
///
/// Gated products are refused with 403 until their proof has passed in
/// this session. Without a cart nothing is looked up.
#[instrument(skip(state, session), fields(handle = %form.handle))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let cart_id = session::cart_id(&session).await;

    let variant_id = match cart_id {
        Some(_) => variant_to_add(&state, &session, &form).await?,
        None => None,
    };

    let cart = actions::add_item(state.backend(), cart_id.as_deref(), variant_id.as_ref()).await?;

    add_breadcrumb("cart", "Added item", Some(&[("handle", form.handle.as_str())]));

    Ok((
        AppendHeaders([CART_UPDATED]),
        CartCountTemplate {
            count: cart.total_quantity,
        },
    )
        .into_response())
}

/// Remove the line holding a variant (HTMX).
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let cart_id = session::cart_id(&session).await;
    let cart = actions::remove_item(
        state.backend(),
        cart_id.as_deref(),
        &MerchandiseId::new(form.merchandise_id),
    )
    .await?;
    Ok(cart_updated(&cart))
}

/// Refuse a positive quantity for a variant whose product is still locked.
async fn ensure_variant_unlocked(
    state: &AppState,
    session: &Session,
    merchandise_id: &MerchandiseId,
) -> Result<()> {
    let Some(product) = state
        .backend()
        .get_product_by_variant(merchandise_id)
        .await?
    else {
        return Ok(());
    };

    ensure_unlocked(
        ProofGate::for_product(&product).as_ref(),
        &session::unlocked_products(session).await,
        &product.handle,
    )?;
    Ok(())
}

/// Set a variant's quantity (HTMX). Zero or less removes the line.
///
/// A positive quantity can add a line, so it passes the same proof gate as
/// add-to-cart.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let cart_id = session::cart_id(&session).await;
    let merchandise_id = MerchandiseId::new(form.merchandise_id);

    if cart_id.is_some() && form.quantity > 0 {
        ensure_variant_unlocked(&state, &session, &merchandise_id).await?;
    }

    let cart = actions::update_item_quantity(
        state.backend(),
        cart_id.as_deref(),
        &merchandise_id,
        form.quantity,
    )
    .await?;
    Ok(cart_updated(&cart))
}

/// Apply a discount code (HTMX).
#[instrument(skip(state, session))]
pub async fn apply_discount(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<DiscountForm>,
) -> Result<Response> {
    let cart_id = session::cart_id(&session).await;
    let cart = actions::apply_discount(
        state.backend(),
        cart_id.as_deref(),
        form.discount_code.as_deref(),
    )
    .await?;
    Ok(cart_updated(&cart))
}

/// Remove a discount code (HTMX).
#[instrument(skip(state, session))]
pub async fn remove_discount(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RemoveDiscountForm>,
) -> Result<Response> {
    let cart_id = session::cart_id(&session).await;
    let current: Vec<String> = form
        .discounts
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::to_string)
        .collect();

    let cart = actions::remove_discount(
        state.backend(),
        cart_id.as_deref(),
        form.discount.as_deref(),
        &current,
    )
    .await?;
    Ok(cart_updated(&cart))
}

/// Get cart count badge (HTMX).
#[instrument(skip(state, session))]
pub async fn count(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let count = match session::cart_id(&session).await {
        Some(cart_id) => match state.backend().get_cart(&cart_id).await {
            Ok(cart) => cart.map_or(0, |c| c.total_quantity),
            Err(e) => {
                tracing::warn!(cart_id = %cart_id, error = %e, "Failed to fetch cart count");
                0
            }
        },
        None => 0,
    };

    CartCountTemplate { count }
}

/// Redirect to Shopify checkout (303).
#[instrument(skip(state, session))]
pub async fn checkout(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    let cart_id = session::cart_id(&session).await;
    let url = actions::redirect_to_checkout(state.backend(), cart_id.as_deref()).await?;
    Ok(Redirect::to(&url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shopify::types::{
        CartCost, CartDiscountCode, CartLineCost, CartMerchandise, CartMerchandiseProduct, Money,
    };
    use zkcart_core::{CartId, CartLineId};

    fn usd(amount: &str) -> Money {
        Money {
            amount: amount.to_string(),
            currency_code: "USD".to_string(),
        }
    }

    fn line(variant_title: &str) -> CartLine {
        CartLine {
            id: CartLineId::new("gid://shopify/CartLine/1"),
            quantity: 2,
            cost: CartLineCost {
                total_amount: usd("40.0"),
            },
            merchandise: CartMerchandise {
                id: MerchandiseId::new("gid://shopify/ProductVariant/1"),
                title: variant_title.to_string(),
                selected_options: vec![],
                product: CartMerchandiseProduct {
                    handle: "tee".to_string(),
                    title: "Tee".to_string(),
                    featured_image: None,
                },
            },
        }
    }

    #[test]
    fn test_cart_item_view_hides_default_title() {
        assert_eq!(CartItemView::from(&line("Default Title")).variant_title, None);
        assert_eq!(
            CartItemView::from(&line("Large")).variant_title.as_deref(),
            Some("Large")
        );
        assert_eq!(CartItemView::from(&line("Large")).line_price, "$40.00");
    }

    #[test]
    fn test_cart_view_joins_discount_codes() {
        let cart = Cart {
            id: CartId::new("gid://shopify/Cart/1"),
            checkout_url: "https://shop.example/checkout".to_string(),
            total_quantity: 2,
            cost: CartCost {
                subtotal: usd("40.0"),
                total: usd("36.0"),
                total_tax: None,
            },
            discount_codes: vec![
                CartDiscountCode {
                    code: "TEN".to_string(),
                    applicable: true,
                },
                CartDiscountCode {
                    code: "OLD".to_string(),
                    applicable: false,
                },
            ],
            lines: vec![line("Default Title")],
        };

        let view = CartView::from(&cart);
        assert_eq!(view.discount_codes, "TEN,OLD");
        assert_eq!(view.total, "$36.00");
        assert_eq!(view.items.len(), 1);
    }
}
