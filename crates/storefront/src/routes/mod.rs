//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness check
//! GET  /health/ready                   - Readiness check (database)
//!
//! # Products
//! GET  /products/{handle}              - Product page (add-to-cart or proof gate)
//!
//! # Cart (HTMX fragments)
//! GET  /cart                           - Cart page (creates a cart if needed)
//! POST /cart/create                    - Create cart, store its ID in the session
//! POST /cart/add                       - Add one unit (gate enforced)
//! POST /cart/remove                    - Remove a line by variant
//! POST /cart/update                    - Set a variant's quantity
//! POST /cart/discount                  - Apply a discount code
//! POST /cart/discount/remove           - Remove a discount code
//! GET  /cart/count                     - Cart count badge
//!
//! # Checkout
//! GET  /checkout                       - Redirect to Shopify checkout
//!
//! # Proof gates
//! POST /proof/reclaim/{handle}         - Start a Reclaim request (QR fragment)
//! POST /proof/reclaim/callback         - Proof callback from Reclaim
//! GET  /proof/reclaim/{handle}/status  - Poll; unlocks the product once verified
//! GET  /proof/zkpass/{handle}/launch   - TransGate launch parameters (JSON)
//! POST /proof/zkpass/{handle}          - Verify a TransGate result (JSON)
//! ```

pub mod cart;
pub mod health;
pub mod products;
pub mod proof;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::middleware::{csp_nonce_middleware, request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// Directory served under `/static`.
pub const STATIC_DIR: &str = "crates/storefront/static";

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new().route("/{handle}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/create", post(cart::create))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/discount", post(cart::apply_discount))
        .route("/discount/remove", post(cart::remove_discount))
        .route("/count", get(cart::count))
}

/// Create the proof gate routes router.
pub fn proof_routes() -> Router<AppState> {
    Router::new()
        .route("/reclaim/callback", post(proof::reclaim_callback))
        .route("/reclaim/{handle}", post(proof::reclaim_start))
        .route("/reclaim/{handle}/status", get(proof::reclaim_status))
        .route("/zkpass/{handle}/launch", get(proof::zkpass_launch))
        .route("/zkpass/{handle}", post(proof::zkpass_verify))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", get(cart::checkout))
        .nest("/proof", proof_routes())
}

/// Build the full application with middleware and sessions.
///
/// Sentry layers are added by the binary, which owns the Sentry client.
pub fn app<Store>(state: AppState, session_layer: SessionManagerLayer<Store>) -> Router
where
    Store: SessionStore + Clone,
{
    routes()
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(session_layer)
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(axum_middleware::from_fn(csp_nonce_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<axum::body::Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            },
        ))
        .with_state(state)
}
