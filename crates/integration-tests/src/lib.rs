//! Integration tests for zkcart.
//!
//! The tests drive the full storefront router (middleware, sessions, routes)
//! with `tower::ServiceExt::oneshot`. Shopify is replaced by [`MockBackend`],
//! an in-memory cart that records every call; sessions use the
//! `tower-sessions` memory store. The Reclaim backend, where a test needs
//! it, is a local axum server started by [`spawn_fake_reclaim`].
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p zkcart-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
    routing::post,
};
use k256::ecdsa::SigningKey;
use secrecy::SecretString;
use tower::ServiceExt;
use tower_sessions::MemoryStore;
use zkcart_core::{CartId, CartLineId, MerchandiseId, ProductId};
use zkcart_storefront::config::{
    ReclaimConfig, ShopifyStorefrontConfig, StorefrontConfig, ZkPassConfig,
};
use zkcart_storefront::middleware::session_layer;
use zkcart_storefront::proof::eth::address_of;
use zkcart_storefront::routes;
use zkcart_storefront::shopify::types::{
    Cart, CartCost, CartDiscountCode, CartLine, CartLineCost, CartLineInput, CartLineUpdateInput,
    CartMerchandise, CartMerchandiseProduct, GateMetafields, Money, PriceRange, Product,
    ProductOption, ProductVariant, SelectedOption,
};
use zkcart_storefront::shopify::{CommerceBackend, GraphQLError, ShopifyError};
use zkcart_storefront::state::AppState;

/// Cart ID handed out by [`MockBackend::create_cart`].
pub const TEST_CART_ID: &str = "gid://shopify/Cart/test";

/// Product with no gate.
pub const PLAIN_PRODUCT: &str = "plain-tee";
/// Product gated by a Reclaim provider.
pub const RECLAIM_PRODUCT: &str = "followers-tee";
/// Product gated by a zkPass schema.
pub const ZKPASS_PRODUCT: &str = "kyc-hoodie";

/// Reclaim provider on [`RECLAIM_PRODUCT`].
pub const RECLAIM_PROVIDER: &str = "f9f383fd-32d9-4c54-942f-5e9fda349762";
/// zkPass schema on [`ZKPASS_PRODUCT`].
pub const ZKPASS_SCHEMA: &str = "c7eab8b7d7e44b05b41b613fe548edf5";

/// Deterministic secp256k1 key `0x00..00{byte}`.
#[must_use]
pub fn test_key(byte: u8) -> SigningKey {
    let mut bytes = [0u8; 32];
    bytes[31] = byte;
    SigningKey::from_slice(&bytes).unwrap()
}

/// Application key of the test Reclaim app.
#[must_use]
pub fn reclaim_app_key() -> SigningKey {
    test_key(7)
}

/// The one attestor the test config trusts.
#[must_use]
pub fn trusted_attestor() -> SigningKey {
    test_key(2)
}

/// The zkPass allocator the test config expects.
#[must_use]
pub fn zkpass_allocator() -> SigningKey {
    test_key(3)
}

// =============================================================================
// Mock commerce backend
// =============================================================================

/// A call made to the commerce backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CreateCart,
    GetCart(String),
    AddToCart(Vec<(String, i64)>),
    RemoveFromCart(Vec<String>),
    UpdateCart(Vec<(String, Option<i64>)>),
    UpdateDiscountCodes(Vec<String>),
    GetProduct(String),
    GetVariantProduct(String),
}

impl BackendCall {
    /// Whether this call changes the cart.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::GetCart(_) | Self::GetProduct(_) | Self::GetVariantProduct(_)
        )
    }
}

/// In-memory Shopify stand-in holding one cart.
pub struct MockBackend {
    cart: Mutex<Option<Cart>>,
    products: BTreeMap<String, Product>,
    calls: Mutex<Vec<BackendCall>>,
    fail_mutations: Mutex<bool>,
}

impl Default for MockBackend {
    fn default() -> Self {
        let products = [
            product(PLAIN_PRODUCT, GateMetafields::default()),
            product(
                RECLAIM_PRODUCT,
                GateMetafields {
                    reclaim_provider_id: Some(RECLAIM_PROVIDER.to_string()),
                    zkpass_schema_id: None,
                },
            ),
            product(
                ZKPASS_PRODUCT,
                GateMetafields {
                    reclaim_provider_id: None,
                    zkpass_schema_id: Some(ZKPASS_SCHEMA.to_string()),
                },
            ),
        ]
        .into_iter()
        .map(|p| (p.handle.clone(), p))
        .collect();

        Self {
            cart: Mutex::new(None),
            products,
            calls: Mutex::new(Vec::new()),
            fail_mutations: Mutex::new(false),
        }
    }
}

impl MockBackend {
    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that changed the cart.
    #[must_use]
    pub fn mutations(&self) -> Vec<BackendCall> {
        self.calls()
            .into_iter()
            .filter(BackendCall::is_mutation)
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make every mutation fail with a GraphQL error.
    pub fn fail_mutations(&self) {
        *self.fail_mutations.lock().unwrap() = true;
    }

    /// The current cart.
    #[must_use]
    pub fn cart(&self) -> Option<Cart> {
        self.cart.lock().unwrap().clone()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn mutate(
        &self,
        call: BackendCall,
        cart_id: &str,
        apply: impl FnOnce(&mut Cart, &BTreeMap<String, Product>),
    ) -> Result<Cart, ShopifyError> {
        self.record(call);
        if *self.fail_mutations.lock().unwrap() {
            return Err(ShopifyError::GraphQL(vec![GraphQLError::message(
                "mutation failed",
            )]));
        }

        let mut guard = self.cart.lock().unwrap();
        let cart = guard
            .as_mut()
            .filter(|c| c.id.as_str() == cart_id)
            .ok_or_else(|| ShopifyError::UserError("The specified cart does not exist.".to_string()))?;
        apply(cart, &self.products);
        cart.total_quantity = cart.lines.iter().map(|l| l.quantity).sum();
        Ok(cart.clone())
    }
}

#[async_trait]
impl CommerceBackend for MockBackend {
    async fn create_cart(&self) -> Result<Cart, ShopifyError> {
        self.record(BackendCall::CreateCart);
        let cart = empty_cart();
        *self.cart.lock().unwrap() = Some(cart.clone());
        Ok(cart)
    }

    async fn get_cart(&self, cart_id: &str) -> Result<Option<Cart>, ShopifyError> {
        self.record(BackendCall::GetCart(cart_id.to_string()));
        Ok(self.cart().filter(|c| c.id.as_str() == cart_id))
    }

    async fn add_to_cart(
        &self,
        cart_id: &str,
        lines: Vec<CartLineInput>,
    ) -> Result<Cart, ShopifyError> {
        let call = BackendCall::AddToCart(
            lines
                .iter()
                .map(|l| (l.merchandise_id.to_string(), l.quantity))
                .collect(),
        );
        self.mutate(call, cart_id, |cart, products| {
            for input in lines {
                if let Some(line) = cart
                    .lines
                    .iter_mut()
                    .find(|l| l.merchandise.id == input.merchandise_id)
                {
                    line.quantity += input.quantity;
                } else {
                    let next = cart.lines.len() + 1;
                    cart.lines
                        .push(cart_line(next, &input.merchandise_id, input.quantity, products));
                }
            }
        })
    }

    async fn remove_from_cart(
        &self,
        cart_id: &str,
        line_ids: Vec<CartLineId>,
    ) -> Result<Cart, ShopifyError> {
        let call = BackendCall::RemoveFromCart(line_ids.iter().map(ToString::to_string).collect());
        self.mutate(call, cart_id, |cart, _| {
            cart.lines.retain(|l| !line_ids.contains(&l.id));
        })
    }

    async fn update_cart(
        &self,
        cart_id: &str,
        lines: Vec<CartLineUpdateInput>,
    ) -> Result<Cart, ShopifyError> {
        let call = BackendCall::UpdateCart(
            lines
                .iter()
                .map(|l| (l.id.to_string(), l.quantity))
                .collect(),
        );
        self.mutate(call, cart_id, |cart, _| {
            for update in lines {
                if let (Some(line), Some(quantity)) = (
                    cart.lines.iter_mut().find(|l| l.id == update.id),
                    update.quantity,
                ) {
                    line.quantity = quantity;
                }
            }
        })
    }

    async fn update_discount_codes(
        &self,
        cart_id: &str,
        discount_codes: Vec<String>,
    ) -> Result<Cart, ShopifyError> {
        let call = BackendCall::UpdateDiscountCodes(discount_codes.clone());
        self.mutate(call, cart_id, |cart, _| {
            cart.discount_codes = discount_codes
                .into_iter()
                .map(|code| CartDiscountCode {
                    code,
                    applicable: true,
                })
                .collect();
        })
    }

    async fn get_product_by_handle(&self, handle: &str) -> Result<Option<Product>, ShopifyError> {
        self.record(BackendCall::GetProduct(handle.to_string()));
        Ok(self.products.get(handle).cloned())
    }

    async fn get_product_by_variant(
        &self,
        merchandise_id: &MerchandiseId,
    ) -> Result<Option<Product>, ShopifyError> {
        self.record(BackendCall::GetVariantProduct(merchandise_id.to_string()));
        Ok(self
            .products
            .values()
            .find(|p| p.variants.iter().any(|v| &v.id == merchandise_id))
            .cloned())
    }
}

fn usd(amount: &str) -> Money {
    Money {
        amount: amount.to_string(),
        currency_code: "USD".to_string(),
    }
}

/// Variant ID of a test product's `size` option value.
#[must_use]
pub fn variant_id(handle: &str, size: &str) -> String {
    format!("gid://shopify/ProductVariant/{handle}-{size}")
}

fn product(handle: &str, gate: GateMetafields) -> Product {
    let variants = ["S", "M"]
        .iter()
        .map(|size| ProductVariant {
            id: MerchandiseId::new(variant_id(handle, size)),
            title: (*size).to_string(),
            available_for_sale: true,
            price: usd("25.0"),
            selected_options: vec![SelectedOption {
                name: "Size".to_string(),
                value: (*size).to_string(),
            }],
        })
        .collect();

    Product {
        id: ProductId::new(format!("gid://shopify/Product/{handle}")),
        handle: handle.to_string(),
        title: handle.replace('-', " "),
        description: String::new(),
        available_for_sale: true,
        price_range: PriceRange {
            min_variant_price: usd("25.0"),
            max_variant_price: usd("25.0"),
        },
        featured_image: None,
        options: vec![ProductOption {
            name: "Size".to_string(),
            values: vec!["S".to_string(), "M".to_string()],
        }],
        variants,
        gate,
    }
}

fn empty_cart() -> Cart {
    Cart {
        id: CartId::new(TEST_CART_ID),
        checkout_url: "https://shop.example.com/cart/c/test".to_string(),
        total_quantity: 0,
        cost: CartCost {
            subtotal: usd("0.0"),
            total: usd("0.0"),
            total_tax: None,
        },
        discount_codes: vec![],
        lines: vec![],
    }
}

fn cart_line(
    index: usize,
    merchandise_id: &MerchandiseId,
    quantity: i64,
    products: &BTreeMap<String, Product>,
) -> CartLine {
    let owner = products
        .values()
        .find(|p| p.variants.iter().any(|v| &v.id == merchandise_id));

    CartLine {
        id: CartLineId::new(format!("gid://shopify/CartLine/{index}")),
        quantity,
        cost: CartLineCost {
            total_amount: usd("25.0"),
        },
        merchandise: CartMerchandise {
            id: merchandise_id.clone(),
            title: "Default Title".to_string(),
            selected_options: vec![],
            product: CartMerchandiseProduct {
                handle: owner.map(|p| p.handle.clone()).unwrap_or_default(),
                title: owner.map(|p| p.title.clone()).unwrap_or_default(),
                featured_image: None,
            },
        },
    }
}

// =============================================================================
// Test application
// =============================================================================

/// Storefront configuration pointing at test keys and `reclaim_api`.
#[must_use]
pub fn test_config(reclaim_api: &str) -> StorefrontConfig {
    let app_key = reclaim_app_key();

    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/unused"),
        host: "127.0.0.1".parse().unwrap(),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        shopify: ShopifyStorefrontConfig {
            store: "test.myshopify.com".to_string(),
            api_version: "2026-01".to_string(),
            storefront_private_token: SecretString::from("unused"),
        },
        reclaim: ReclaimConfig {
            app_id: address_of(app_key.verifying_key()).to_string(),
            app_secret: SecretString::from(hex::encode(app_key.to_bytes())),
            api_url: reclaim_api.to_string(),
            share_url: "https://share.reclaimprotocol.org".to_string(),
            trusted_attestors: vec![address_of(trusted_attestor().verifying_key())],
            required_parameter: "following".to_string(),
        },
        zkpass: ZkPassConfig {
            app_id: "zkpass-test-app".to_string(),
            allocator_address: address_of(zkpass_allocator().verifying_key()),
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A response with its body read.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// Parse the body as JSON.
    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }

    /// A response header as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The storefront router plus a cookie jar holding one shopper's session.
pub struct TestApp {
    pub router: Router,
    pub backend: Arc<MockBackend>,
    pub state: AppState,
    cookie: Option<String>,
}

impl TestApp {
    /// App whose Reclaim backend is unreachable.
    #[must_use]
    pub fn new() -> Self {
        Self::with_reclaim_api("http://127.0.0.1:9")
    }

    /// App whose Reclaim backend is at `reclaim_api`.
    #[must_use]
    pub fn with_reclaim_api(reclaim_api: &str) -> Self {
        Self::with_config(test_config(reclaim_api))
    }

    /// App with a custom configuration.
    #[must_use]
    pub fn with_config(config: StorefrontConfig) -> Self {
        let backend = Arc::new(MockBackend::default());
        let state = AppState::with_backend(config, backend.clone(), None).unwrap();
        let router = routes::app(state.clone(), session_layer(MemoryStore::default(), false));

        Self {
            router,
            backend,
            state,
            cookie: None,
        }
    }

    /// Send a request as this shopper, keeping the session cookie.
    pub async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
        {
            self.cookie = set_cookie.split(';').next().map(str::to_string);
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    /// GET a path.
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    /// POST a urlencoded form.
    pub async fn post_form(&mut self, uri: &str, form: &[(&str, &str)]) -> TestResponse {
        let body = form
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencode(v)))
            .collect::<Vec<_>>()
            .join("&");

        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// POST a JSON body.
    pub async fn post_json(&mut self, uri: &str, json: &serde_json::Value) -> TestResponse {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
        )
        .await
    }

    /// POST a raw body without this shopper's cookie, as the proof service does.
    pub async fn post_raw_anonymous(&self, uri: &str, body: String) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    /// Create a cart for this shopper and forget the setup calls.
    pub async fn with_cart(mut self) -> Self {
        let response = self.post_form("/cart/create", &[]).await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        self.backend.clear_calls();
        self
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

fn urlencode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

// =============================================================================
// Fake Reclaim backend
// =============================================================================

/// Session ID the fake Reclaim backend hands out.
pub const FAKE_RECLAIM_SESSION: &str = "fake-reclaim-session";

/// Start a local server answering `POST /api/sdk/init/session/`.
///
/// Returns its base URL.
pub async fn spawn_fake_reclaim() -> String {
    let app = Router::new().route(
        "/api/sdk/init/session/",
        post(|Json(body): Json<serde_json::Value>| async move {
            assert!(body.get("signature").is_some());
            Json(serde_json::json!({
                "sessionId": FAKE_RECLAIM_SESSION,
                "resolvedProviderVersion": "1.0.0",
            }))
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}
