//! Product route handlers.

use std::collections::BTreeMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::CspNonce;
use crate::models::session;
use crate::services::catalog::{ProofGate, select_variant};
use crate::shopify::types::{Product, ProductVariant};
use crate::state::AppState;

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub handle: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub image_url: Option<String>,
    pub image_alt: String,
    pub options: Vec<OptionView>,
}

/// A product option with its values, marking the selected one.
#[derive(Clone)]
pub struct OptionView {
    pub name: String,
    /// Lowercase name, used as the query and form field.
    pub key: String,
    pub values: Vec<OptionValueView>,
}

#[derive(Clone)]
pub struct OptionValueView {
    pub value: String,
    pub selected: bool,
}

/// The variant resolved from the selected options.
#[derive(Clone)]
pub struct VariantView {
    pub id: String,
    pub title: String,
    pub price: String,
    pub available: bool,
}

/// Proof gate display data.
#[derive(Clone)]
pub struct GateView {
    /// `reclaim` or `zkpass`.
    pub kind: &'static str,
    pub unlocked: bool,
}

impl From<&ProductVariant> for VariantView {
    fn from(variant: &ProductVariant) -> Self {
        Self {
            id: variant.id.to_string(),
            title: variant.title.clone(),
            price: variant.price.display(),
            available: variant.available_for_sale,
        }
    }
}

impl ProductView {
    fn new(product: &Product, selected: &BTreeMap<String, String>) -> Self {
        let options = product
            .options
            .iter()
            .map(|option| {
                let key = option.name.to_lowercase();
                let values = option
                    .values
                    .iter()
                    .map(|value| OptionValueView {
                        value: value.clone(),
                        selected: selected.get(&key) == Some(value),
                    })
                    .collect();
                OptionView {
                    name: option.name.clone(),
                    key,
                    values,
                }
            })
            .collect();

        Self {
            handle: product.handle.clone(),
            title: product.title.clone(),
            description: product.description.clone(),
            price: product.price_range.min_variant_price.display(),
            image_url: product.featured_image.as_ref().map(|img| img.url.clone()),
            image_alt: product
                .featured_image
                .as_ref()
                .and_then(|img| img.alt_text.clone())
                .unwrap_or_else(|| product.title.clone()),
            options,
        }
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub product: ProductView,
    pub variant: Option<VariantView>,
    pub gate: Option<GateView>,
    /// No gate, or the gate has passed.
    pub can_add: bool,
    pub nonce: String,
}

/// Display product detail page.
///
/// Query parameters select options (`?size=M&color=Red`, case-insensitive
/// names). A gated product shows its proof flow until unlocked.
#[instrument(skip(state, session, query, nonce))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Path(handle): Path<String>,
    Query(query): Query<BTreeMap<String, String>>,
    CspNonce(nonce): CspNonce,
) -> Result<ProductShowTemplate> {
    let product = state
        .backend()
        .get_product_by_handle(&handle)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {handle}")))?;

    let selected: BTreeMap<String, String> = query
        .into_iter()
        .map(|(name, value)| (name.to_lowercase(), value))
        .collect();

    let gate = match ProofGate::for_product(&product) {
        Some(gate) => Some(GateView {
            kind: gate.kind(),
            unlocked: session::is_unlocked(&session, &product.handle).await,
        }),
        None => None,
    };

    Ok(ProductShowTemplate {
        product: ProductView::new(&product, &selected),
        variant: select_variant(&product, &selected).map(VariantView::from),
        can_add: gate.as_ref().is_none_or(|g| g.unlocked),
        gate,
        nonce,
    })
}
