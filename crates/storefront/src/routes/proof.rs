//! Proof gate route handlers.
//!
//! Reclaim runs on the shopper's phone: the page shows a QR code, the
//! Reclaim service posts the proof to the callback, and the page polls the
//! status endpoint, which moves a verified product into the session's
//! unlocked set. zkPass runs in the browser extension and the page posts the
//! result here directly.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::session;
use crate::proof::reclaim::{ExpectedClaim, parse_callback_body};
use crate::proof::zkpass::verify_result;
use crate::proof::{ProofError, SessionStatus, TransGateResult, ZkPassLaunch};
use crate::services::ProofGate;
use crate::shopify::types::Product;
use crate::state::AppState;

/// Reclaim QR code fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/proof_qr.html")]
pub struct ProofQrTemplate {
    pub handle: String,
    pub request_url: String,
    pub qr_svg: String,
}

/// Where a product's proof stands for this shopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofState {
    /// No request started.
    None,
    Pending,
    Verified,
    Rejected,
    /// The request outlived the pending-session store.
    Expired,
}

/// Reclaim status fragment, polled by the page while pending.
#[derive(Template, WebTemplate)]
#[template(path = "partials/proof_status.html")]
pub struct ProofStatusTemplate {
    pub handle: String,
    pub state: ProofState,
    pub reason: Option<String>,
}

/// Callback query string.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub session_id: String,
}

/// JSON answer to proof submissions.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifiedResponse {
    pub status: String,
    pub handle: String,
}

impl VerifiedResponse {
    fn verified(handle: &str) -> Self {
        Self {
            status: "verified".to_string(),
            handle: handle.to_string(),
        }
    }
}

async fn gated_product(state: &AppState, handle: &str) -> Result<(Product, ProofGate)> {
    let product = state
        .backend()
        .get_product_by_handle(handle)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {handle}")))?;

    let gate = ProofGate::for_product(&product)
        .ok_or_else(|| AppError::BadRequest(format!("{handle} has no proof gate")))?;

    Ok((product, gate))
}

/// Start a Reclaim request for a product and return its QR code.
#[instrument(skip(state, session))]
pub async fn reclaim_start(
    State(state): State<AppState>,
    session: Session,
    Path(handle): Path<String>,
) -> Result<Response> {
    let (product, gate) = gated_product(&state, &handle).await?;
    let ProofGate::Reclaim { provider_id } = gate else {
        return Err(AppError::BadRequest(format!(
            "{handle} is not gated by Reclaim"
        )));
    };

    if session::is_unlocked(&session, &product.handle).await {
        return Ok(ProofStatusTemplate {
            handle: product.handle,
            state: ProofState::Verified,
            reason: None,
        }
        .into_response());
    }

    let request = state
        .reclaim()
        .create_request(&provider_id, &product.handle)
        .await?;

    state
        .proof_sessions()
        .register(&request.session_id, &product.handle, &provider_id)
        .await;
    session::set_reclaim_session(&session, &product.handle, &request.session_id).await?;

    add_breadcrumb(
        "proof",
        "Reclaim request created",
        Some(&[("handle", product.handle.as_str())]),
    );

    Ok(ProofQrTemplate {
        handle: product.handle,
        request_url: request.request_url,
        qr_svg: request.qr_svg,
    }
    .into_response())
}

/// Receive proofs from the Reclaim service.
///
/// The verdict is parked against the Reclaim session; the shopper's next
/// status poll applies it to their session. A body that holds no proof is
/// refused without touching the session, so it stays pending.
#[instrument(skip(state, body), fields(body_len = body.len()))]
pub async fn reclaim_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Result<Json<VerifiedResponse>> {
    let sessions = state.proof_sessions();
    let pending = sessions.get(&query.session_id).await?;

    let proofs = parse_callback_body(&body).inspect_err(|e| {
        tracing::warn!(handle = %pending.handle, error = %e, "Undecodable Reclaim callback");
    })?;

    let expected = ExpectedClaim {
        session_id: &query.session_id,
        handle: &pending.handle,
        provider_id: &pending.provider_id,
    };

    match state.reclaim().verify(&proofs, &expected) {
        Ok(()) => {
            sessions.mark_verified(&query.session_id).await?;
            tracing::info!(handle = %pending.handle, "Reclaim proof verified");
            Ok(Json(VerifiedResponse::verified(&pending.handle)))
        }
        Err(e) => {
            sessions
                .mark_rejected(&query.session_id, &e.to_string())
                .await?;
            tracing::warn!(handle = %pending.handle, error = %e, "Reclaim proof rejected");
            Err(e.into())
        }
    }
}

/// Poll a product's Reclaim status, unlocking it once verified.
///
/// A rejection is reported but the request stays attached to the shopper,
/// so a valid proof arriving later on the same session still unlocks.
#[instrument(skip(state, session))]
pub async fn reclaim_status(
    State(state): State<AppState>,
    session: Session,
    Path(handle): Path<String>,
) -> Result<Response> {
    let status = |state: ProofState, reason: Option<String>| ProofStatusTemplate {
        handle: handle.clone(),
        state,
        reason,
    };

    if session::is_unlocked(&session, &handle).await {
        return Ok(status(ProofState::Verified, None).into_response());
    }

    let Some(session_id) = session::reclaim_session(&session, &handle).await else {
        return Ok(status(ProofState::None, None).into_response());
    };

    match state.proof_sessions().status(&session_id).await {
        Ok(SessionStatus::Pending) => Ok(status(ProofState::Pending, None).into_response()),
        Ok(SessionStatus::Verified) => {
            session::unlock_product(&session, &handle).await?;
            session::clear_reclaim_session(&session, &handle).await?;
            add_breadcrumb("proof", "Product unlocked", Some(&[("handle", handle.as_str())]));
            Ok((
                AppendHeaders([("HX-Refresh", "true")]),
                status(ProofState::Verified, None),
            )
                .into_response())
        }
        Ok(SessionStatus::Rejected(reason)) => {
            Ok(status(ProofState::Rejected, Some(reason)).into_response())
        }
        Err(ProofError::UnknownSession(_)) => {
            session::clear_reclaim_session(&session, &handle).await?;
            Ok(status(ProofState::Expired, None).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Parameters the page hands to the `TransGate` extension.
#[instrument(skip(state))]
pub async fn zkpass_launch(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<ZkPassLaunch>> {
    let (_, gate) = gated_product(&state, &handle).await?;
    let ProofGate::ZkPass { schema_id } = gate else {
        return Err(AppError::BadRequest(format!("{handle} is not gated by zkPass")));
    };

    Ok(Json(ZkPassLaunch {
        app_id: state.config().zkpass.app_id.clone(),
        schema_id,
    }))
}

/// Verify a `TransGate` result and unlock the product.
#[instrument(skip(state, session, result), fields(task_id = %result.task_id))]
pub async fn zkpass_verify(
    State(state): State<AppState>,
    session: Session,
    Path(handle): Path<String>,
    Json(result): Json<TransGateResult>,
) -> Result<Json<VerifiedResponse>> {
    let (product, gate) = gated_product(&state, &handle).await?;
    let ProofGate::ZkPass { schema_id } = gate else {
        return Err(AppError::BadRequest(format!("{handle} is not gated by zkPass")));
    };

    verify_result(&result, &schema_id, &state.config().zkpass.allocator_address)?;

    session::unlock_product(&session, &product.handle).await?;
    tracing::info!(handle = %product.handle, "zkPass proof verified");
    add_breadcrumb(
        "proof",
        "Product unlocked",
        Some(&[("handle", product.handle.as_str())]),
    );

    Ok(Json(VerifiedResponse::verified(&product.handle)))
}
