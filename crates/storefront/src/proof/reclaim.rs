//! Reclaim protocol (zkTLS) proof gate.
//!
//! # Flow
//!
//! 1. [`ReclaimClient::create_request`] signs `{providerId, timestamp}` with
//!    the application key, opens a session with the Reclaim backend and
//!    builds the verifier link the shopper scans as a QR code.
//! 2. The Reclaim app produces a proof and posts it to
//!    `/proof/reclaim/callback?session_id=…`.
//! 3. [`verify_proof`] recomputes the claim identifier and recovers every
//!    attestor signature. [`ReclaimClient::verify`] then checks the signed
//!    context names this request: `contextMessage` must be the product handle
//!    and `reclaimSessionId` the session opened for the product's provider.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use k256::ecdsa::SigningKey;
use qrcode::QrCode;
use qrcode::render::svg;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use zkcart_core::EvmAddress;

use super::ProofError;
use super::eth::{
    address_of, keccak256, recover_personal_signer, sign_eip191, signing_key_from_hex,
};
use crate::config::ReclaimConfig;

const SDK_VERSION: &str = concat!("zkcart-", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Proof types
// =============================================================================

/// A proof as delivered by the Reclaim callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReclaimProof {
    pub identifier: String,
    pub claim_data: ClaimData,
    #[serde(default)]
    pub signatures: Vec<String>,
    #[serde(default)]
    pub witnesses: Vec<WitnessData>,
    #[serde(default)]
    pub extracted_parameter_values: Option<Value>,
}

/// The attested claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimData {
    pub provider: String,
    pub parameters: String,
    pub owner: String,
    pub timestamp_s: u64,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub identifier: String,
    pub epoch: u64,
}

/// An attestor that took part in producing the proof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessData {
    pub id: String,
    #[serde(default)]
    pub url: String,
}

/// A verification request ready to show to the shopper.
#[derive(Debug, Clone)]
pub struct ProofRequest {
    pub session_id: String,
    pub request_url: String,
    /// The request URL as an inline SVG QR code.
    pub qr_svg: String,
}

// =============================================================================
// Verification
// =============================================================================

/// Serialize JSON with object keys sorted and no insignificant whitespace.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Compute the claim identifier: keccak256 of `provider`, `parameters` and
/// context joined by newlines. `parameters` is hashed exactly as attested;
/// only the context is re-canonicalized.
///
/// # Errors
///
/// Returns `ProofError::Malformed` if a non-empty context is not JSON.
pub fn identifier_for(claim: &ClaimData) -> Result<String, ProofError> {
    let context = if claim.context.trim().is_empty() {
        String::new()
    } else {
        let value: Value = serde_json::from_str(&claim.context)
            .map_err(|e| ProofError::Malformed(format!("context is not JSON: {e}")))?;
        canonical_json(&value)
    };

    let preimage = format!("{}\n{}\n{context}", claim.provider, claim.parameters);
    Ok(format!("0x{}", hex::encode(keccak256(preimage))))
}

/// The message each attestor signs for a claim.
#[must_use]
pub fn claim_sign_message(claim: &ClaimData, identifier: &str) -> String {
    format!(
        "{identifier}\n{}\n{}\n{}",
        claim.owner.to_lowercase(),
        claim.timestamp_s,
        claim.epoch
    )
}

/// Check a proof's integrity and its attestor signatures.
///
/// Every listed witness must be trusted and must have signed. A proof with no
/// witness list is accepted only if every signer is trusted.
///
/// # Errors
///
/// Returns the first failed check as a `ProofError`.
pub fn verify_proof(proof: &ReclaimProof, trusted_attestors: &[EvmAddress]) -> Result<(), ProofError> {
    if proof.signatures.is_empty() {
        return Err(ProofError::NoSignatures);
    }

    let computed = identifier_for(&proof.claim_data)?;
    let claimed = proof.identifier.trim().trim_matches('"').to_lowercase();
    if computed != claimed {
        return Err(ProofError::IdentifierMismatch {
            expected: computed,
            actual: claimed,
        });
    }

    let message = claim_sign_message(&proof.claim_data, &computed);
    let signers = proof
        .signatures
        .iter()
        .map(|signature| recover_personal_signer(&message, signature))
        .collect::<Result<Vec<_>, _>>()?;

    if proof.witnesses.is_empty() {
        if let Some(signer) = signers.iter().find(|s| !trusted_attestors.contains(s)) {
            return Err(ProofError::UntrustedSigner(*signer));
        }
        return Ok(());
    }

    for witness in &proof.witnesses {
        let witness = EvmAddress::parse(&witness.id)
            .map_err(|e| ProofError::Malformed(format!("witness id {}: {e}", witness.id)))?;
        if !trusted_attestors.contains(&witness) {
            return Err(ProofError::UntrustedWitness(witness));
        }
        if !signers.contains(&witness) {
            return Err(ProofError::MissingWitnessSignature(witness));
        }
    }

    Ok(())
}

/// Read an extracted parameter from the claim context, falling back to the
/// proof's `extractedParameterValues`. Blank values count as absent.
#[must_use]
pub fn extracted_parameter(proof: &ReclaimProof, name: &str) -> Option<String> {
    let from_context = serde_json::from_str::<Value>(&proof.claim_data.context)
        .ok()
        .and_then(|context| {
            context
                .get("extractedParameters")
                .and_then(|params| params.get(name))
                .and_then(scalar_string)
        });

    from_context
        .or_else(|| {
            proof
                .extracted_parameter_values
                .as_ref()
                .and_then(|values| values.get(name))
                .and_then(scalar_string)
        })
        .filter(|v| !v.trim().is_empty())
}

/// The request a callback must answer.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedClaim<'a> {
    /// Reclaim session the callback arrived for.
    pub session_id: &'a str,
    /// Product handle sent as `contextMessage`.
    pub handle: &'a str,
    /// Provider the session was opened for.
    pub provider_id: &'a str,
}

/// Check a proof's signed context against the request it should answer.
///
/// The Reclaim backend opens a session for exactly one provider and the
/// attestor signs its ID into the context, so a matching `reclaimSessionId`
/// also pins the provider.
///
/// # Errors
///
/// Returns `ProofError::ForeignProof` naming the first field that differs.
pub fn check_binding(proof: &ReclaimProof, expected: &ExpectedClaim<'_>) -> Result<(), ProofError> {
    let context = serde_json::from_str::<Value>(&proof.claim_data.context).unwrap_or(Value::Null);
    let field = |name: &str| context.get(name).and_then(Value::as_str);

    if field("contextMessage") != Some(expected.handle) {
        return Err(ProofError::ForeignProof(format!(
            "contextMessage is not '{}'",
            expected.handle
        )));
    }

    if field("reclaimSessionId") != Some(expected.session_id) {
        return Err(ProofError::ForeignProof(format!(
            "reclaimSessionId is not '{}'",
            expected.session_id
        )));
    }

    Ok(())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a callback body: a JSON proof, a JSON array of proofs, or either
/// of those URL-encoded.
///
/// # Errors
///
/// Returns `ProofError::Malformed` if the body holds no proof.
pub fn parse_callback_body(body: &[u8]) -> Result<Vec<ReclaimProof>, ProofError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| ProofError::Malformed(format!("body is not UTF-8: {e}")))?
        .trim();

    let json: Cow<'_, str> = if text.starts_with('{') || text.starts_with('[') {
        Cow::Borrowed(text)
    } else {
        urlencoding::decode(text)
            .map_err(|e| ProofError::Malformed(format!("body is not URL-encoded: {e}")))?
    };

    let value: Value = serde_json::from_str(&json)
        .map_err(|e| ProofError::Malformed(format!("body is not JSON: {e}")))?;

    let proofs = match value {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<ReclaimProof>, _>>(),
        other => serde_json::from_value(other).map(|proof| vec![proof]),
    }
    .map_err(|e| ProofError::Malformed(format!("unexpected proof shape: {e}")))?;

    if proofs.is_empty() {
        return Err(ProofError::Malformed("no proofs in callback".to_string()));
    }
    Ok(proofs)
}

// =============================================================================
// ReclaimClient
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitSessionRequest<'a> {
    provider_id: &'a str,
    app_id: &'a str,
    timestamp: &'a str,
    signature: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitSessionResponse {
    session_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestTemplate<'a> {
    session_id: &'a str,
    provider_id: &'a str,
    application_id: &'a str,
    signature: &'a str,
    timestamp: &'a str,
    callback_url: String,
    context: String,
    parameters: BTreeMap<String, String>,
    redirect_url: String,
    accept_ai_providers: bool,
    json_proof_response: bool,
    sdk_version: &'static str,
}

/// Client for the Reclaim backend plus the verification policy.
#[derive(Clone)]
pub struct ReclaimClient {
    inner: Arc<ReclaimClientInner>,
}

struct ReclaimClientInner {
    client: reqwest::Client,
    config: ReclaimConfig,
    signing_key: SigningKey,
    base_url: String,
}

impl ReclaimClient {
    /// Create a client.
    ///
    /// `base_url` is the storefront's public URL, used for callback and
    /// redirect links.
    ///
    /// # Errors
    ///
    /// Returns `ProofError::Malformed` if the application secret is not a
    /// secp256k1 private key.
    pub fn new(config: &ReclaimConfig, base_url: &str) -> Result<Self, ProofError> {
        let signing_key = signing_key_from_hex(config.app_secret.expose_secret())?;

        let key_address = address_of(signing_key.verifying_key());
        if EvmAddress::parse(&config.app_id).ok() != Some(key_address) {
            tracing::warn!(
                app_id = %config.app_id,
                key_address = %key_address,
                "RECLAIM_APP_ID does not match the address of RECLAIM_APP_SECRET"
            );
        }

        Ok(Self {
            inner: Arc::new(ReclaimClientInner {
                client: reqwest::Client::new(),
                config: config.clone(),
                signing_key,
                base_url: base_url.trim_end_matches('/').to_string(),
            }),
        })
    }

    /// Open a Reclaim session for a provider and build the verifier link.
    ///
    /// # Errors
    ///
    /// Returns `ProofError::Http`/`ProofError::Service` if the backend call
    /// fails and `ProofError::Qr` if the link cannot be encoded.
    #[instrument(skip(self), fields(provider_id = %provider_id, handle = %handle))]
    pub async fn create_request(
        &self,
        provider_id: &str,
        handle: &str,
    ) -> Result<ProofRequest, ProofError> {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let signature = self.init_signature(provider_id, &timestamp)?;
        let session_id = self.init_session(provider_id, &timestamp, &signature).await?;

        let request_url =
            self.request_url(&session_id, provider_id, handle, &signature, &timestamp)?;
        let qr_svg = render_qr(&request_url)?;

        tracing::info!(session_id = %session_id, "Reclaim session created");

        Ok(ProofRequest {
            session_id,
            request_url,
            qr_svg,
        })
    }

    /// Sign `keccak256(canonical {providerId, timestamp})` with the app key.
    fn init_signature(&self, provider_id: &str, timestamp: &str) -> Result<String, ProofError> {
        let payload = serde_json::json!({
            "providerId": provider_id,
            "timestamp": timestamp,
        });
        let hash = keccak256(canonical_json(&payload));
        let signature = sign_eip191(&self.inner.signing_key, hash)?;
        Ok(format!("0x{}", hex::encode(signature)))
    }

    async fn init_session(
        &self,
        provider_id: &str,
        timestamp: &str,
        signature: &str,
    ) -> Result<String, ProofError> {
        let url = format!("{}/api/sdk/init/session/", self.inner.config.api_url);

        let response = self
            .inner
            .client
            .post(&url)
            .json(&InitSessionRequest {
                provider_id,
                app_id: &self.inner.config.app_id,
                timestamp,
                signature,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Reclaim session init failed"
            );
            return Err(ProofError::Service(format!(
                "HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: InitSessionResponse = serde_json::from_str(&body)
            .map_err(|e| ProofError::Service(format!("unexpected init response: {e}")))?;
        Ok(parsed.session_id)
    }

    fn request_url(
        &self,
        session_id: &str,
        provider_id: &str,
        handle: &str,
        signature: &str,
        timestamp: &str,
    ) -> Result<String, ProofError> {
        let base = &self.inner.base_url;
        let context = serde_json::json!({
            "contextAddress": "0x0",
            "contextMessage": handle,
        });

        let template = RequestTemplate {
            session_id,
            provider_id,
            application_id: &self.inner.config.app_id,
            signature,
            timestamp,
            callback_url: callback_url(base, session_id),
            context: context.to_string(),
            parameters: BTreeMap::new(),
            redirect_url: format!("{base}/products/{}", urlencoding::encode(handle)),
            accept_ai_providers: false,
            json_proof_response: true,
            sdk_version: SDK_VERSION,
        };

        let json = serde_json::to_string(&template)
            .map_err(|e| ProofError::Malformed(format!("request template: {e}")))?;

        Ok(format!(
            "{}/verifier/?template={}",
            self.inner.config.share_url,
            urlencoding::encode(&json)
        ))
    }

    /// Verify every proof in a callback, bind it to the expected request and
    /// check the gate's required parameter.
    ///
    /// # Errors
    ///
    /// Returns the first verification failure, `ProofError::ForeignProof` if
    /// a proof answers another request, or `ProofError::ClaimNotSatisfied` if
    /// no proof carries the parameter.
    pub fn verify(
        &self,
        proofs: &[ReclaimProof],
        expected: &ExpectedClaim<'_>,
    ) -> Result<(), ProofError> {
        let config = &self.inner.config;
        let mut satisfied = false;

        for proof in proofs {
            verify_proof(proof, &config.trusted_attestors)?;
            check_binding(proof, expected)?;

            tracing::info!(
                followed_by = ?extracted_parameter(proof, "followed_by"),
                following = ?extracted_parameter(proof, "following"),
                provider_id = %expected.provider_id,
                "Reclaim proof signatures verified"
            );

            satisfied |= extracted_parameter(proof, &config.required_parameter).is_some();
        }

        if satisfied {
            Ok(())
        } else {
            Err(ProofError::ClaimNotSatisfied(format!(
                "proof does not include '{}'",
                config.required_parameter
            )))
        }
    }
}

fn callback_url(base_url: &str, session_id: &str) -> String {
    format!(
        "{base_url}/proof/reclaim/callback?session_id={}",
        urlencoding::encode(session_id)
    )
}

/// Render a URL as an inline SVG QR code (no XML prolog).
///
/// # Errors
///
/// Returns `ProofError::Qr` if the data does not fit in a QR code.
pub fn render_qr(data: &str) -> Result<String, ProofError> {
    let code = QrCode::new(data.as_bytes()).map_err(|e| ProofError::Qr(e.to_string()))?;
    let svg = code
        .render::<svg::Color<'_>>()
        .min_dimensions(240, 240)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    Ok(svg
        .find("<svg")
        .and_then(|start| svg.get(start..))
        .unwrap_or(&svg)
        .to_string())
}
