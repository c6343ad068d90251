//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::proof::ProofError;
use crate::services::{CartActionError, GateError};
use crate::shopify::ShopifyError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Shopify API operation failed.
    #[error("Shopify error: {0}")]
    Shopify(#[from] ShopifyError),

    /// A cart action failed; the message is shown to the shopper.
    #[error("{0}")]
    Cart(#[from] CartActionError),

    /// A gated product was not unlocked.
    #[error("{0}")]
    Gate(#[from] GateError),

    /// Requesting or verifying a proof failed.
    #[error("Proof error: {0}")]
    Proof(#[from] ProofError),

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Status fragment carrying a shopper-facing message (`aria-live`).
#[derive(Template, WebTemplate)]
#[template(path = "partials/action_message.html")]
pub struct ActionMessageTemplate {
    pub message: String,
    pub is_error: bool,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Shopify(ShopifyError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
            Self::Shopify(_) => StatusCode::BAD_GATEWAY,
            Self::Cart(err) => {
                if err.is_missing_input() {
                    StatusCode::BAD_REQUEST
                } else if matches!(err, CartActionError::ItemNotFound) {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
            Self::Gate(_) => StatusCode::FORBIDDEN,
            Self::Proof(err) => match err {
                ProofError::UnknownSession(_) => StatusCode::NOT_FOUND,
                ProofError::Malformed(_) => StatusCode::BAD_REQUEST,
                err if err.is_rejection() => StatusCode::FORBIDDEN,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show the shopper.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Shopify(_) => "External service error".to_string(),
            Self::Proof(err) if !err.is_rejection() => {
                "Proof service unavailable, please try again".to_string()
            }
            Self::Proof(ProofError::UnknownSession(_)) => {
                "Proof session expired, please start again".to_string()
            }
            Self::Proof(_) => "Proof verification failed".to_string(),
            Self::Cart(err) => err.to_string(),
            Self::Gate(err) => err.to_string(),
            Self::NotFound(_) | Self::BadRequest(_) => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::warn!(error = %self, status = %status, "Request rejected");
        }

        // Don't expose internal error details to clients
        let fragment = ActionMessageTemplate {
            message: self.public_message(),
            is_error: true,
        };

        (status, fragment).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("handle", "tee")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shopify::GraphQLError;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::Cart(CartActionError::ItemNotFound);
        assert_eq!(err.to_string(), "Item not found in cart");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(CartActionError::MissingCartId.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CartActionError::MissingLineInput.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CartActionError::ItemNotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CartActionError::AddItem.into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(
                GateError::Locked {
                    handle: "tee".to_string()
                }
                .into()
            ),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(ProofError::NoSignatures.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(ProofError::Service("down".to_string()).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(ProofError::UnknownSession("s".to_string()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(ShopifyError::RateLimited(5).into()),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_public_message_hides_internals() {
        let err = AppError::Shopify(ShopifyError::GraphQL(vec![GraphQLError::message(
            "secret upstream detail",
        )]));
        assert_eq!(err.public_message(), "External service error");

        let err = AppError::Proof(ProofError::IdentifierMismatch {
            expected: "0x1".to_string(),
            actual: "0x2".to_string(),
        });
        assert_eq!(err.public_message(), "Proof verification failed");

        let err = AppError::Cart(CartActionError::DiscountCodeRequired);
        assert_eq!(
            err.public_message(),
            "Error applying discount. Discount code required."
        );
    }
}
