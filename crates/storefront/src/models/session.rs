//! Session-related types.
//!
//! Everything the storefront remembers about a shopper lives in the session:
//! the cart ID, the products whose proof gate has passed, and the Reclaim
//! session opened for each product.

use std::collections::{BTreeMap, BTreeSet};

use tower_sessions::Session;
use tower_sessions::session::Error as SessionError;
use zkcart_core::CartId;

/// Session keys for shopper state.
pub mod keys {
    /// Key for storing the Shopify cart ID.
    pub const CART_ID: &str = "cartId";

    /// Key for the set of product handles whose gate has passed.
    pub const UNLOCKED_PRODUCTS: &str = "unlocked_products";

    /// Key for pending Reclaim session IDs by product handle.
    pub const RECLAIM_SESSIONS: &str = "reclaim_sessions";
}

/// Get the cart ID from the session.
pub async fn cart_id(session: &Session) -> Option<String> {
    session.get::<String>(keys::CART_ID).await.ok().flatten()
}

/// Set the cart ID in the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn set_cart_id(session: &Session, cart_id: &CartId) -> Result<(), SessionError> {
    session.insert(keys::CART_ID, cart_id.as_str()).await
}

/// Product handles unlocked in this session.
pub async fn unlocked_products(session: &Session) -> BTreeSet<String> {
    session
        .get::<BTreeSet<String>>(keys::UNLOCKED_PRODUCTS)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Whether a product has been unlocked in this session.
pub async fn is_unlocked(session: &Session, handle: &str) -> bool {
    unlocked_products(session).await.contains(handle)
}

/// Record that a product's proof gate passed.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn unlock_product(session: &Session, handle: &str) -> Result<(), SessionError> {
    let mut unlocked = unlocked_products(session).await;
    if unlocked.insert(handle.to_string()) {
        session.insert(keys::UNLOCKED_PRODUCTS, unlocked).await?;
    }
    Ok(())
}

async fn reclaim_sessions(session: &Session) -> BTreeMap<String, String> {
    session
        .get::<BTreeMap<String, String>>(keys::RECLAIM_SESSIONS)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// The Reclaim session opened for a product, if any.
pub async fn reclaim_session(session: &Session, handle: &str) -> Option<String> {
    reclaim_sessions(session).await.remove(handle)
}

/// Remember the Reclaim session opened for a product.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn set_reclaim_session(
    session: &Session,
    handle: &str,
    session_id: &str,
) -> Result<(), SessionError> {
    let mut sessions = reclaim_sessions(session).await;
    sessions.insert(handle.to_string(), session_id.to_string());
    session.insert(keys::RECLAIM_SESSIONS, sessions).await
}

/// Forget the Reclaim session for a product.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn clear_reclaim_session(session: &Session, handle: &str) -> Result<(), SessionError> {
    let mut sessions = reclaim_sessions(session).await;
    if sessions.remove(handle).is_some() {
        session.insert(keys::RECLAIM_SESSIONS, sessions).await?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_cart_id_roundtrip() {
        let session = session();
        assert!(cart_id(&session).await.is_none());

        set_cart_id(&session, &CartId::new("gid://shopify/Cart/1"))
            .await
            .unwrap();
        assert_eq!(
            cart_id(&session).await.as_deref(),
            Some("gid://shopify/Cart/1")
        );
    }

    #[tokio::test]
    async fn test_unlock_product() {
        let session = session();
        assert!(!is_unlocked(&session, "tee").await);

        unlock_product(&session, "tee").await.unwrap();
        unlock_product(&session, "tee").await.unwrap();
        unlock_product(&session, "hoodie").await.unwrap();

        assert!(is_unlocked(&session, "tee").await);
        assert_eq!(unlocked_products(&session).await.len(), 2);
    }

    #[tokio::test]
    async fn test_reclaim_sessions_by_handle() {
        let session = session();
        set_reclaim_session(&session, "tee", "s1").await.unwrap();
        set_reclaim_session(&session, "hoodie", "s2").await.unwrap();

        assert_eq!(reclaim_session(&session, "tee").await.as_deref(), Some("s1"));

        clear_reclaim_session(&session, "tee").await.unwrap();
        assert!(reclaim_session(&session, "tee").await.is_none());
        assert_eq!(
            reclaim_session(&session, "hoodie").await.as_deref(),
            Some("s2")
        );
    }
}
