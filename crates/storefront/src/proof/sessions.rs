//! Pending Reclaim sessions.
//!
//! The proof arrives on a server-to-server callback, not on the shopper's
//! request, so its verdict is parked here until the shopper's page polls.

use std::time::Duration;

use moka::future::Cache;

use super::ProofError;

/// Sessions expire after 15 minutes, matching the verifier link lifetime.
const SESSION_TTL: Duration = Duration::from_secs(15 * 60);

/// Verification state of a proof session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Waiting for the callback.
    Pending,
    /// A proof arrived and passed verification.
    Verified,
    /// A proof arrived and failed verification.
    Rejected(String),
}

/// A session and the product it unlocks.
#[derive(Debug, Clone)]
pub struct PendingSession {
    pub handle: String,
    /// Reclaim provider the session was opened for.
    pub provider_id: String,
    pub status: SessionStatus,
}

/// In-process store of pending proof sessions keyed by Reclaim session ID.
#[derive(Clone)]
pub struct ProofSessions {
    sessions: Cache<String, PendingSession>,
}

impl ProofSessions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(SESSION_TTL)
                .build(),
        }
    }

    /// Start tracking a session for a product's provider.
    pub async fn register(&self, session_id: &str, handle: &str, provider_id: &str) {
        self.sessions
            .insert(
                session_id.to_string(),
                PendingSession {
                    handle: handle.to_string(),
                    provider_id: provider_id.to_string(),
                    status: SessionStatus::Pending,
                },
            )
            .await;
    }

    /// Look up a session.
    ///
    /// # Errors
    ///
    /// Returns `ProofError::UnknownSession` if the session was never
    /// registered or has expired.
    pub async fn get(&self, session_id: &str) -> Result<PendingSession, ProofError> {
        self.sessions
            .get(session_id)
            .await
            .ok_or_else(|| ProofError::UnknownSession(session_id.to_string()))
    }

    /// Current status of a session.
    ///
    /// # Errors
    ///
    /// Returns `ProofError::UnknownSession` for unknown sessions.
    pub async fn status(&self, session_id: &str) -> Result<SessionStatus, ProofError> {
        Ok(self.get(session_id).await?.status)
    }

    /// Record a passing proof.
    ///
    /// # Errors
    ///
    /// Returns `ProofError::UnknownSession` for unknown sessions.
    pub async fn mark_verified(&self, session_id: &str) -> Result<(), ProofError> {
        self.set_status(session_id, SessionStatus::Verified).await
    }

    /// Record a failing proof.
    ///
    /// # Errors
    ///
    /// Returns `ProofError::UnknownSession` for unknown sessions.
    pub async fn mark_rejected(&self, session_id: &str, reason: &str) -> Result<(), ProofError> {
        self.set_status(session_id, SessionStatus::Rejected(reason.to_string()))
            .await
    }

    async fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<(), ProofError> {
        let mut session = self.get(session_id).await?;
        // A verified session stays verified; a late bad proof cannot revoke it.
        // A rejected one can still be verified by a later valid proof.
        if session.status == SessionStatus::Verified {
            return Ok(());
        }
        session.status = status;
        self.sessions.insert(session_id.to_string(), session).await;
        Ok(())
    }
}

impl Default for ProofSessions {
    fn default() -> Self {
        Self::new()
    }
}
