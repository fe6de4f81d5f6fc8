//! Session-based authentication state.
//!
//! Login state is an explicit object owned by the application state and passed
//! to whoever needs it, with a `login()`/`logout()` API and bearer-token
//! sessions. Handlers resolve a token to an [`Actor`], which is what the audit
//! log records against each change.

use crate::{PharmacyError, PharmacyResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Role recorded for pharmacy staff sessions.
const PHARMACIST_ROLE: &str = "Pharmacist";

/// The identity a session resolves to. Audit entries record the actor's id
/// and role alongside every change.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Actor {
    pub id: String,
    pub role: String,
}

impl Actor {
    /// Actor recorded for changes applied on behalf of the oncology system
    /// (socket updates, cancellations) rather than a logged-in pharmacist.
    pub fn external_system() -> Self {
        Self {
            id: "ONCOLOGY".to_string(),
            role: "External System".to_string(),
        }
    }
}

/// An opaque bearer token identifying a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionToken(Uuid);

impl SessionToken {
    /// Parse a token from its string form. Returns `None` for anything that
    /// is not a UUID; unknown-but-well-formed tokens are rejected later by
    /// the session lookup.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
struct Session {
    actor: Actor,
    issued_at: DateTime<Utc>,
}

/// Explicit authentication state: active sessions keyed by token.
///
/// Owned by the shared application state; there is deliberately no
/// module-level login flag anywhere in this crate.
#[derive(Debug, Default)]
pub struct AuthState {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for a pharmacist and return its bearer token.
    ///
    /// Credentials are not verified against a directory — the original system
    /// had none — but both fields must be non-empty, and every session is
    /// tied to the id it was opened with.
    ///
    /// # Errors
    ///
    /// Returns [`PharmacyError::InvalidInput`] if the id or password is empty
    /// or whitespace-only.
    pub fn login(&self, pharmacist_id: &str, password: &str) -> PharmacyResult<SessionToken> {
        let pharmacist_id = pharmacist_id.trim();
        if pharmacist_id.is_empty() {
            return Err(PharmacyError::InvalidInput(
                "pharmacist id must not be empty".into(),
            ));
        }
        if password.trim().is_empty() {
            return Err(PharmacyError::InvalidInput(
                "password must not be empty".into(),
            ));
        }

        let token = Uuid::new_v4();
        let session = Session {
            actor: Actor {
                id: pharmacist_id.to_string(),
                role: PHARMACIST_ROLE.to_string(),
            },
            issued_at: Utc::now(),
        };

        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| PharmacyError::LockPoisoned)?;
        sessions.insert(token, session);

        tracing::info!(pharmacist = pharmacist_id, "session opened");
        Ok(SessionToken(token))
    }

    /// End a session. Returns `true` if the token was active.
    pub fn logout(&self, token: &SessionToken) -> PharmacyResult<bool> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| PharmacyError::LockPoisoned)?;
        Ok(sessions.remove(&token.0).is_some())
    }

    /// Resolve a token to the actor it was issued to.
    pub fn actor_for(&self, token: &SessionToken) -> PharmacyResult<Option<Actor>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| PharmacyError::LockPoisoned)?;
        Ok(sessions.get(&token.0).map(|s| s.actor.clone()))
    }

    /// Resolve a token, treating an unknown token as an authentication error.
    pub fn require_actor(&self, token: &SessionToken) -> PharmacyResult<Actor> {
        self.actor_for(token)?
            .ok_or(PharmacyError::NotAuthenticated)
    }

    /// When the session identified by `token` was opened.
    pub fn issued_at(&self, token: &SessionToken) -> PharmacyResult<Option<DateTime<Utc>>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| PharmacyError::LockPoisoned)?;
        Ok(sessions.get(&token.0).map(|s| s.issued_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_issues_a_resolvable_token() {
        let auth = AuthState::new();
        let token = auth.login("PH001", "secret").unwrap();

        let actor = auth.require_actor(&token).unwrap();
        assert_eq!(actor.id, "PH001");
        assert_eq!(actor.role, PHARMACIST_ROLE);
    }

    #[test]
    fn login_rejects_empty_credentials() {
        let auth = AuthState::new();
        assert!(auth.login("", "secret").is_err());
        assert!(auth.login("PH001", "   ").is_err());
    }

    #[test]
    fn logout_invalidates_the_token() {
        let auth = AuthState::new();
        let token = auth.login("PH001", "secret").unwrap();

        assert!(auth.logout(&token).unwrap());
        assert!(auth.actor_for(&token).unwrap().is_none());
        assert!(matches!(
            auth.require_actor(&token),
            Err(PharmacyError::NotAuthenticated)
        ));
        // A second logout is a no-op.
        assert!(!auth.logout(&token).unwrap());
    }

    #[test]
    fn tokens_are_unique_per_login() {
        let auth = AuthState::new();
        let first = auth.login("PH001", "secret").unwrap();
        let second = auth.login("PH001", "secret").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn token_parse_round_trips() {
        let auth = AuthState::new();
        let token = auth.login("PH001", "secret").unwrap();
        let reparsed = SessionToken::parse(&token.to_string()).unwrap();
        assert_eq!(token, reparsed);
        assert!(SessionToken::parse("not-a-token").is_none());
    }
}
