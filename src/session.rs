//! Session state: anonymous → authenticated → anonymous.
//!
//! The store is the only owner of the persisted identity. Other components get
//! the current [`Session`] passed to them explicitly.

use crate::common::{ClientResult, Session};
use crate::storage::SessionDatabase;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated(Session),
}

/// What a transition did, so callers know whether to rebuild identity-bound
/// resources such as the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    IdentityChanged,
    SignedOut,
}

pub struct SessionStore {
    db: SessionDatabase,
    state: SessionState,
}

impl SessionStore {
    /// Restore the persisted session. A record that does not deserialize or has
    /// an empty id is discarded and the store starts anonymous.
    pub fn restore(db: SessionDatabase) -> Self {
        let state = match db.load() {
            Ok(Some(row)) => match parse_record(&row.record) {
                Some(session) => {
                    log::info!(
                        "Restored session for {} (saved at {})",
                        session.email,
                        row.saved_at
                    );
                    SessionState::Authenticated(session)
                }
                None => {
                    log::warn!("Discarding corrupted session record");
                    if let Err(err) = db.clear() {
                        log::error!("Failed to clear corrupted session: {err}");
                    }
                    SessionState::Anonymous
                }
            },
            Ok(None) => SessionState::Anonymous,
            Err(err) => {
                log::error!("Failed to read session storage: {err}");
                SessionState::Anonymous
            }
        };
        Self { db, state }
    }

    #[cfg(test)]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn current(&self) -> Option<&Session> {
        match &self.state {
            SessionState::Authenticated(session) => Some(session),
            SessionState::Anonymous => None,
        }
    }

    /// Persist and activate `session`. Replaces any previous identity.
    pub fn login(&mut self, session: Session) -> ClientResult<Transition> {
        let record = serde_json::to_string(&session)?;
        self.db.save(&record)?;

        let transition = match &self.state {
            SessionState::Authenticated(current) if current.id == session.id => {
                Transition::Unchanged
            }
            _ => Transition::IdentityChanged,
        };
        log::info!("Signed in as {}", session.email);
        self.state = SessionState::Authenticated(session);
        Ok(transition)
    }

    /// Drop the session locally. The in-memory state is cleared even when the
    /// storage delete fails.
    pub fn logout(&mut self) -> ClientResult<Transition> {
        let was_authenticated = matches!(self.state, SessionState::Authenticated(_));
        self.state = SessionState::Anonymous;
        self.db.clear()?;
        Ok(if was_authenticated {
            log::info!("Signed out");
            Transition::SignedOut
        } else {
            Transition::Unchanged
        })
    }
}

fn parse_record(record: &str) -> Option<Session> {
    serde_json::from_str::<Session>(record)
        .ok()
        .filter(|session| !session.id.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> Session {
        Session {
            id: id.into(),
            name: "An".into(),
            email: "an@example.com".into(),
            token: "tok".into(),
        }
    }

    #[test]
    fn login_persists_and_restores() {
        let db = SessionDatabase::in_memory().unwrap();
        let mut store = SessionStore::restore(db);
        assert_eq!(store.state(), &SessionState::Anonymous);

        assert_eq!(store.login(session("u1")).unwrap(), Transition::IdentityChanged);
        assert_eq!(store.login(session("u1")).unwrap(), Transition::Unchanged);
        assert_eq!(store.login(session("u2")).unwrap(), Transition::IdentityChanged);

        let SessionStore { db, .. } = store;
        let restored = SessionStore::restore(db);
        assert_eq!(restored.current().map(|s| s.id.as_str()), Some("u2"));
    }

    #[test]
    fn logout_clears_storage() {
        let mut store = SessionStore::restore(SessionDatabase::in_memory().unwrap());
        store.login(session("u1")).unwrap();
        assert_eq!(store.logout().unwrap(), Transition::SignedOut);
        assert_eq!(store.logout().unwrap(), Transition::Unchanged);

        let SessionStore { db, .. } = store;
        assert!(db.load().unwrap().is_none());
    }

    #[test]
    fn corrupted_record_is_discarded() {
        for record in ["not json", "null", r#"{"_id":"","token":"t"}"#, r#"{"name":"x"}"#] {
            let db = SessionDatabase::in_memory().unwrap();
            db.save(record).unwrap();
            let store = SessionStore::restore(db);
            assert!(store.current().is_none(), "record {record} should be rejected");

            let SessionStore { db, .. } = store;
            assert!(db.load().unwrap().is_none());
        }
    }
}
