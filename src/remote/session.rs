//! Cloud session store (C4.3): `{access_token, refresh_token?, expires_at?,
//! user_id?, email?}`, preferentially kept in the OS keychain, falling back
//! to `~/.config/envsync/session.json` (spec.md 4.4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::keychain;
use crate::error::{Result, SessionError};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }
}

/// Load the active session, if any. Does not check expiry.
pub fn load() -> Result<Option<Session>> {
    match keychain::get("session")? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Load the active session and validate it has not expired.
pub fn load_valid() -> Result<Session> {
    let session = load()?.ok_or(SessionError::SessionMissing)?;
    if session.is_expired(Utc::now()) {
        return Err(SessionError::SessionExpired.into());
    }
    Ok(session)
}

pub fn save(session: &Session) -> Result<()> {
    let json = serde_json::to_string(session)?;
    keychain::put("session", &json)
}

/// Delete the session from both the keychain and its file fallback
/// (spec.md 4.4.3, `logout`).
pub fn clear() -> Result<()> {
    keychain::clear("session")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expired_session_is_detected() {
        let session = Session {
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() - Duration::hours(1)),
            user_id: None,
            email: None,
        };
        assert!(session.is_expired(Utc::now()));
    }

    #[test]
    fn session_without_expiry_never_expires() {
        let session = Session {
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: None,
            user_id: None,
            email: None,
        };
        assert!(!session.is_expired(Utc::now()));
    }
}
