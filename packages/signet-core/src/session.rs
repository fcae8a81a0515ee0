//! Session and account data model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque session credential issued by the identity service.
///
/// The value is secret; `Debug` redacts it so tokens cannot leak through
/// logs or panic messages.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The active login credential and its directly-associated identity claims.
///
/// The user id and email address are unknown until the first successful
/// account fetch completes; only the token survives a restart.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: Option<String>,
    pub email_address: Option<String>,
}

impl Session {
    pub fn new(token: SessionToken) -> Self {
        Self {
            token,
            user_id: None,
            email_address: None,
        }
    }
}

/// Cached profile data fetched from the identity service.
///
/// Always subordinate to a live [`Session`]; cleared whenever the session
/// ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub user_id: Option<String>,
    pub email_address: Option<String>,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_debug_is_redacted() {
        let token = SessionToken::new("super-secret");
        assert_eq!(format!("{:?}", token), "SessionToken(***)");
    }

    #[test]
    fn account_tolerates_missing_fields() {
        let account: Account = serde_json::from_str(r#"{"displayName": "Jane"}"#).unwrap();
        assert_eq!(account.display_name.as_deref(), Some("Jane"));
        assert_eq!(account.user_id, None);
    }

    #[test]
    fn account_parses_full_payload() {
        let account: Account = serde_json::from_str(
            r#"{
                "userId": "u-42",
                "emailAddress": "jane@example.com",
                "displayName": "Jane D.",
                "firstName": "Jane",
                "lastName": "Doe"
            }"#,
        )
        .unwrap();
        assert_eq!(account.user_id.as_deref(), Some("u-42"));
        assert_eq!(account.email_address.as_deref(), Some("jane@example.com"));
        assert_eq!(account.last_name.as_deref(), Some("Doe"));
    }
}
