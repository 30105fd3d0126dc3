//! Explicit session credential.
//!
//! Every backend call receives a [`Session`] argument instead of reading a
//! token from ambient storage, so the core can be exercised without any
//! global environment.

use std::fmt;

use crate::error::{ClientError, ClientResult};

/// Credential carried by backend calls.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    /// A session without credentials. Read calls only.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { token: None }
    }

    /// A session authenticated with a bearer token.
    ///
    /// Blank tokens produce an anonymous session.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        let token = token.into();
        let token = token.trim();
        if token.is_empty() {
            Self::anonymous()
        } else {
            Self {
                token: Some(token.to_string()),
            }
        }
    }

    /// Whether a credential is present.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Value for the `Authorization` header, if any.
    #[must_use]
    pub fn authorization(&self) -> Option<String> {
        self.token.as_ref().map(|token| format!("Bearer {token}"))
    }

    /// Fail with [`ClientError::Unauthorized`] unless a credential is present.
    pub fn require(&self) -> ClientResult<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(ClientError::Unauthorized)
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header() {
        let session = Session::bearer("abc123");
        assert!(session.is_authenticated());
        assert_eq!(session.authorization().as_deref(), Some("Bearer abc123"));
        assert!(session.require().is_ok());
    }

    #[test]
    fn test_blank_token_is_anonymous() {
        let session = Session::bearer("   ");
        assert!(!session.is_authenticated());
        assert_eq!(session.require(), Err(ClientError::Unauthorized));
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", Session::bearer("super-secret"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("redacted"));
    }
}
