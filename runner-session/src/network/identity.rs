//! Request Identity
//!
//! The credential and selected subject attached to every stats store request.
//! Both are opaque: the session passes them through without validating them.

use sha2::{Digest, Sha256};
use std::fmt;

/// Identity context, fixed for the lifetime of a transport.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    session_token: String,
    selected_subject_id: String,
}

impl Identity {
    /// Create an identity from explicit values.
    pub fn new(session_token: impl Into<String>, selected_subject_id: impl Into<String>) -> Self {
        Self {
            session_token: session_token.into(),
            selected_subject_id: selected_subject_id.into(),
        }
    }

    /// Bearer credential.
    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    /// Selected subject identifier.
    pub fn selected_subject_id(&self) -> &str {
        &self.selected_subject_id
    }

    /// Value of the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.session_token)
    }

    /// Short, stable identifier for the credential, safe to log.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"runner-session-token:");
        hasher.update(self.session_token.as_bytes());
        let hash = hasher.finalize();
        hex::encode(&hash[..4])
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("token", &self.fingerprint())
            .field("selected_subject_id", &self.selected_subject_id)
            .finish()
    }
}
