//! Access Gate
//!
//! Interface of the access-control gate that runs before a session is
//! mounted. The gate only answers whether the caller may enter and, if not,
//! where they should be sent.

use thiserror::Error;

/// What the gate knows about the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessContext {
    /// Whether the caller holds a valid login.
    pub authenticated: bool,
    /// Role string issued with the login.
    pub role: String,
}

/// Predicate a screen requires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// Any authenticated caller.
    Authenticated,
    /// An authenticated caller whose role is one of these.
    AnyRole(Vec<String>),
}

/// Where a rejected caller goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Redirect {
    /// Not logged in.
    Login,
    /// Logged in, but the screen does not exist for this role.
    NotFound,
}

/// Rejection from the gate.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("access denied, redirecting to {redirect:?}")]
pub struct AccessDenied {
    /// Destination for the caller.
    pub redirect: Redirect,
}

impl AccessContext {
    /// Create a context.
    pub fn new(authenticated: bool, role: impl Into<String>) -> Self {
        Self {
            authenticated,
            role: role.into(),
        }
    }

    /// Read `RUNNER_AUTHENTICATED` and `RUNNER_ROLE`.
    pub fn from_env() -> Self {
        Self {
            authenticated: std::env::var("RUNNER_AUTHENTICATED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            role: std::env::var("RUNNER_ROLE").unwrap_or_default(),
        }
    }

    /// Check the caller against a requirement.
    pub fn admit(&self, requirement: &Requirement) -> Result<(), AccessDenied> {
        if !self.authenticated {
            return Err(AccessDenied { redirect: Redirect::Login });
        }

        match requirement {
            Requirement::Authenticated => Ok(()),
            Requirement::AnyRole(roles) => {
                if roles.iter().any(|role| role.eq_ignore_ascii_case(&self.role)) {
                    Ok(())
                } else {
                    Err(AccessDenied { redirect: Redirect::NotFound })
                }
            }
        }
    }
}

impl Requirement {
    /// Requirement for screens limited to the given roles.
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyRole(roles.into_iter().map(Into::into).collect())
    }
}
