//! Explicit authentication and tenant context.
//!
//! Everything that needs the bearer token or the selected agency receives a
//! [`SessionContext`] value; nothing reads them from global state.

pub mod store;

pub use store::SessionStore;

use crate::errors::{PairingError, PairingResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope value used by super admins for the cross-tenant overview.
pub const GENERAL_SCOPE: &str = "geral";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    /// The backend's default when a user has no explicit role.
    #[default]
    Admin,
    #[serde(other)]
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SuperAdmin => write!(f, "super_admin"),
            Self::Admin => write!(f, "admin"),
            Self::User => write!(f, "user"),
        }
    }
}

/// The logged-in user as returned by `/auth/login` and `/auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default, rename = "nome")]
    pub name: Option<String>,
    #[serde(default, rename = "agencia_id")]
    pub agency_id: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl UserProfile {
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

/// Which tenant the operator is currently acting on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgencyScope {
    /// Cross-tenant overview (super admins only).
    General,
    Agency(String),
}

impl From<String> for AgencyScope {
    fn from(value: String) -> Self {
        if value == GENERAL_SCOPE {
            Self::General
        } else {
            Self::Agency(value)
        }
    }
}

impl From<AgencyScope> for String {
    fn from(scope: AgencyScope) -> Self {
        match scope {
            AgencyScope::General => GENERAL_SCOPE.to_string(),
            AgencyScope::Agency(id) => id,
        }
    }
}

impl fmt::Display for AgencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => write!(f, "general view"),
            Self::Agency(id) => write!(f, "agency {}", id),
        }
    }
}

#[derive(Clone, PartialEq, Default)]
pub struct SessionContext {
    token: String,
    user: Option<UserProfile>,
    scope: Option<AgencyScope>,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field(
                "token",
                &if self.token.is_empty() {
                    "[empty]"
                } else {
                    "[REDACTED]"
                },
            )
            .field("user", &self.user)
            .field("scope", &self.scope)
            .finish()
    }
}

impl SessionContext {
    /// Context carrying only a token (env/config override, tests).
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user: None,
            scope: None,
        }
    }

    /// Context after a successful login. Super admins land on the general view,
    /// everyone else on their own agency.
    pub fn from_login(token: impl Into<String>, user: UserProfile) -> Self {
        let scope = if user.is_super_admin() {
            Some(AgencyScope::General)
        } else {
            user.agency_id.clone().map(AgencyScope::Agency)
        };
        Self {
            token: token.into(),
            user: Some(user),
            scope,
        }
    }

    pub(crate) fn from_parts(
        token: String,
        user: Option<UserProfile>,
        scope: Option<AgencyScope>,
    ) -> Self {
        Self { token, user, scope }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn scope(&self) -> Option<&AgencyScope> {
        self.scope.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }

    pub fn is_super_admin(&self) -> bool {
        self.user.as_ref().is_some_and(UserProfile::is_super_admin)
    }

    pub fn is_general_view(&self) -> bool {
        self.scope == Some(AgencyScope::General)
    }

    /// Replace the token, keeping user and scope.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    /// Switch the agency scope, enforcing role rules: super admins may pick
    /// any agency or the general view; other roles only their own agency.
    pub fn select_scope(&mut self, scope: AgencyScope) -> PairingResult<()> {
        if !self.is_super_admin() {
            let own = self.user.as_ref().and_then(|u| u.agency_id.as_deref());
            let allowed = match &scope {
                AgencyScope::General => false,
                AgencyScope::Agency(id) => own == Some(id.as_str()),
            };
            if !allowed {
                return Err(PairingError::Session(format!(
                    "only super admins can switch to {}",
                    scope
                )));
            }
        }
        self.scope = Some(scope);
        Ok(())
    }

    /// Operator override from config/env. Bypasses role checks; the backend
    /// still authorizes every request.
    pub fn pin_agency(&mut self, agency_id: impl Into<String>) {
        self.scope = Some(AgencyScope::Agency(agency_id.into()));
    }

    /// Agency id sent with API requests, when a concrete agency is selected.
    pub fn agency_header(&self) -> Option<&str> {
        match &self.scope {
            Some(AgencyScope::Agency(id)) => Some(id.as_str()),
            _ => None,
        }
    }

    /// Pairing always targets one tenant; the general view has none.
    pub fn require_agency(&self) -> PairingResult<()> {
        if self.is_general_view() {
            return Err(PairingError::Session(
                "select an agency first (general view has no WhatsApp instance)".into(),
            ));
        }
        Ok(())
    }
}
