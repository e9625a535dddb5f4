//! Authenticated caller state, passed explicitly to whatever needs it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::data::row::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn from_is_admin(is_admin: bool) -> Self {
        if is_admin {
            Role::Admin
        } else {
            Role::User
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{}', expected admin or user", other)),
        }
    }
}

/// Identity of the current caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub id: String,
    pub role: Role,
}

impl ActorContext {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A logged-in session
#[derive(Debug, Clone)]
pub struct Session {
    pub actor: ActorContext,
    pub email: String,
    pub token: String,
}

impl Session {
    /// Build a session from a login reply. The actor id comes from the
    /// token's `user_id` claim; the signature is not checked here.
    pub fn from_login(email: &str, token: String, is_admin: bool) -> Self {
        let id = token_claim(&token, "user_id").unwrap_or_default();
        Self {
            actor: ActorContext::new(id, Role::from_is_admin(is_admin)),
            email: email.to_string(),
            token,
        }
    }

    pub fn role(&self) -> Role {
        self.actor.role
    }
}

/// Read one claim from a JWT payload without verifying it
pub fn token_claim(token: &str, claim: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let json: Value = serde_json::from_slice(&bytes).ok()?;
    match json.get(claim)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Management actions offered on a user row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowActions {
    pub activate: bool,
    pub deactivate: bool,
    pub delete: bool,
}

impl RowActions {
    pub fn all() -> Self {
        Self {
            activate: true,
            deactivate: true,
            delete: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn any(&self) -> bool {
        self.activate || self.deactivate || self.delete
    }

    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.activate {
            labels.push("activate");
        }
        if self.deactivate {
            labels.push("deactivate");
        }
        if self.delete {
            labels.push("delete");
        }
        labels
    }
}

/// Which actions the actor may take on a user row.
///
/// Admins manage everyone except themselves and other admins; other
/// callers get nothing.
pub fn row_actions(row: &Row, actor: &ActorContext) -> RowActions {
    if !actor.is_admin() {
        return RowActions::none();
    }
    let own_row = !actor.id.is_empty() && row.id() == actor.id;
    let admin_row = row.text("role").eq_ignore_ascii_case("admin");
    if own_row || admin_row {
        RowActions::none()
    } else {
        RowActions::all()
    }
}
