use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::password::PasswordHash;
use crate::marketplace::agents::AgentId;
use crate::marketplace::store::{document_id, Document};

document_id!(
    /// Identifier of a user account.
    UserId,
    "usr"
);

/// Authorisation role carried by every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Agent,
    Company,
    Client,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Agent => "agent",
            Role::Company => "company",
            Role::Client => "client",
        }
    }
}

/// Stored account document (collection `usuarios`).
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password_hash: PasswordHash,
    pub active: bool,
    pub agent_id: Option<AgentId>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Document for UserAccount {
    const COLLECTION: &'static str = "usuarios";

    fn key(&self) -> &str {
        self.id.as_str()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl UserAccount {
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            active: self.active,
            agent_id: self.agent_id.clone(),
            created_at: self.created_at,
        }
    }
}

/// Account representation safe to return from the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    pub created_at: DateTime<Utc>,
}

/// Self-service sign-up payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountRegistration {
    #[serde(default, alias = "correo")]
    pub email: String,
    #[serde(default, alias = "nombre")]
    pub display_name: String,
    #[serde(default)]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Issued bearer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: String,
    pub user_id: UserId,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated caller of a marketplace operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub agent_id: Option<AgentId>,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_agent(&self, agent: &AgentId) -> bool {
        self.role == Role::Agent && self.agent_id.as_ref() == Some(agent)
    }

    pub(crate) fn require_admin(&self) -> Result<(), AuthError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AuthError::Forbidden("administrator role required".to_string()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("session missing or expired")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("account {0} is disabled")]
    Disabled(String),
}
