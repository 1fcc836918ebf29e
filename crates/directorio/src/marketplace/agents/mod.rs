//! Field agents: registration with a paired login, company assignment and workload.

pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::accounts::UserId;
use super::companies::CompanyId;
use super::store::{document_id, Document};

pub use service::AgentService;

document_id!(
    /// Identifier of a field agent.
    AgentId,
    "agt"
);

/// A field agent (collection `agentes`). Always paired with an `agent` account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agent {
    pub id: AgentId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub zone: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Document for Agent {
    const COLLECTION: &'static str = "agentes";

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

#[derive(Debug, Clone, Deserialize)]
pub struct AgentRegistration {
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "correo")]
    pub email: String,
    #[serde(default, alias = "telefono")]
    pub phone: String,
    #[serde(default, alias = "zona")]
    pub zone: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentRequest {
    #[serde(alias = "empresas")]
    pub company_ids: Vec<CompanyId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentStatusUpdate {
    pub active: bool,
}

/// Outcome of a bulk assignment batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentSummary {
    pub agent_id: AgentId,
    pub assigned: Vec<CompanyId>,
    pub reassigned_from: Vec<Reassignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reassignment {
    pub company_id: CompanyId,
    pub previous_agent: AgentId,
}

/// Workload card shown in the agent management panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSummary {
    pub agent: Agent,
    pub assigned: usize,
    pub pending: usize,
    pub active: usize,
    pub validated_by_agent: usize,
}
