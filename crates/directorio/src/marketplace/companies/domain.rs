use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::marketplace::accounts::UserId;
use crate::marketplace::agents::AgentId;
use crate::marketplace::catalog::{Campaign, Product};
use crate::marketplace::status::{ListingAction, ListingStatus, StatusChange};
use crate::marketplace::store::{document_id, Document};

document_id!(
    /// Identifier of a company listing.
    CompanyId,
    "emp"
);

/// A business listed in the directory (collection `empresas`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub contact_email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub status: ListingStatus,
    pub web_validated: bool,
    pub logo_assigned: bool,
    pub owner_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<AgentId>,
    pub history: Vec<StatusChange<ListingStatus>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Document for Company {
    const COLLECTION: &'static str = "empresas";

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

impl Company {
    pub fn summary(&self) -> CompanySummary {
        CompanySummary {
            id: self.id.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            city: self.city.clone(),
            logo_url: self.logo_url.clone(),
            status: self.status,
        }
    }
}

/// Compact company card embedded in product, campaign and request views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanySummary {
    pub id: CompanyId,
    pub name: String,
    pub category: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub status: ListingStatus,
}

/// Application form for a new listing. Accepts the Spanish and legacy field names used by
/// older clients.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanySubmission {
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "categoria", alias = "rubro")]
    pub category: String,
    #[serde(default, alias = "descripcion")]
    pub description: String,
    #[serde(default, alias = "email", alias = "correo")]
    pub contact_email: String,
    #[serde(default, alias = "telefono")]
    pub phone: String,
    #[serde(default, alias = "direccion")]
    pub address: String,
    #[serde(default, alias = "ciudad", alias = "comuna")]
    pub city: String,
    #[serde(default, alias = "web", alias = "sitio_web")]
    pub website: Option<String>,
    #[serde(default, alias = "logo")]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub action: ListingAction,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Validation-panel checkboxes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlagUpdate {
    #[serde(default, alias = "webValidada")]
    pub web_validated: Option<bool>,
    #[serde(default, alias = "logoAsignado")]
    pub logo_assigned: Option<bool>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Listing query. Every criterion is optional and they combine with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyFilter {
    #[serde(default, alias = "estado")]
    pub status: Option<ListingStatus>,
    #[serde(default, alias = "categoria")]
    pub category: Option<String>,
    #[serde(default, alias = "ciudad")]
    pub city: Option<String>,
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    #[serde(default)]
    pub q: Option<String>,
}

/// Counters shown on the administration dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompanyStats {
    pub total: usize,
    pub submitted: usize,
    pub validated: usize,
    pub under_review: usize,
    pub active: usize,
    pub rejected: usize,
    pub inactive: usize,
    pub web_validated: usize,
    pub logo_assigned: usize,
    pub unassigned: usize,
}

impl CompanyStats {
    pub(crate) fn record(&mut self, company: &Company) {
        self.total += 1;
        match company.status {
            ListingStatus::Submitted => self.submitted += 1,
            ListingStatus::Validated => self.validated += 1,
            ListingStatus::UnderReview => self.under_review += 1,
            ListingStatus::Active => self.active += 1,
            ListingStatus::Rejected => self.rejected += 1,
            ListingStatus::Inactive => self.inactive += 1,
        }
        if company.web_validated {
            self.web_validated += 1;
        }
        if company.logo_assigned {
            self.logo_assigned += 1;
        }
        if company.assigned_agent.is_none() {
            self.unassigned += 1;
        }
    }
}

/// Public profile page: the company plus its approved catalog.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyProfile {
    pub company: Company,
    pub products: Vec<Product>,
    pub campaigns: Vec<Campaign>,
}

/// Historical document shape, with every field name variant seen in old exports.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyCompanyRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "categoria", alias = "rubro")]
    pub category: String,
    #[serde(default, alias = "descripcion")]
    pub description: String,
    #[serde(default, alias = "email", alias = "correo")]
    pub contact_email: String,
    #[serde(default, alias = "telefono")]
    pub phone: String,
    #[serde(default, alias = "direccion")]
    pub address: String,
    #[serde(default, alias = "ciudad", alias = "comuna")]
    pub city: String,
    #[serde(default, alias = "web", alias = "sitio_web")]
    pub website: Option<String>,
    #[serde(default, alias = "logo")]
    pub logo_url: Option<String>,
    #[serde(default, alias = "estado")]
    pub status: Option<String>,
    #[serde(default, alias = "webValidada")]
    pub web_validated: Option<bool>,
    #[serde(default, alias = "logoAsignado")]
    pub logo_assigned: Option<bool>,
    #[serde(
        default,
        alias = "fechaCreacion",
        alias = "fecha_creacion",
        alias = "creado",
        alias = "creada"
    )]
    pub created_at: Option<String>,
    #[serde(default, alias = "agenteId", alias = "agente_id")]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportIssue {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: Vec<CompanyId>,
    pub skipped: Vec<ImportIssue>,
}
