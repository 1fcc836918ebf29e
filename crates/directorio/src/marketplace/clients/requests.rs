use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::vehicles::VehicleId;
use crate::marketplace::accounts::UserId;
use crate::marketplace::companies::CompanyId;
use crate::marketplace::status::{
    label_serde, normalize_label, StatusChange, TransitionError, UnknownStatus,
};
use crate::marketplace::store::{document_id, Document};

document_id!(ClientRequestId, "sol");

/// Progress of a client's contact request to a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientRequestStatus {
    Open,
    InProgress,
    Closed,
    Cancelled,
}

impl ClientRequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ClientRequestStatus::Open => "abierta",
            ClientRequestStatus::InProgress => "en_proceso",
            ClientRequestStatus::Closed => "cerrada",
            ClientRequestStatus::Cancelled => "cancelada",
        }
    }

    /// Move to `target`, if the graph allows it.
    pub fn advance(self, target: ClientRequestStatus) -> Result<Self, TransitionError> {
        use ClientRequestStatus as S;
        match (self, target) {
            (S::Open, S::InProgress) | (S::InProgress, S::Closed) | (S::Open, S::Cancelled) => {
                Ok(target)
            }
            _ => Err(TransitionError {
                from: self.label(),
                action: target.verb(),
            }),
        }
    }

    const fn verb(self) -> &'static str {
        match self {
            ClientRequestStatus::Open => "reopen",
            ClientRequestStatus::InProgress => "start",
            ClientRequestStatus::Closed => "close",
            ClientRequestStatus::Cancelled => "cancel",
        }
    }
}

impl FromStr for ClientRequestStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let status = match normalize_label(raw).as_str() {
            "abierta" | "pendiente" | "nueva" | "open" => ClientRequestStatus::Open,
            "en_proceso" | "atendiendo" | "in_progress" => ClientRequestStatus::InProgress,
            "cerrada" | "atendida" | "closed" => ClientRequestStatus::Closed,
            "cancelada" | "cancelled" => ClientRequestStatus::Cancelled,
            _ => return Err(UnknownStatus(raw.to_string())),
        };
        Ok(status)
    }
}

label_serde!(ClientRequestStatus);

/// A client's message to a company (collection `solicitudes_cliente`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRequest {
    pub id: ClientRequestId,
    pub company_id: CompanyId,
    pub client_id: UserId,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<VehicleId>,
    pub status: ClientRequestStatus,
    pub history: Vec<StatusChange<ClientRequestStatus>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Document for ClientRequest {
    const COLLECTION: &'static str = "solicitudes_cliente";

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
pub struct ClientRequestSubmission {
    #[serde(alias = "empresa_id", alias = "empresaId")]
    pub company_id: CompanyId,
    #[serde(default, alias = "mensaje")]
    pub message: String,
    #[serde(default, alias = "vehiculo_id")]
    pub vehicle_id: Option<VehicleId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestStatusUpdate {
    pub status: ClientRequestStatus,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_requests_start_before_closing() {
        use ClientRequestStatus as S;
        assert_eq!(S::Open.advance(S::InProgress), Ok(S::InProgress));
        assert_eq!(S::InProgress.advance(S::Closed), Ok(S::Closed));
        assert_eq!(S::Open.advance(S::Cancelled), Ok(S::Cancelled));
        assert!(S::InProgress.advance(S::Cancelled).is_err());
        assert!(S::Closed.advance(S::Open).is_err());
        assert_eq!(
            S::Open.advance(S::Closed),
            Err(TransitionError {
                from: "abierta",
                action: "close",
            })
        );
    }
}
