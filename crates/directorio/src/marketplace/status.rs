//! Status state machines for listings and reviewed catalog items.
//!
//! Historical documents stored statuses as free text ("Activa", "activo", "En Revisión", ...).
//! Parsing is therefore lenient: case, accents and separators are ignored, and known synonyms
//! collapse onto a single variant. Serialization always emits the canonical label.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::accounts::UserId;

/// Lowercase, strip accents and fold separators so legacy spellings compare equal.
pub(crate) fn normalize_label(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            'á' | 'Á' | 'à' | 'À' => 'a',
            'é' | 'É' | 'è' | 'È' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' | 'ò' | 'Ò' => 'o',
            'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

/// Illegal move through a status graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} a record that is {from}")]
pub struct TransitionError {
    pub from: &'static str,
    pub action: &'static str,
}

macro_rules! label_serde {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

pub(crate) use label_serde;

/// Lifecycle of a company listing, from the public application form to the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingStatus {
    Submitted,
    Validated,
    UnderReview,
    Active,
    Rejected,
    Inactive,
}

impl ListingStatus {
    pub const ALL: [ListingStatus; 6] = [
        ListingStatus::Submitted,
        ListingStatus::Validated,
        ListingStatus::UnderReview,
        ListingStatus::Active,
        ListingStatus::Rejected,
        ListingStatus::Inactive,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ListingStatus::Submitted => "ingresada",
            ListingStatus::Validated => "validada",
            ListingStatus::UnderReview => "en_revision",
            ListingStatus::Active => "activa",
            ListingStatus::Rejected => "rechazada",
            ListingStatus::Inactive => "inactiva",
        }
    }

    /// Visible in the public directory.
    pub const fn is_public(self) -> bool {
        matches!(self, ListingStatus::Active)
    }

    /// Still moving through intake.
    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            ListingStatus::Submitted | ListingStatus::Validated | ListingStatus::UnderReview
        )
    }

    pub fn apply(self, action: ListingAction) -> Result<ListingStatus, TransitionError> {
        use ListingAction as A;
        use ListingStatus as S;

        let next = match (self, action) {
            (S::Submitted, A::Validate) => S::Validated,
            (S::Validated, A::SendToReview) => S::UnderReview,
            (S::UnderReview, A::Approve) => S::Active,
            (S::Submitted | S::Validated | S::UnderReview, A::Reject) => S::Rejected,
            (S::Rejected, A::Resubmit) => S::Submitted,
            (S::Active, A::Deactivate) => S::Inactive,
            (S::Inactive, A::Reactivate) => S::Active,
            _ => {
                return Err(TransitionError {
                    from: self.label(),
                    action: action.label(),
                })
            }
        };
        Ok(next)
    }
}

impl FromStr for ListingStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let status = match normalize_label(raw).as_str() {
            "ingresada" | "ingresado" | "enviado" | "enviada" | "pendiente" | "submitted" => {
                ListingStatus::Submitted
            }
            "validada" | "validado" | "validated" => ListingStatus::Validated,
            "en_revision" | "revision" | "under_review" => ListingStatus::UnderReview,
            "activa" | "activo" | "aprobada" | "aprobado" | "active" => ListingStatus::Active,
            "rechazada" | "rechazado" | "rejected" => ListingStatus::Rejected,
            "inactiva" | "inactivo" | "suspendida" | "inactive" => ListingStatus::Inactive,
            _ => return Err(UnknownStatus(raw.to_string())),
        };
        Ok(status)
    }
}

label_serde!(ListingStatus);

/// Panel actions that move a listing through [`ListingStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingAction {
    Validate,
    SendToReview,
    Approve,
    Reject,
    Resubmit,
    Deactivate,
    Reactivate,
}

impl ListingAction {
    pub const fn label(self) -> &'static str {
        match self {
            ListingAction::Validate => "validate",
            ListingAction::SendToReview => "send_to_review",
            ListingAction::Approve => "approve",
            ListingAction::Reject => "reject",
            ListingAction::Resubmit => "resubmit",
            ListingAction::Deactivate => "deactivate",
            ListingAction::Reactivate => "reactivate",
        }
    }

    pub const fn requires_note(self) -> bool {
        matches!(self, ListingAction::Reject)
    }
}

/// Moderation state of products and campaigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pendiente",
            ReviewStatus::Approved => "aprobado",
            ReviewStatus::Rejected => "rechazado",
        }
    }

    pub fn apply(self, action: ReviewAction) -> Result<ReviewStatus, TransitionError> {
        match (self, action) {
            (ReviewStatus::Pending, ReviewAction::Approve) => Ok(ReviewStatus::Approved),
            (ReviewStatus::Pending, ReviewAction::Reject) => Ok(ReviewStatus::Rejected),
            (ReviewStatus::Rejected, ReviewAction::Resubmit) => Ok(ReviewStatus::Pending),
            _ => Err(TransitionError {
                from: self.label(),
                action: action.label(),
            }),
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let status = match normalize_label(raw).as_str() {
            "pendiente" | "enviado" | "ingresado" | "ingresada" | "pending" => {
                ReviewStatus::Pending
            }
            "aprobado" | "aprobada" | "activo" | "activa" | "approved" => ReviewStatus::Approved,
            "rechazado" | "rechazada" | "rejected" => ReviewStatus::Rejected,
            _ => return Err(UnknownStatus(raw.to_string())),
        };
        Ok(status)
    }
}

label_serde!(ReviewStatus);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
    Resubmit,
}

impl ReviewAction {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
            ReviewAction::Resubmit => "resubmit",
        }
    }
}

/// One entry in a document's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange<S> {
    pub from: S,
    pub to: S,
    pub actor: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// Trim a free-text note, dropping it entirely when blank.
pub(crate) fn clean_note(note: Option<String>) -> Option<String> {
    note.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
