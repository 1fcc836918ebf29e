use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::marketplace::accounts::UserId;
use crate::marketplace::companies::{CompanyId, CompanySummary};
use crate::marketplace::status::{ReviewAction, ReviewStatus, StatusChange};
use crate::marketplace::store::{document_id, Document};

document_id!(ProductId, "prd");
document_id!(CampaignId, "cmp");

/// Catalog entry published by a company (collection `productos`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub company_id: CompanyId,
    pub owner_id: UserId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price_cents: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub status: ReviewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_note: Option<String>,
    pub history: Vec<StatusChange<ReviewStatus>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// Time-boxed promotion run by a company (collection `campanas`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub company_id: CompanyId,
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<u8>,
    pub status: ReviewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_note: Option<String>,
    pub history: Vec<StatusChange<ReviewStatus>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Campaign {
    pub fn is_running(&self, on: NaiveDate) -> bool {
        self.starts_on <= on && on <= self.ends_on
    }
}

/// Moderated catalog items share one review workflow.
pub trait Reviewable: Document {
    fn status(&self) -> ReviewStatus;
    fn company_id(&self) -> &CompanyId;
    fn owner_id(&self) -> &UserId;
    fn title(&self) -> &str;
    fn record_review(&mut self, change: StatusChange<ReviewStatus>);
}

macro_rules! reviewable {
    ($ty:ty, $collection:literal, $title:ident) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;

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

        impl Reviewable for $ty {
            fn status(&self) -> ReviewStatus {
                self.status
            }

            fn company_id(&self) -> &CompanyId {
                &self.company_id
            }

            fn owner_id(&self) -> &UserId {
                &self.owner_id
            }

            fn title(&self) -> &str {
                &self.$title
            }

            fn record_review(&mut self, change: StatusChange<ReviewStatus>) {
                self.status = change.to;
                self.review_note = change.note.clone();
                self.updated_at = change.at;
                self.history.push(change);
            }
        }
    };
}

reviewable!(Product, "productos", name);
reviewable!(Campaign, "campanas", title);

#[derive(Debug, Clone, Deserialize)]
pub struct ProductSubmission {
    #[serde(alias = "empresa_id", alias = "empresaId")]
    pub company_id: CompanyId,
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "descripcion")]
    pub description: String,
    #[serde(default, alias = "categoria")]
    pub category: String,
    #[serde(default, alias = "precio")]
    pub price_cents: i64,
    #[serde(default, alias = "imagen")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignSubmission {
    #[serde(alias = "empresa_id", alias = "empresaId")]
    pub company_id: CompanyId,
    #[serde(default, alias = "titulo")]
    pub title: String,
    #[serde(default, alias = "descripcion")]
    pub description: String,
    #[serde(default, alias = "fecha_inicio")]
    pub starts_on: Option<NaiveDate>,
    #[serde(default, alias = "fecha_fin")]
    pub ends_on: Option<NaiveDate>,
    #[serde(default, alias = "descuento")]
    pub discount_percent: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub decision: ReviewAction,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(default, alias = "estado")]
    pub status: Option<ReviewStatus>,
    #[serde(default, alias = "categoria")]
    pub category: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignFilter {
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(default, alias = "estado")]
    pub status: Option<ReviewStatus>,
    #[serde(default)]
    pub running_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub company: CompanySummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignDetail {
    pub campaign: Campaign,
    pub company: CompanySummary,
}
