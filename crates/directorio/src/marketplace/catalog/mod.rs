//! Product and campaign listings with moderation.

pub mod domain;
pub mod service;

pub use domain::{
    Campaign, CampaignDetail, CampaignFilter, CampaignId, CampaignSubmission, Product,
    ProductDetail, ProductFilter, ProductId, ProductSubmission, ReviewRequest, Reviewable,
};
pub use service::CatalogService;
