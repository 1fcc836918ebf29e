//! Company listings: application form, validation panel, directory and profile pages.

pub mod domain;
mod export;
pub mod service;

pub use domain::{
    Company, CompanyFilter, CompanyId, CompanyProfile, CompanyStats, CompanySubmission,
    CompanySummary, FlagUpdate, ImportIssue, ImportSummary, LegacyCompanyRecord,
    TransitionRequest,
};
pub use service::CompanyService;
