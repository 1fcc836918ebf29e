use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use super::domain::{
    Company, CompanyFilter, CompanyId, CompanyProfile, CompanyStats, CompanySubmission,
    FlagUpdate, ImportIssue, ImportSummary, LegacyCompanyRecord, TransitionRequest,
};
use super::export;
use crate::marketplace::accounts::{Actor, Role};
use crate::marketplace::agents::{Agent, AgentId};
use crate::marketplace::catalog::{Campaign, Product};
use crate::marketplace::clock::Clock;
use crate::marketplace::error::DirectoryError;
use crate::marketplace::media::{ImageUpload, MediaLibrary};
use crate::marketplace::notifications::{NoticeTopic, NotificationService};
use crate::marketplace::status::{
    clean_note, ListingAction, ListingStatus, ReviewStatus, StatusChange,
};
use crate::marketplace::store::{Collection, RepositoryError};
use crate::marketplace::validation::{
    fold, is_valid_email, is_valid_website, normalize_email, normalize_phone, optional_text,
    ValidationError,
};

/// Company applications, the validation panel and the public directory.
pub struct CompanyService {
    companies: Arc<dyn Collection<Company>>,
    products: Arc<dyn Collection<Product>>,
    campaigns: Arc<dyn Collection<Campaign>>,
    agents: Arc<dyn Collection<Agent>>,
    notifications: Arc<NotificationService>,
    media: Arc<MediaLibrary>,
    clock: Arc<dyn Clock>,
}

impl CompanyService {
    pub fn new(
        companies: Arc<dyn Collection<Company>>,
        products: Arc<dyn Collection<Product>>,
        campaigns: Arc<dyn Collection<Campaign>>,
        agents: Arc<dyn Collection<Agent>>,
        notifications: Arc<NotificationService>,
        media: Arc<MediaLibrary>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            companies,
            products,
            campaigns,
            agents,
            notifications,
            media,
            clock,
        }
    }

    /// File a new listing. It starts as `ingresada`; agents filing on behalf of a business
    /// are assigned to it straight away.
    pub fn submit(
        &self,
        actor: &Actor,
        submission: CompanySubmission,
    ) -> Result<Company, DirectoryError> {
        if actor.role == Role::Client {
            return Err(DirectoryError::forbidden(
                "client accounts cannot register companies",
            ));
        }

        let mut errors = ValidationError::default();
        let name = errors.required("name", &submission.name);
        let category = errors.required("category", &submission.category);
        let city = errors.required("city", &submission.city);

        let contact_email = normalize_email(&submission.contact_email);
        if contact_email.is_empty() {
            errors.push("contact_email", "is required");
        } else if !is_valid_email(&contact_email) {
            errors.push("contact_email", "is not a valid address");
        }

        let phone = if submission.phone.trim().is_empty() {
            errors.push("phone", "is required");
            String::new()
        } else {
            normalize_phone(&submission.phone).unwrap_or_else(|| {
                errors.push("phone", "must contain 7 to 15 digits");
                String::new()
            })
        };

        let website = optional_text(submission.website);
        if let Some(url) = &website {
            if !is_valid_website(url) {
                errors.push("website", "must start with http:// or https://");
            }
        }
        errors.into_result()?;

        let (folded_name, folded_city) = (fold(&name), fold(&city));
        let duplicate_message = format!("a company named '{name}' is already registered in {city}");

        let now = self.clock.now();
        let logo_url = optional_text(submission.logo_url);
        let company = Company {
            id: CompanyId::generate(),
            name,
            category,
            description: submission.description.trim().to_string(),
            contact_email,
            phone,
            address: submission.address.trim().to_string(),
            city,
            website,
            logo_assigned: logo_url.is_some(),
            logo_url,
            status: ListingStatus::Submitted,
            web_validated: false,
            owner_id: actor.user_id.clone(),
            assigned_agent: match actor.role {
                Role::Agent => actor.agent_id.clone(),
                _ => None,
            },
            history: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let stored = self
            .companies
            .insert_unique(company, &|existing| {
                existing.status != ListingStatus::Rejected
                    && fold(&existing.name) == folded_name
                    && fold(&existing.city) == folded_city
            })
            .map_err(|err| DirectoryError::duplicate_on_conflict(err, || duplicate_message))?;
        info!(company_id = %stored.id, actor = %actor.user_id, "company submitted");
        Ok(stored)
    }

    /// Apply a validation-panel action to a listing.
    pub fn transition(
        &self,
        actor: &Actor,
        id: &CompanyId,
        request: TransitionRequest,
    ) -> Result<Company, DirectoryError> {
        let mut company = self.companies.get(id.as_str())?;
        let expected = request.expected_version.unwrap_or(company.version);
        let action = request.action;

        authorize_transition(actor, &company, action)?;

        let note = clean_note(request.note);
        if action.requires_note() && note.is_none() {
            return Err(ValidationError::single("note", "is required when rejecting").into());
        }
        if action == ListingAction::Approve && company.website.is_some() && !company.web_validated
        {
            return Err(DirectoryError::InvalidState(
                "the website must be validated before approval".to_string(),
            ));
        }

        let from = company.status;
        let to = from.apply(action).inspect_err(|err| {
            warn!(company_id = %id, error = %err, "rejected status transition");
        })?;

        let now = self.clock.now();
        company.history.push(StatusChange {
            from,
            to,
            actor: actor.user_id.clone(),
            note: note.clone(),
            at: now,
        });
        company.status = to;
        company.updated_at = now;

        let stored = self.companies.update(company, expected)?;
        info!(company_id = %id, from = from.label(), to = to.label(), actor = %actor.user_id, "company status changed");

        match action {
            ListingAction::Approve => self.notifications.notify(
                &stored.owner_id,
                NoticeTopic::CompanyApproved,
                stored.id.as_str(),
                format!("{} ya está publicada en el directorio", stored.name),
            ),
            ListingAction::Reject => self.notifications.notify(
                &stored.owner_id,
                NoticeTopic::CompanyRejected,
                stored.id.as_str(),
                format!(
                    "{} fue rechazada: {}",
                    stored.name,
                    note.as_deref().unwrap_or_default()
                ),
            ),
            _ => {}
        }

        Ok(stored)
    }

    /// Toggle the `web_validated` / `logo_assigned` flags.
    pub fn set_flags(
        &self,
        actor: &Actor,
        id: &CompanyId,
        update: FlagUpdate,
    ) -> Result<Company, DirectoryError> {
        let mut company = self.companies.get(id.as_str())?;
        if !(actor.is_admin() || is_assigned(actor, &company)) {
            return Err(DirectoryError::forbidden(
                "only administrators or the assigned agent can update flags",
            ));
        }
        let expected = update.expected_version.unwrap_or(company.version);

        let mut errors = ValidationError::default();
        if update.web_validated == Some(true) && company.website.is_none() {
            errors.push("web_validated", "requires a website");
        }
        if update.logo_assigned == Some(true) && company.logo_url.is_none() {
            errors.push("logo_assigned", "requires an uploaded logo");
        }
        errors.into_result()?;

        if let Some(flag) = update.web_validated {
            company.web_validated = flag;
        }
        if let Some(flag) = update.logo_assigned {
            company.logo_assigned = flag;
        }
        company.updated_at = self.clock.now();

        let stored = self.companies.update(company, expected)?;
        info!(
            company_id = %id,
            web_validated = stored.web_validated,
            logo_assigned = stored.logo_assigned,
            "company flags updated"
        );
        Ok(stored)
    }

    /// Store an uploaded logo and attach it to the company.
    pub fn upload_logo(
        &self,
        actor: &Actor,
        id: &CompanyId,
        upload: ImageUpload,
    ) -> Result<Company, DirectoryError> {
        let mut company = self.companies.get(id.as_str())?;
        if !(can_manage(actor, &company) || is_assigned(actor, &company)) {
            return Err(DirectoryError::forbidden("cannot change this company's logo"));
        }

        let url = self.media.store_image(&format!("logos/{id}"), upload)?;
        let previous = company.logo_url.replace(url.clone());
        company.logo_assigned = true;
        company.updated_at = self.clock.now();

        let version = company.version;
        let stored = match self.companies.update(company, version) {
            Ok(stored) => stored,
            Err(err) => {
                if let Err(cleanup) = self.media.discard(&url) {
                    warn!(company_id = %id, error = %cleanup, "unattached logo left in media");
                }
                return Err(err.into());
            }
        };

        if let Some(old) = previous {
            if let Err(err) = self.media.discard(&old) {
                warn!(company_id = %id, error = %err, "previous logo not removed");
            }
        }
        info!(company_id = %id, "logo assigned");
        Ok(stored)
    }

    /// Listings visible to `viewer`, newest first.
    pub fn list(
        &self,
        viewer: Option<&Actor>,
        filter: &CompanyFilter,
    ) -> Result<Vec<Company>, DirectoryError> {
        let category = filter.category.as_deref().map(fold);
        let city = filter.city.as_deref().map(fold);
        let query = filter
            .q
            .as_deref()
            .map(fold)
            .filter(|query| !query.is_empty());

        let mut companies: Vec<Company> = self
            .companies
            .scan()?
            .into_iter()
            .filter(|company| can_view(viewer, company))
            .filter(|company| filter.status.map_or(true, |status| company.status == status))
            .filter(|company| {
                category
                    .as_ref()
                    .map_or(true, |category| &fold(&company.category) == category)
            })
            .filter(|company| city.as_ref().map_or(true, |city| &fold(&company.city) == city))
            .filter(|company| {
                filter
                    .agent_id
                    .as_ref()
                    .map_or(true, |agent| company.assigned_agent.as_ref() == Some(agent))
            })
            .filter(|company| {
                query.as_ref().map_or(true, |query| {
                    fold(&company.name).contains(query.as_str())
                        || fold(&company.description).contains(query.as_str())
                })
            })
            .collect();

        companies.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(companies)
    }

    pub fn stats(&self, actor: &Actor) -> Result<CompanyStats, DirectoryError> {
        actor.require_admin()?;
        let mut stats = CompanyStats::default();
        for company in self.companies.scan()? {
            stats.record(&company);
        }
        Ok(stats)
    }

    /// Public profile: hidden listings answer as not found to anyone without access.
    pub fn profile(
        &self,
        viewer: Option<&Actor>,
        id: &CompanyId,
    ) -> Result<CompanyProfile, DirectoryError> {
        let company = self
            .companies
            .fetch(id.as_str())?
            .filter(|company| can_view(viewer, company))
            .ok_or_else(|| RepositoryError::not_found::<Company>(id.as_str()))?;

        let today = self.clock.today();
        let mut products: Vec<Product> = self
            .products
            .scan()?
            .into_iter()
            .filter(|product| &product.company_id == id && product.status == ReviewStatus::Approved)
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut campaigns: Vec<Campaign> = self
            .campaigns
            .scan()?
            .into_iter()
            .filter(|campaign| {
                &campaign.company_id == id
                    && campaign.status == ReviewStatus::Approved
                    && campaign.is_running(today)
            })
            .collect();
        campaigns.sort_by(|a, b| a.ends_on.cmp(&b.ends_on));

        Ok(CompanyProfile {
            company,
            products,
            campaigns,
        })
    }

    /// Remove a listing along with its products and campaigns.
    pub fn delete(&self, actor: &Actor, id: &CompanyId) -> Result<(), DirectoryError> {
        actor.require_admin()?;
        let company = self.companies.delete(id.as_str())?;

        let mut removed_products = 0usize;
        for product in self.products.scan()? {
            if &product.company_id == id {
                self.products.delete(product.id.as_str())?;
                removed_products += 1;
            }
        }
        let mut removed_campaigns = 0usize;
        for campaign in self.campaigns.scan()? {
            if &campaign.company_id == id {
                self.campaigns.delete(campaign.id.as_str())?;
                removed_campaigns += 1;
            }
        }

        if let Some(logo) = &company.logo_url {
            if let Err(err) = self.media.discard(logo) {
                warn!(company_id = %id, error = %err, "logo not removed");
            }
        }

        info!(
            company_id = %id,
            removed_products,
            removed_campaigns,
            actor = %actor.user_id,
            "company deleted"
        );
        Ok(())
    }

    pub fn export_csv(&self, actor: &Actor, filter: &CompanyFilter) -> Result<String, DirectoryError> {
        actor.require_admin()?;
        let companies = self.list(Some(actor), filter)?;
        export::companies_csv(&companies)
    }

    /// Load historical documents, tolerating the field-name and status spelling drift of old
    /// exports. Records that cannot be interpreted are reported and skipped.
    pub fn import_legacy(
        &self,
        actor: &Actor,
        records: Vec<LegacyCompanyRecord>,
    ) -> Result<ImportSummary, DirectoryError> {
        actor.require_admin()?;
        let mut summary = ImportSummary::default();

        for (index, record) in records.into_iter().enumerate() {
            match self.import_one(actor, record) {
                Ok(company) => summary.imported.push(company.id),
                Err(reason) => summary.skipped.push(ImportIssue { index, reason }),
            }
        }

        info!(
            imported = summary.imported.len(),
            skipped = summary.skipped.len(),
            "legacy companies imported"
        );
        Ok(summary)
    }

    fn import_one(&self, actor: &Actor, record: LegacyCompanyRecord) -> Result<Company, String> {
        let name = record.name.trim().to_string();
        if name.is_empty() {
            return Err("name is required".to_string());
        }

        let status = match record.status.as_deref().map(str::trim) {
            None | Some("") => ListingStatus::Submitted,
            Some(raw) => raw.parse::<ListingStatus>().map_err(|err| err.to_string())?,
        };

        let assigned_agent = match optional_text(record.agent_id) {
            Some(raw) => {
                let agent = AgentId(raw);
                match self.agents.fetch(agent.as_str()) {
                    Ok(Some(_)) => Some(agent),
                    Ok(None) => return Err(format!("unknown agent {agent}")),
                    Err(err) => return Err(err.to_string()),
                }
            }
            None => None,
        };

        let now = self.clock.now();
        let created_at = record
            .created_at
            .as_deref()
            .and_then(parse_legacy_timestamp)
            .unwrap_or(now);
        let website = optional_text(record.website);
        let logo_url = optional_text(record.logo_url);

        let company = Company {
            id: optional_text(record.id)
                .map(CompanyId)
                .unwrap_or_else(CompanyId::generate),
            name,
            category: record.category.trim().to_string(),
            description: record.description.trim().to_string(),
            contact_email: normalize_email(&record.contact_email),
            phone: normalize_phone(&record.phone).unwrap_or_else(|| record.phone.trim().to_string()),
            address: record.address.trim().to_string(),
            city: record.city.trim().to_string(),
            web_validated: record.web_validated.unwrap_or(false) && website.is_some(),
            logo_assigned: record.logo_assigned.unwrap_or(logo_url.is_some()) && logo_url.is_some(),
            website,
            logo_url,
            status,
            owner_id: actor.user_id.clone(),
            assigned_agent,
            history: Vec::new(),
            created_at,
            updated_at: now,
            version: 0,
        };

        self.companies.insert(company).map_err(|err| err.to_string())
    }
}

fn is_assigned(actor: &Actor, company: &Company) -> bool {
    company
        .assigned_agent
        .as_ref()
        .is_some_and(|agent| actor.is_agent(agent))
}

fn can_manage(actor: &Actor, company: &Company) -> bool {
    actor.is_admin() || actor.user_id == company.owner_id
}

pub(crate) fn can_view(viewer: Option<&Actor>, company: &Company) -> bool {
    company.status.is_public()
        || viewer.is_some_and(|actor| can_manage(actor, company) || is_assigned(actor, company))
}

fn authorize_transition(
    actor: &Actor,
    company: &Company,
    action: ListingAction,
) -> Result<(), DirectoryError> {
    let assigned = is_assigned(actor, company);
    let allowed = match action {
        ListingAction::Validate | ListingAction::SendToReview => actor.is_admin() || assigned,
        ListingAction::Reject => {
            actor.is_admin()
                || (assigned
                    && matches!(
                        company.status,
                        ListingStatus::Submitted | ListingStatus::Validated
                    ))
        }
        ListingAction::Resubmit => can_manage(actor, company),
        ListingAction::Approve | ListingAction::Deactivate | ListingAction::Reactivate => {
            actor.is_admin()
        }
    };

    if allowed {
        Ok(())
    } else {
        Err(DirectoryError::forbidden(format!(
            "{} may not {} this company",
            actor.role.label(),
            action.label()
        )))
    }
}

fn parse_legacy_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}
