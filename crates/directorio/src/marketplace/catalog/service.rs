use std::sync::Arc;

use tracing::info;

use super::domain::{
    Campaign, CampaignDetail, CampaignFilter, CampaignId, CampaignSubmission, Product,
    ProductDetail, ProductFilter, ProductId, ProductSubmission, ReviewRequest, Reviewable,
};
use crate::marketplace::accounts::Actor;
use crate::marketplace::clock::Clock;
use crate::marketplace::companies::{Company, CompanyId};
use crate::marketplace::error::DirectoryError;
use crate::marketplace::notifications::{NoticeTopic, NotificationService};
use crate::marketplace::status::{clean_note, ReviewAction, ReviewStatus, StatusChange};
use crate::marketplace::store::{Collection, RepositoryError};
use crate::marketplace::validation::{fold, optional_text, ValidationError};

const MAX_DISCOUNT_PERCENT: u8 = 90;

/// Products and campaigns, from the company's submission through moderation.
pub struct CatalogService {
    products: Arc<dyn Collection<Product>>,
    campaigns: Arc<dyn Collection<Campaign>>,
    companies: Arc<dyn Collection<Company>>,
    notifications: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(
        products: Arc<dyn Collection<Product>>,
        campaigns: Arc<dyn Collection<Campaign>>,
        companies: Arc<dyn Collection<Company>>,
        notifications: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            products,
            campaigns,
            companies,
            notifications,
            clock,
        }
    }

    pub fn submit_product(
        &self,
        actor: &Actor,
        submission: ProductSubmission,
    ) -> Result<Product, DirectoryError> {
        let mut errors = ValidationError::default();
        let name = errors.required("name", &submission.name);
        let category = errors.required("category", &submission.category);
        if submission.price_cents <= 0 {
            errors.push("price_cents", "must be greater than zero");
        }
        errors.into_result()?;

        let company = self.publishing_company(actor, &submission.company_id)?;
        let now = self.clock.now();
        let product = Product {
            id: ProductId::generate(),
            company_id: company.id,
            owner_id: company.owner_id,
            name,
            description: submission.description.trim().to_string(),
            category,
            price_cents: submission.price_cents.unsigned_abs(),
            image_url: optional_text(submission.image_url),
            status: ReviewStatus::Pending,
            review_note: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let stored = self.products.insert(product)?;
        info!(product_id = %stored.id, company_id = %stored.company_id, "product submitted");
        Ok(stored)
    }

    pub fn submit_campaign(
        &self,
        actor: &Actor,
        submission: CampaignSubmission,
    ) -> Result<Campaign, DirectoryError> {
        let mut errors = ValidationError::default();
        let title = errors.required("title", &submission.title);
        if submission.starts_on.is_none() {
            errors.push("starts_on", "is required");
        }
        if submission.ends_on.is_none() {
            errors.push("ends_on", "is required");
        }
        if let (Some(starts_on), Some(ends_on)) = (submission.starts_on, submission.ends_on) {
            if ends_on < starts_on {
                errors.push("ends_on", "must not be before starts_on");
            } else if ends_on < self.clock.today() {
                errors.push("ends_on", "must not be in the past");
            }
        }
        if let Some(discount) = submission.discount_percent {
            if discount == 0 || discount > MAX_DISCOUNT_PERCENT {
                errors.push(
                    "discount_percent",
                    format!("must be between 1 and {MAX_DISCOUNT_PERCENT}"),
                );
            }
        }
        errors.into_result()?;

        let (Some(starts_on), Some(ends_on)) = (submission.starts_on, submission.ends_on) else {
            return Err(ValidationError::single("starts_on", "is required").into());
        };

        let company = self.publishing_company(actor, &submission.company_id)?;
        let now = self.clock.now();
        let campaign = Campaign {
            id: CampaignId::generate(),
            company_id: company.id,
            owner_id: company.owner_id,
            title,
            description: submission.description.trim().to_string(),
            starts_on,
            ends_on,
            discount_percent: submission.discount_percent,
            status: ReviewStatus::Pending,
            review_note: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let stored = self.campaigns.insert(campaign)?;
        info!(campaign_id = %stored.id, company_id = %stored.company_id, "campaign submitted");
        Ok(stored)
    }

    /// Moderator decision on a pending product.
    pub fn review_product(
        &self,
        actor: &Actor,
        id: &ProductId,
        request: ReviewRequest,
    ) -> Result<Product, DirectoryError> {
        actor.require_admin()?;
        let product = self.decide(self.products.as_ref(), actor, id.as_str(), request)?;
        self.notify_review(&product, NoticeTopic::ProductReviewed);
        Ok(product)
    }

    pub fn review_campaign(
        &self,
        actor: &Actor,
        id: &CampaignId,
        request: ReviewRequest,
    ) -> Result<Campaign, DirectoryError> {
        actor.require_admin()?;
        let campaign = self.decide(self.campaigns.as_ref(), actor, id.as_str(), request)?;
        self.notify_review(&campaign, NoticeTopic::CampaignReviewed);
        Ok(campaign)
    }

    /// Send a rejected product back to moderation.
    pub fn resubmit_product(&self, actor: &Actor, id: &ProductId) -> Result<Product, DirectoryError> {
        self.resubmit(self.products.as_ref(), actor, id.as_str())
    }

    pub fn resubmit_campaign(
        &self,
        actor: &Actor,
        id: &CampaignId,
    ) -> Result<Campaign, DirectoryError> {
        self.resubmit(self.campaigns.as_ref(), actor, id.as_str())
    }

    pub fn product_detail(
        &self,
        viewer: Option<&Actor>,
        id: &ProductId,
    ) -> Result<ProductDetail, DirectoryError> {
        let product = self.products.get(id.as_str())?;
        let company = self.companies.get(product.company_id.as_str())?;
        if !visible(viewer, &product, &company) {
            return Err(RepositoryError::not_found::<Product>(id.as_str()).into());
        }
        Ok(ProductDetail {
            product,
            company: company.summary(),
        })
    }

    pub fn campaign_detail(
        &self,
        viewer: Option<&Actor>,
        id: &CampaignId,
    ) -> Result<CampaignDetail, DirectoryError> {
        let campaign = self.campaigns.get(id.as_str())?;
        let company = self.companies.get(campaign.company_id.as_str())?;
        if !visible(viewer, &campaign, &company) {
            return Err(RepositoryError::not_found::<Campaign>(id.as_str()).into());
        }
        Ok(CampaignDetail {
            campaign,
            company: company.summary(),
        })
    }

    pub fn list_products(
        &self,
        viewer: Option<&Actor>,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, DirectoryError> {
        let category = filter.category.as_deref().map(fold);
        let query = filter
            .q
            .as_deref()
            .map(fold)
            .filter(|query| !query.is_empty());

        let mut products = self.visible_items(self.products.as_ref(), viewer)?;
        products.retain(|product| {
            filter
                .company_id
                .as_ref()
                .map_or(true, |company| &product.company_id == company)
                && filter.status.map_or(true, |status| product.status == status)
                && category
                    .as_ref()
                    .map_or(true, |category| &fold(&product.category) == category)
                && query.as_ref().map_or(true, |query| {
                    fold(&product.name).contains(query.as_str())
                        || fold(&product.description).contains(query.as_str())
                })
        });
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(products)
    }

    pub fn list_campaigns(
        &self,
        viewer: Option<&Actor>,
        filter: &CampaignFilter,
    ) -> Result<Vec<Campaign>, DirectoryError> {
        let mut campaigns = self.visible_items(self.campaigns.as_ref(), viewer)?;
        campaigns.retain(|campaign| {
            filter
                .company_id
                .as_ref()
                .map_or(true, |company| &campaign.company_id == company)
                && filter.status.map_or(true, |status| campaign.status == status)
                && filter.running_on.map_or(true, |day| campaign.is_running(day))
        });
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(campaigns)
    }

    /// The company a catalog item is filed under: it must be live and the caller must run it.
    fn publishing_company(
        &self,
        actor: &Actor,
        company_id: &CompanyId,
    ) -> Result<Company, DirectoryError> {
        let company = self.companies.get(company_id.as_str())?;
        if !(actor.is_admin() || actor.user_id == company.owner_id) {
            return Err(DirectoryError::forbidden(
                "only the company owner can publish to its catalog",
            ));
        }
        if !company.status.is_public() {
            return Err(DirectoryError::InvalidState(format!(
                "company {} is {} and cannot publish",
                company.id, company.status
            )));
        }
        Ok(company)
    }

    fn decide<T: Reviewable>(
        &self,
        collection: &dyn Collection<T>,
        actor: &Actor,
        id: &str,
        request: ReviewRequest,
    ) -> Result<T, DirectoryError> {
        if request.decision == ReviewAction::Resubmit {
            return Err(ValidationError::single(
                "decision",
                "must be approve or reject",
            )
            .into());
        }
        let note = clean_note(request.note);
        if request.decision == ReviewAction::Reject && note.is_none() {
            return Err(ValidationError::single("note", "is required when rejecting").into());
        }
        self.apply(collection, actor, id, request.decision, note, request.expected_version)
    }

    fn resubmit<T: Reviewable>(
        &self,
        collection: &dyn Collection<T>,
        actor: &Actor,
        id: &str,
    ) -> Result<T, DirectoryError> {
        let item = collection.get(id)?;
        if !(actor.is_admin() || &actor.user_id == item.owner_id()) {
            return Err(DirectoryError::forbidden("only the owner can resubmit"));
        }
        self.apply(collection, actor, id, ReviewAction::Resubmit, None, None)
    }

    fn apply<T: Reviewable>(
        &self,
        collection: &dyn Collection<T>,
        actor: &Actor,
        id: &str,
        action: ReviewAction,
        note: Option<String>,
        expected_version: Option<u64>,
    ) -> Result<T, DirectoryError> {
        let mut item = collection.get(id)?;
        let expected = expected_version.unwrap_or(item.version());
        let from = item.status();
        let to = from.apply(action)?;

        item.record_review(StatusChange {
            from,
            to,
            actor: actor.user_id.clone(),
            note,
            at: self.clock.now(),
        });
        let stored = collection.update(item, expected)?;
        info!(
            collection = T::COLLECTION,
            id,
            from = from.label(),
            to = to.label(),
            actor = %actor.user_id,
            "catalog item reviewed"
        );
        Ok(stored)
    }

    fn notify_review<T: Reviewable>(&self, item: &T, topic: NoticeTopic) {
        self.notifications.notify(
            item.owner_id(),
            topic,
            item.key(),
            format!("{}: {}", item.title(), item.status().label()),
        );
    }

    fn visible_items<T: Reviewable>(
        &self,
        collection: &dyn Collection<T>,
        viewer: Option<&Actor>,
    ) -> Result<Vec<T>, DirectoryError> {
        let companies = self.companies.scan()?;
        Ok(collection
            .scan()?
            .into_iter()
            .filter(|item| {
                companies
                    .iter()
                    .find(|company| &company.id == item.company_id())
                    .is_some_and(|company| visible(viewer, item, company))
            })
            .collect())
    }
}

/// Approved items of live companies are public; owners and administrators see everything.
fn visible<T: Reviewable>(viewer: Option<&Actor>, item: &T, company: &Company) -> bool {
    let privileged =
        viewer.is_some_and(|actor| actor.is_admin() || &actor.user_id == item.owner_id());
    privileged || (item.status() == ReviewStatus::Approved && company.status.is_public())
}
