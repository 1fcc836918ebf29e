use chrono::Local;
use clap::Args;
use directorio::error::AppError;
use directorio::marketplace::accounts::{AccountRegistration, Actor, Credentials, Role};
use directorio::marketplace::agents::{AgentRegistration, AssignmentRequest};
use directorio::marketplace::catalog::{
    CampaignSubmission, ProductFilter, ProductSubmission, ReviewRequest,
};
use directorio::marketplace::companies::{
    Company, CompanyFilter, CompanySubmission, FlagUpdate, TransitionRequest,
};
use directorio::marketplace::status::{ListingAction, ReviewAction};
use directorio::marketplace::{Marketplace, MarketplaceSettings};

const DEMO_PASSWORD: &str = "demo-clave-2025";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// City used for the sample listings
    #[arg(long, default_value = "Temuco")]
    pub(crate) city: String,
    /// Skip the product and campaign review portion of the demo
    #[arg(long)]
    pub(crate) skip_catalog: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { city, skip_catalog } = args;
    let (marketplace, notices) = Marketplace::in_memory(MarketplaceSettings::default());

    println!("Directory workflow demo ({city})");
    marketplace
        .accounts
        .bootstrap_admin("admin@demo.directorio.cl", DEMO_PASSWORD)?;
    let admin = sign_in(&marketplace, "admin@demo.directorio.cl")?;

    let agent = marketplace.agents.register_agent(
        &admin,
        AgentRegistration {
            name: "Camila Rojas".to_string(),
            email: "agente@demo.directorio.cl".to_string(),
            phone: "+56 9 5555 0101".to_string(),
            zone: city.clone(),
            password: DEMO_PASSWORD.to_string(),
        },
    )?;
    let agent_actor = sign_in(&marketplace, &agent.email)?;
    println!("- Field agent {} covers {}", agent.name, agent.zone);

    marketplace.accounts.register(AccountRegistration {
        email: "duenio@demo.directorio.cl".to_string(),
        display_name: "Dueño demo".to_string(),
        password: DEMO_PASSWORD.to_string(),
        role: Role::Company,
    })?;
    let owner = sign_in(&marketplace, "duenio@demo.directorio.cl")?;

    let workshop = marketplace.companies.submit(
        &owner,
        sample_company("Taller Los Aromos", "Talleres", &city, Some("https://aromos.cl")),
    )?;
    let bakery = marketplace
        .companies
        .submit(&owner, sample_company("Panadería Central", "Alimentos", &city, None))?;
    println!(
        "- Received {} and {} -> status {}",
        workshop.name,
        bakery.name,
        workshop.status.label()
    );

    let summary = marketplace.agents.assign_companies(
        &admin,
        &agent.id,
        AssignmentRequest {
            company_ids: vec![workshop.id.clone(), bakery.id.clone()],
        },
    )?;
    println!("- Assigned {} listings to {}", summary.assigned.len(), agent.name);

    transition(&marketplace, &agent_actor, &workshop, ListingAction::Validate, None)?;
    transition(&marketplace, &agent_actor, &bakery, ListingAction::Validate, None)?;
    marketplace.companies.set_flags(
        &admin,
        &workshop.id,
        FlagUpdate {
            web_validated: Some(true),
            logo_assigned: None,
            expected_version: None,
        },
    )?;
    transition(&marketplace, &admin, &workshop, ListingAction::SendToReview, None)?;
    let workshop = transition(&marketplace, &admin, &workshop, ListingAction::Approve, None)?;
    let bakery = transition(
        &marketplace,
        &admin,
        &bakery,
        ListingAction::Reject,
        Some("falta dirección del local"),
    )?;
    for company in [&workshop, &bakery] {
        println!("  {} -> {}", company.name, company.status.label());
        for change in &company.history {
            println!(
                "    - {} -> {}{}",
                change.from.label(),
                change.to.label(),
                change
                    .note
                    .as_deref()
                    .map(|note| format!(" ({note})"))
                    .unwrap_or_default()
            );
        }
    }

    if !skip_catalog {
        println!("\nCatalog review");
        let product = marketplace.catalog.submit_product(
            &owner,
            ProductSubmission {
                company_id: workshop.id.clone(),
                name: "Cambio de aceite".to_string(),
                description: "Incluye filtro y revisión de niveles".to_string(),
                category: "Servicios".to_string(),
                price_cents: 3_490_000,
                image_url: None,
            },
        )?;
        let product = marketplace.catalog.review_product(
            &admin,
            &product.id,
            ReviewRequest {
                decision: ReviewAction::Approve,
                note: None,
                expected_version: None,
            },
        )?;
        println!("- Product {} -> {}", product.name, product.status.label());

        let today = Local::now().date_naive();
        let campaign = marketplace.catalog.submit_campaign(
            &owner,
            CampaignSubmission {
                company_id: workshop.id.clone(),
                title: "Mes de los frenos".to_string(),
                description: "Revisión de frenos sin costo".to_string(),
                starts_on: Some(today),
                ends_on: today.checked_add_signed(chrono::Duration::days(30)),
                discount_percent: Some(20),
            },
        )?;
        println!("- Campaign {} -> {}", campaign.title, campaign.status.label());

        let public = marketplace
            .catalog
            .list_products(None, &ProductFilter::default())?;
        println!("- {} product(s) visible to visitors", public.len());
    }

    let stats = marketplace.companies.stats(&admin)?;
    println!("\nDirectory totals");
    println!(
        "- {} listings | {} active | {} rejected | {} pending review",
        stats.total,
        stats.active,
        stats.rejected,
        stats.submitted + stats.validated + stats.under_review
    );
    println!(
        "- {} with validated website | {} without an agent",
        stats.web_validated, stats.unassigned
    );

    println!("Public directory");
    for company in marketplace.companies.list(None, &CompanyFilter::default())? {
        println!("  - {} ({}, {})", company.name, company.category, company.city);
    }
    println!("{} notice(s) queued for owners", notices.notices().len());

    Ok(())
}

fn sign_in(marketplace: &Marketplace, email: &str) -> Result<Actor, AppError> {
    let session = marketplace.accounts.login(&Credentials {
        email: email.to_string(),
        password: DEMO_PASSWORD.to_string(),
    })?;
    Ok(marketplace.accounts.authenticate(&session.token)?)
}

fn transition(
    marketplace: &Marketplace,
    actor: &Actor,
    company: &Company,
    action: ListingAction,
    note: Option<&str>,
) -> Result<Company, AppError> {
    Ok(marketplace.companies.transition(
        actor,
        &company.id,
        TransitionRequest {
            action,
            note: note.map(str::to_string),
            expected_version: None,
        },
    )?)
}

fn sample_company(
    name: &str,
    category: &str,
    city: &str,
    website: Option<&str>,
) -> CompanySubmission {
    CompanySubmission {
        name: name.to_string(),
        category: category.to_string(),
        description: format!("{name}, atención de lunes a sábado"),
        contact_email: "contacto@demo.directorio.cl".to_string(),
        phone: "+56 45 221 0000".to_string(),
        address: "Av. Alemania 0450".to_string(),
        city: city.to_string(),
        website: website.map(str::to_string),
        logo_url: None,
    }
}
