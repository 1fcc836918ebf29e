use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::marketplace::accounts::{AccountRegistration, Actor, Credentials, Role};
use crate::marketplace::agents::{Agent, AgentRegistration};
use crate::marketplace::catalog::{CampaignSubmission, ProductSubmission};
use crate::marketplace::companies::{
    Company, CompanyId, CompanySubmission, TransitionRequest,
};
use crate::marketplace::status::ListingAction;
use crate::marketplace::{
    FixedClock, Marketplace, MarketplaceSettings, MemoryMediaStore, MemoryNotifications, Stores,
};

pub(super) const PASSWORD: &str = "clave-segura-1";
pub(super) const ADMIN_EMAIL: &str = "admin@directorio.cl";

pub(super) struct Harness {
    pub marketplace: Arc<Marketplace>,
    pub notices: MemoryNotifications,
    pub clock: Arc<FixedClock>,
}

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
}

pub(super) fn harness() -> Harness {
    harness_with(MarketplaceSettings::default())
}

pub(super) fn harness_with(settings: MarketplaceSettings) -> Harness {
    harness_on(Stores::in_memory(), settings)
}

/// Harness over caller-supplied stores, so a test can reach behind the services.
pub(super) fn harness_on(stores: Stores, settings: MarketplaceSettings) -> Harness {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).single().expect("valid instant"),
    ));
    let notices = MemoryNotifications::default();
    let marketplace = Marketplace::new(
        stores,
        Arc::new(MemoryMediaStore::default()),
        Arc::new(notices.clone()),
        clock.clone(),
        settings,
    );
    Harness {
        marketplace: Arc::new(marketplace),
        notices,
        clock,
    }
}

impl Harness {
    pub fn token(&self, email: &str) -> String {
        self.marketplace
            .accounts
            .login(&Credentials {
                email: email.to_string(),
                password: PASSWORD.to_string(),
            })
            .expect("login succeeds")
            .token
    }

    pub fn actor(&self, email: &str) -> Actor {
        let token = self.token(email);
        self.marketplace
            .accounts
            .authenticate(&token)
            .expect("fresh session authenticates")
    }

    pub fn admin(&self) -> Actor {
        self.marketplace
            .accounts
            .bootstrap_admin(ADMIN_EMAIL, PASSWORD)
            .expect("bootstrap admin");
        self.actor(ADMIN_EMAIL)
    }

    pub fn signup(&self, email: &str, role: Role) -> Actor {
        self.marketplace
            .accounts
            .register(AccountRegistration {
                email: email.to_string(),
                display_name: email.split('@').next().unwrap_or(email).to_string(),
                password: PASSWORD.to_string(),
                role,
            })
            .expect("registration succeeds");
        self.actor(email)
    }

    pub fn agent(&self, admin: &Actor, email: &str, zone: &str) -> (Agent, Actor) {
        let agent = self
            .marketplace
            .agents
            .register_agent(admin, agent_registration(email, zone))
            .expect("agent registered");
        (agent, self.actor(email))
    }

    pub fn transition(&self, actor: &Actor, id: &CompanyId, action: ListingAction) -> Company {
        self.marketplace
            .companies
            .transition(
                actor,
                id,
                TransitionRequest {
                    action,
                    note: None,
                    expected_version: None,
                },
            )
            .expect("transition allowed")
    }

    /// Submit a company as `owner` and walk it to `activa` as `admin`.
    pub fn active_company(&self, owner: &Actor, admin: &Actor, name: &str) -> Company {
        let company = self
            .marketplace
            .companies
            .submit(owner, company_submission(name, "Temuco"))
            .expect("submission accepted");
        self.transition(admin, &company.id, ListingAction::Validate);
        self.transition(admin, &company.id, ListingAction::SendToReview);
        self.transition(admin, &company.id, ListingAction::Approve)
    }
}

pub(super) fn company_submission(name: &str, city: &str) -> CompanySubmission {
    CompanySubmission {
        name: name.to_string(),
        category: "Talleres".to_string(),
        description: format!("{name}: mecánica general y frenos"),
        contact_email: "contacto@taller.cl".to_string(),
        phone: "+56 9 8765 4321".to_string(),
        address: "Av. Alemania 123".to_string(),
        city: city.to_string(),
        website: None,
        logo_url: None,
    }
}

pub(super) fn agent_registration(email: &str, zone: &str) -> AgentRegistration {
    AgentRegistration {
        name: format!("Agente {zone}"),
        email: email.to_string(),
        phone: "+56 2 2345 6789".to_string(),
        zone: zone.to_string(),
        password: PASSWORD.to_string(),
    }
}

pub(super) fn product_submission(company_id: &CompanyId) -> ProductSubmission {
    ProductSubmission {
        company_id: company_id.clone(),
        name: "Cambio de aceite".to_string(),
        description: "Incluye filtro".to_string(),
        category: "Servicios".to_string(),
        price_cents: 2_999_000,
        image_url: None,
    }
}

pub(super) fn campaign_submission(company_id: &CompanyId) -> CampaignSubmission {
    CampaignSubmission {
        company_id: company_id.clone(),
        title: "Marzo de frenos".to_string(),
        description: "Revisión gratuita".to_string(),
        starts_on: Some(today()),
        ends_on: NaiveDate::from_ymd_opt(2025, 3, 31),
        discount_percent: Some(15),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}
