//! Business directory and marketplace: company listings moderated by administrators and
//! field agents, a product and campaign catalog, client requests and vehicles.
//!
//! Services are synchronous and hold their collections behind [`Collection`] trait objects;
//! [`Marketplace`] wires them together over a shared set of [`Stores`].

pub mod accounts;
pub mod agents;
pub mod catalog;
pub mod clients;
pub mod clock;
pub mod companies;
pub mod error;
pub mod media;
pub mod notifications;
pub mod router;
pub mod status;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::Duration;

use crate::config::{DirectoryConfig, MAX_SESSION_TTL_MINUTES};

pub use accounts::{AccountService, Actor, Role, UserId};
pub use agents::{AgentId, AgentService};
pub use catalog::{CampaignId, CatalogService, ProductId};
pub use clients::{ClientRequestId, ClientService, VehicleId};
pub use clock::{Clock, FixedClock, SystemClock};
pub use companies::{CompanyId, CompanyService};
pub use error::DirectoryError;
pub use media::{MediaLibrary, MediaStore, MemoryMediaStore};
pub use notifications::{MemoryNotifications, NotificationPublisher, NotificationService};
pub use router::marketplace_router;
pub use status::{ListingAction, ListingStatus, ReviewAction, ReviewStatus};
pub use store::{Collection, Document, MemoryCollection, RepositoryError};

/// One handle per collection. Several services share the same handle so that, for example,
/// deleting a company is visible to the catalog immediately.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn Collection<accounts::UserAccount>>,
    pub companies: Arc<dyn Collection<companies::Company>>,
    pub products: Arc<dyn Collection<catalog::Product>>,
    pub campaigns: Arc<dyn Collection<catalog::Campaign>>,
    pub agents: Arc<dyn Collection<agents::Agent>>,
    pub client_requests: Arc<dyn Collection<clients::ClientRequest>>,
    pub vehicles: Arc<dyn Collection<clients::Vehicle>>,
    pub devices: Arc<dyn Collection<notifications::DeviceRegistration>>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(MemoryCollection::default()),
            companies: Arc::new(MemoryCollection::default()),
            products: Arc::new(MemoryCollection::default()),
            campaigns: Arc::new(MemoryCollection::default()),
            agents: Arc::new(MemoryCollection::default()),
            client_requests: Arc::new(MemoryCollection::default()),
            vehicles: Arc::new(MemoryCollection::default()),
            devices: Arc::new(MemoryCollection::default()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MarketplaceSettings {
    pub session_ttl: Duration,
    pub max_upload_bytes: usize,
}

impl Default for MarketplaceSettings {
    fn default() -> Self {
        Self::from(&DirectoryConfig::default())
    }
}

impl From<&DirectoryConfig> for MarketplaceSettings {
    fn from(config: &DirectoryConfig) -> Self {
        Self {
            session_ttl: Duration::minutes(
                config
                    .session_ttl_minutes
                    .clamp(1, MAX_SESSION_TTL_MINUTES),
            ),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Every marketplace service, built over one set of stores.
pub struct Marketplace {
    pub accounts: Arc<AccountService>,
    pub companies: CompanyService,
    pub catalog: CatalogService,
    pub agents: AgentService,
    pub clients: ClientService,
    pub notifications: Arc<NotificationService>,
    pub media: Arc<MediaLibrary>,
}

impl Marketplace {
    pub fn new(
        stores: Stores,
        media_store: Arc<dyn MediaStore>,
        publisher: Arc<dyn NotificationPublisher>,
        clock: Arc<dyn Clock>,
        settings: MarketplaceSettings,
    ) -> Self {
        let accounts = Arc::new(AccountService::new(
            stores.users.clone(),
            clock.clone(),
            settings.session_ttl,
        ));
        let notifications = Arc::new(NotificationService::new(
            stores.devices.clone(),
            publisher,
            clock.clone(),
        ));
        let media = Arc::new(MediaLibrary::new(media_store, settings.max_upload_bytes));

        let companies = CompanyService::new(
            stores.companies.clone(),
            stores.products.clone(),
            stores.campaigns.clone(),
            stores.agents.clone(),
            notifications.clone(),
            media.clone(),
            clock.clone(),
        );
        let catalog = CatalogService::new(
            stores.products.clone(),
            stores.campaigns.clone(),
            stores.companies.clone(),
            notifications.clone(),
            clock.clone(),
        );
        let agents = AgentService::new(
            stores.agents.clone(),
            stores.companies.clone(),
            accounts.clone(),
            clock.clone(),
        );
        let clients = ClientService::new(
            stores.client_requests,
            stores.vehicles,
            stores.companies,
            notifications.clone(),
            clock,
        );

        Self {
            accounts,
            companies,
            catalog,
            agents,
            clients,
            notifications,
            media,
        }
    }

    /// In-process marketplace on the system clock. Notices are kept in the returned
    /// [`MemoryNotifications`].
    pub fn in_memory(settings: MarketplaceSettings) -> (Self, MemoryNotifications) {
        let notices = MemoryNotifications::default();
        let marketplace = Self::new(
            Stores::in_memory(),
            Arc::new(MemoryMediaStore::default()),
            Arc::new(notices.clone()),
            Arc::new(SystemClock),
            settings,
        );
        (marketplace, notices)
    }
}
