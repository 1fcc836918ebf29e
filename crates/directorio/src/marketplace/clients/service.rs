use std::sync::Arc;

use tracing::{info, warn};

use super::requests::{
    ClientRequest, ClientRequestId, ClientRequestStatus, ClientRequestSubmission,
    RequestStatusUpdate,
};
use super::vehicles::{Vehicle, VehicleFields, VehicleId, VehicleSubmission};
use crate::marketplace::accounts::{Actor, Role};
use crate::marketplace::clock::Clock;
use crate::marketplace::companies::Company;
use crate::marketplace::error::DirectoryError;
use crate::marketplace::notifications::{NoticeTopic, NotificationService};
use crate::marketplace::status::{clean_note, ListingStatus, StatusChange};
use crate::marketplace::store::{Collection, RepositoryError};
use crate::marketplace::validation::ValidationError;

const MAX_MESSAGE_CHARS: usize = 2_000;

pub struct ClientService {
    requests: Arc<dyn Collection<ClientRequest>>,
    vehicles: Arc<dyn Collection<Vehicle>>,
    companies: Arc<dyn Collection<Company>>,
    notifications: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
}

impl ClientService {
    pub fn new(
        requests: Arc<dyn Collection<ClientRequest>>,
        vehicles: Arc<dyn Collection<Vehicle>>,
        companies: Arc<dyn Collection<Company>>,
        notifications: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            requests,
            vehicles,
            companies,
            notifications,
            clock,
        }
    }

    /// A client writes to a published company, optionally about one of their vehicles.
    pub fn open_request(
        &self,
        actor: &Actor,
        submission: ClientRequestSubmission,
    ) -> Result<ClientRequest, DirectoryError> {
        if actor.role != Role::Client {
            return Err(DirectoryError::forbidden(
                "only client accounts can contact companies",
            ));
        }

        let mut errors = ValidationError::default();
        let message = errors.required("message", &submission.message);
        if message.chars().count() > MAX_MESSAGE_CHARS {
            errors.push(
                "message",
                format!("must be at most {MAX_MESSAGE_CHARS} characters"),
            );
        }
        errors.into_result()?;

        let company = self.companies.get(submission.company_id.as_str())?;
        if company.status != ListingStatus::Active {
            return Err(DirectoryError::InvalidState(format!(
                "company {} is not accepting requests",
                company.id
            )));
        }

        if let Some(vehicle_id) = &submission.vehicle_id {
            let vehicle = self.vehicles.get(vehicle_id.as_str())?;
            if vehicle.owner_id != actor.user_id {
                return Err(DirectoryError::forbidden(
                    "the vehicle belongs to another client",
                ));
            }
        }

        let now = self.clock.now();
        let stored = self.requests.insert(ClientRequest {
            id: ClientRequestId::generate(),
            company_id: company.id.clone(),
            client_id: actor.user_id.clone(),
            message,
            vehicle_id: submission.vehicle_id,
            status: ClientRequestStatus::Open,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        })?;

        info!(request_id = %stored.id, company_id = %company.id, "client request opened");
        self.notifications.notify(
            &company.owner_id,
            NoticeTopic::ClientRequestOpened,
            stored.id.as_str(),
            format!("Nueva solicitud de cliente para {}", company.name),
        );
        Ok(stored)
    }

    /// Requests the caller is party to: their own as a client, their companies' as an owner,
    /// their assigned companies' as an agent, everything as an administrator.
    pub fn list_requests(&self, actor: &Actor) -> Result<Vec<ClientRequest>, DirectoryError> {
        let companies = match actor.role {
            Role::Admin | Role::Client => Vec::new(),
            Role::Company | Role::Agent => self.companies.scan()?,
        };
        let related = |request: &ClientRequest| match actor.role {
            Role::Admin => true,
            Role::Client => request.client_id == actor.user_id,
            Role::Company => companies
                .iter()
                .any(|company| company.id == request.company_id && company.owner_id == actor.user_id),
            Role::Agent => companies.iter().any(|company| {
                company.id == request.company_id
                    && company
                        .assigned_agent
                        .as_ref()
                        .is_some_and(|agent| actor.is_agent(agent))
            }),
        };

        let mut requests: Vec<ClientRequest> = self
            .requests
            .scan()?
            .into_iter()
            .filter(|request| related(request))
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(requests)
    }

    /// Companies work a request through; the client may only withdraw it.
    pub fn update_request_status(
        &self,
        actor: &Actor,
        id: &ClientRequestId,
        update: RequestStatusUpdate,
    ) -> Result<ClientRequest, DirectoryError> {
        let mut request = self.requests.get(id.as_str())?;
        let expected = update.expected_version.unwrap_or(request.version);

        let allowed = match update.status {
            ClientRequestStatus::Cancelled => request.client_id == actor.user_id,
            _ => {
                actor.is_admin()
                    || self
                        .companies
                        .fetch(request.company_id.as_str())?
                        .is_some_and(|company| company.owner_id == actor.user_id)
            }
        };
        if !allowed {
            return Err(DirectoryError::forbidden(format!(
                "{} may not set this request to {}",
                actor.role.label(),
                update.status
            )));
        }

        let from = request.status;
        let to = from.advance(update.status).inspect_err(|err| {
            warn!(request_id = %id, error = %err, "rejected request transition");
        })?;

        let now = self.clock.now();
        request.history.push(StatusChange {
            from,
            to,
            actor: actor.user_id.clone(),
            note: clean_note(update.note),
            at: now,
        });
        request.status = to;
        request.updated_at = now;

        let stored = self.requests.update(request, expected)?;
        info!(request_id = %id, from = from.label(), to = to.label(), "client request updated");

        if stored.client_id != actor.user_id {
            self.notifications.notify(
                &stored.client_id,
                NoticeTopic::ClientRequestUpdated,
                stored.id.as_str(),
                format!("Tu solicitud ahora está {}", to.label()),
            );
        }
        Ok(stored)
    }

    pub fn register_vehicle(
        &self,
        actor: &Actor,
        submission: VehicleSubmission,
    ) -> Result<Vehicle, DirectoryError> {
        if !matches!(actor.role, Role::Client | Role::Admin) {
            return Err(DirectoryError::forbidden(
                "only clients can register vehicles",
            ));
        }
        let now = self.clock.now();
        let fields = submission.validate(now)?;

        let VehicleFields {
            plate,
            make,
            model,
            year,
            color,
        } = fields;
        let vehicle = Vehicle {
            id: VehicleId::generate(),
            owner_id: actor.user_id.clone(),
            plate,
            make,
            model,
            year,
            color,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        let stored = self
            .vehicles
            .insert_unique(vehicle.clone(), &|existing| existing.plate == vehicle.plate)
            .map_err(|err| plate_taken(err, &vehicle.plate))?;
        info!(vehicle_id = %stored.id, plate = %stored.plate, "vehicle registered");
        Ok(stored)
    }

    /// The caller's vehicles; administrators see every record.
    pub fn list_vehicles(&self, actor: &Actor) -> Result<Vec<Vehicle>, DirectoryError> {
        let mut vehicles: Vec<Vehicle> = self
            .vehicles
            .scan()?
            .into_iter()
            .filter(|vehicle| actor.is_admin() || vehicle.owner_id == actor.user_id)
            .collect();
        vehicles.sort_by(|a, b| a.plate.cmp(&b.plate));
        Ok(vehicles)
    }

    pub fn update_vehicle(
        &self,
        actor: &Actor,
        id: &VehicleId,
        submission: VehicleSubmission,
    ) -> Result<Vehicle, DirectoryError> {
        let mut vehicle = self.owned_vehicle(actor, id)?;
        let expected = submission.expected_version.unwrap_or(vehicle.version);
        let now = self.clock.now();
        let fields = submission.validate(now)?;

        vehicle.plate = fields.plate;
        vehicle.make = fields.make;
        vehicle.model = fields.model;
        vehicle.year = fields.year;
        vehicle.color = fields.color;
        vehicle.updated_at = now;

        let plate = vehicle.plate.clone();
        let stored = self
            .vehicles
            .update_unique(vehicle, expected, &|existing| existing.plate == plate)
            .map_err(|err| plate_taken(err, &plate))?;
        info!(vehicle_id = %id, "vehicle updated");
        Ok(stored)
    }

    pub fn delete_vehicle(&self, actor: &Actor, id: &VehicleId) -> Result<(), DirectoryError> {
        self.owned_vehicle(actor, id)?;
        self.vehicles.delete(id.as_str())?;
        info!(vehicle_id = %id, actor = %actor.user_id, "vehicle deleted");
        Ok(())
    }

    fn owned_vehicle(&self, actor: &Actor, id: &VehicleId) -> Result<Vehicle, DirectoryError> {
        let vehicle = self.vehicles.get(id.as_str())?;
        if !(actor.is_admin() || vehicle.owner_id == actor.user_id) {
            return Err(DirectoryError::forbidden("the vehicle belongs to another client"));
        }
        Ok(vehicle)
    }
}

fn plate_taken(err: RepositoryError, plate: &str) -> DirectoryError {
    DirectoryError::duplicate_on_conflict(err, || format!("plate {plate} is already registered"))
}
