use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{error, info};

use super::{
    Agent, AgentId, AgentRegistration, AgentStatusUpdate, AgentSummary, AssignmentRequest,
    AssignmentSummary, Reassignment,
};
use crate::marketplace::accounts::{AccountService, Actor, NewAccount, Role, UserId};
use crate::marketplace::clock::Clock;
use crate::marketplace::companies::{Company, CompanyId};
use crate::marketplace::error::DirectoryError;
use crate::marketplace::status::ListingStatus;
use crate::marketplace::store::{Collection, RepositoryError};
use crate::marketplace::validation::{
    is_valid_email, normalize_email, normalize_phone, ValidationError,
};

pub struct AgentService {
    agents: Arc<dyn Collection<Agent>>,
    companies: Arc<dyn Collection<Company>>,
    accounts: Arc<AccountService>,
    clock: Arc<dyn Clock>,
}

impl AgentService {
    pub fn new(
        agents: Arc<dyn Collection<Agent>>,
        companies: Arc<dyn Collection<Company>>,
        accounts: Arc<AccountService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            agents,
            companies,
            accounts,
            clock,
        }
    }

    /// Create the agent record and its login. When the account cannot be created the agent
    /// record is removed again so no agent exists without credentials.
    pub fn register_agent(
        &self,
        actor: &Actor,
        registration: AgentRegistration,
    ) -> Result<Agent, DirectoryError> {
        actor.require_admin()?;

        let mut errors = ValidationError::default();
        let name = errors.required("name", &registration.name);
        let zone = errors.required("zone", &registration.zone);
        let email = normalize_email(&registration.email);
        if !is_valid_email(&email) {
            errors.push("email", "is not a valid address");
        }
        let phone = normalize_phone(&registration.phone).unwrap_or_else(|| {
            errors.push("phone", "must contain 7 to 15 digits");
            String::new()
        });
        errors.into_result()?;

        let user_id = UserId::generate();
        let candidate = Agent {
            id: AgentId::generate(),
            user_id: user_id.clone(),
            name,
            email,
            phone,
            zone,
            active: true,
            created_at: self.clock.now(),
            version: 0,
        };
        let agent = self
            .agents
            .insert_unique(candidate.clone(), &|agent| agent.email == candidate.email)
            .map_err(|err| {
                DirectoryError::duplicate_on_conflict(err, || {
                    format!("an agent is already registered with {}", candidate.email)
                })
            })?;

        let account = self.accounts.create_account(NewAccount {
            id: Some(user_id),
            email: &agent.email,
            display_name: &agent.name,
            password: &registration.password,
            role: Role::Agent,
            agent_id: Some(agent.id.clone()),
        });

        if let Err(err) = account {
            if let Err(cleanup) = self.agents.delete(agent.id.as_str()) {
                error!(agent_id = %agent.id, error = %cleanup, "orphan agent left behind");
            }
            return Err(err);
        }

        info!(agent_id = %agent.id, zone = %agent.zone, "agent registered");
        Ok(agent)
    }

    pub fn list_agents(&self, actor: &Actor) -> Result<Vec<Agent>, DirectoryError> {
        actor.require_admin()?;
        let mut agents = self.agents.scan()?;
        agents.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(agents)
    }

    /// Move a batch of companies to one agent. The batch is written atomically: a missing
    /// company or a concurrent edit leaves every company untouched.
    pub fn assign_companies(
        &self,
        actor: &Actor,
        agent_id: &AgentId,
        request: AssignmentRequest,
    ) -> Result<AssignmentSummary, DirectoryError> {
        actor.require_admin()?;

        let agent = self.agents.get(agent_id.as_str())?;
        if !agent.active {
            return Err(DirectoryError::InvalidState(format!(
                "agent {} is inactive",
                agent.id
            )));
        }

        let requested: BTreeSet<CompanyId> = request.company_ids.into_iter().collect();
        if requested.is_empty() {
            return Err(ValidationError::single("company_ids", "must not be empty").into());
        }

        let mut companies = Vec::with_capacity(requested.len());
        for id in &requested {
            let company = self
                .companies
                .fetch(id.as_str())?
                .ok_or_else(|| RepositoryError::not_found::<Company>(id.as_str()))?;
            companies.push(company);
        }

        let now = self.clock.now();
        let mut reassigned_from = Vec::new();
        let mut updates = Vec::new();
        for mut company in companies {
            if company.assigned_agent.as_ref() == Some(agent_id) {
                continue;
            }
            if let Some(previous) = company.assigned_agent.take() {
                reassigned_from.push(Reassignment {
                    company_id: company.id.clone(),
                    previous_agent: previous,
                });
            }
            company.assigned_agent = Some(agent_id.clone());
            company.updated_at = now;
            let version = company.version;
            updates.push((company, version));
        }

        let written = updates.len();
        if !updates.is_empty() {
            self.companies.update_many(updates)?;
        }

        info!(
            agent_id = %agent_id,
            requested = requested.len(),
            written,
            reassigned = reassigned_from.len(),
            "companies assigned"
        );

        Ok(AssignmentSummary {
            agent_id: agent_id.clone(),
            assigned: requested.into_iter().collect(),
            reassigned_from,
        })
    }

    /// Workload for one agent; visible to administrators and the agent themself.
    pub fn agent_summary(
        &self,
        actor: &Actor,
        agent_id: &AgentId,
    ) -> Result<AgentSummary, DirectoryError> {
        if !(actor.is_admin() || actor.is_agent(agent_id)) {
            return Err(DirectoryError::forbidden(
                "agents can only view their own summary",
            ));
        }
        let agent = self.agents.get(agent_id.as_str())?;
        let companies = self.companies.scan()?;

        let assigned: Vec<&Company> = companies
            .iter()
            .filter(|company| company.assigned_agent.as_ref() == Some(agent_id))
            .collect();
        let validated_by_agent = companies
            .iter()
            .filter(|company| {
                company.history.iter().any(|change| {
                    change.actor == agent.user_id && change.to == ListingStatus::Validated
                })
            })
            .count();

        Ok(AgentSummary {
            assigned: assigned.len(),
            pending: assigned
                .iter()
                .filter(|company| company.status.is_pending())
                .count(),
            active: assigned
                .iter()
                .filter(|company| company.status == ListingStatus::Active)
                .count(),
            validated_by_agent,
            agent,
        })
    }

    /// Enable or disable an agent together with its login.
    pub fn set_agent_active(
        &self,
        actor: &Actor,
        agent_id: &AgentId,
        update: AgentStatusUpdate,
    ) -> Result<Agent, DirectoryError> {
        actor.require_admin()?;
        let mut agent = self.agents.get(agent_id.as_str())?;
        if agent.active == update.active {
            return Ok(agent);
        }

        let version = agent.version;
        agent.active = update.active;
        let stored = self.agents.update(agent, version)?;
        if let Err(err) = self.accounts.set_active(&stored.user_id, update.active) {
            let mut restored = stored.clone();
            restored.active = !update.active;
            if let Err(revert) = self.agents.update(restored, stored.version) {
                error!(agent_id = %agent_id, error = %revert, "agent and account status disagree");
            }
            return Err(err);
        }

        info!(agent_id = %agent_id, active = update.active, "agent status changed");
        Ok(stored)
    }
}
