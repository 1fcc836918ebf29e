use super::common::*;

use crate::marketplace::accounts::{Actor, Credentials, Role};
use crate::marketplace::agents::{AgentId, AgentStatusUpdate, AssignmentRequest};
use crate::marketplace::companies::{CompanyFilter, CompanyId, TransitionRequest};
use crate::marketplace::error::DirectoryError;
use crate::marketplace::status::{ListingAction, ListingStatus};
use crate::marketplace::store::{Collection, RepositoryError};
use crate::marketplace::{MarketplaceSettings, Stores};

#[test]
fn registering_an_agent_creates_a_paired_login() {
    let h = harness();
    let admin = h.admin();
    let (agent, actor) = h.agent(&admin, "agente@directorio.cl", "Araucanía");

    assert_eq!(actor.role, Role::Agent);
    assert_eq!(actor.agent_id.as_ref(), Some(&agent.id));
    assert_eq!(actor.user_id, agent.user_id);
}

#[test]
fn failed_account_creation_leaves_no_orphan_agent() {
    let h = harness();
    let admin = h.admin();
    h.signup("ocupado@directorio.cl", Role::Client);

    let err = h
        .marketplace
        .agents
        .register_agent(&admin, agent_registration("ocupado@directorio.cl", "Biobío"))
        .expect_err("email already has an account");
    assert!(matches!(err, DirectoryError::Duplicate(_)));

    let mut weak = agent_registration("nuevo@directorio.cl", "Biobío");
    weak.password = "corta".to_string();
    assert!(h.marketplace.agents.register_agent(&admin, weak).is_err());

    let agents = h.marketplace.agents.list_agents(&admin).expect("list");
    assert!(agents.is_empty(), "orphans left behind: {agents:?}");
}

#[test]
fn only_admins_register_agents() {
    let h = harness();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let err = h
        .marketplace
        .agents
        .register_agent(&owner, agent_registration("agente@directorio.cl", "Maule"))
        .expect_err("forbidden");
    assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
}

#[test]
fn bulk_assignment_is_all_or_nothing() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let (agent, _) = h.agent(&admin, "agente@directorio.cl", "Araucanía");
    let company = h
        .marketplace
        .companies
        .submit(&owner, company_submission("Taller", "Temuco"))
        .expect("submitted");

    let err = h
        .marketplace
        .agents
        .assign_companies(
            &admin,
            &agent.id,
            AssignmentRequest {
                company_ids: vec![company.id.clone(), CompanyId::from("emp_fantasma")],
            },
        )
        .expect_err("missing company aborts the batch");
    assert!(matches!(
        err,
        DirectoryError::Repository(RepositoryError::NotFound { .. })
    ));

    let untouched = h
        .marketplace
        .companies
        .list(Some(&admin), &CompanyFilter::default())
        .expect("list");
    assert!(untouched.iter().all(|company| company.assigned_agent.is_none()));
}

#[test]
fn reassignment_reports_the_previous_agent() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let (first, _) = h.agent(&admin, "uno@directorio.cl", "Norte");
    let (second, _) = h.agent(&admin, "dos@directorio.cl", "Sur");
    let company = h
        .marketplace
        .companies
        .submit(&owner, company_submission("Taller", "Temuco"))
        .expect("submitted");

    let assign = |agent: &AgentId| {
        h.marketplace.agents.assign_companies(
            &admin,
            agent,
            AssignmentRequest {
                company_ids: vec![company.id.clone(), company.id.clone()],
            },
        )
    };
    let summary = assign(&first.id).expect("assigned");
    assert_eq!(summary.assigned, vec![company.id.clone()]);
    assert!(summary.reassigned_from.is_empty());

    let summary = assign(&second.id).expect("reassigned");
    assert_eq!(summary.reassigned_from.len(), 1);
    assert_eq!(summary.reassigned_from[0].previous_agent, first.id);
}

#[test]
fn inactive_or_unknown_agents_cannot_receive_companies() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let (agent, _) = h.agent(&admin, "agente@directorio.cl", "Araucanía");
    let company = h
        .marketplace
        .companies
        .submit(&owner, company_submission("Taller", "Temuco"))
        .expect("submitted");
    let request = || AssignmentRequest {
        company_ids: vec![company.id.clone()],
    };

    let err = h
        .marketplace
        .agents
        .assign_companies(&admin, &AgentId::from("agt_nadie"), request())
        .expect_err("unknown agent");
    assert!(err.is_not_found());

    h.marketplace
        .agents
        .set_agent_active(&admin, &agent.id, AgentStatusUpdate { active: false })
        .expect("disabled");
    let err = h
        .marketplace
        .agents
        .assign_companies(&admin, &agent.id, request())
        .expect_err("inactive agent");
    assert!(matches!(err, DirectoryError::InvalidState(_)));
}

#[test]
fn disabling_an_agent_revokes_its_sessions() {
    let h = harness();
    let admin = h.admin();
    let (agent, _) = h.agent(&admin, "agente@directorio.cl", "Araucanía");
    let token = h.token("agente@directorio.cl");

    h.marketplace
        .agents
        .set_agent_active(&admin, &agent.id, AgentStatusUpdate { active: false })
        .expect("disabled");

    assert!(h.marketplace.accounts.authenticate(&token).is_err());
    let err = h
        .marketplace
        .accounts
        .login(&Credentials {
            email: "agente@directorio.cl".to_string(),
            password: PASSWORD.to_string(),
        })
        .expect_err("disabled accounts cannot log in");
    assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
}

#[test]
fn agent_status_is_restored_when_its_login_cannot_follow() {
    let stores = Stores::in_memory();
    let h = harness_on(stores.clone(), MarketplaceSettings::default());
    let admin = h.admin();
    let (agent, _) = h.agent(&admin, "agente@directorio.cl", "Araucanía");
    stores
        .users
        .delete(agent.user_id.as_str())
        .expect("login removed behind the service");

    let err = h
        .marketplace
        .agents
        .set_agent_active(&admin, &agent.id, AgentStatusUpdate { active: false })
        .expect_err("account update fails");
    assert!(err.is_not_found());

    let current = stores.agents.get(agent.id.as_str()).expect("agent kept");
    assert!(current.active);
}

#[test]
fn assigned_agent_works_the_panel_and_sees_the_listing() {
    let h = harness();
    let admin = h.admin();
    let owner = h.signup("duenio@taller.cl", Role::Company);
    let (agent, agent_actor) = h.agent(&admin, "agente@directorio.cl", "Araucanía");
    let (_, other_agent) = h.agent(&admin, "otro@directorio.cl", "Los Ríos");
    let company = h
        .marketplace
        .companies
        .submit(&owner, company_submission("Taller", "Temuco"))
        .expect("submitted");

    let validate = |actor: &Actor| {
        h.marketplace.companies.transition(
            actor,
            &company.id,
            TransitionRequest {
                action: ListingAction::Validate,
                note: None,
                expected_version: None,
            },
        )
    };
    assert!(validate(&agent_actor).is_err(), "not yet assigned");

    h.marketplace
        .agents
        .assign_companies(
            &admin,
            &agent.id,
            AssignmentRequest {
                company_ids: vec![company.id.clone()],
            },
        )
        .expect("assigned");

    assert!(validate(&other_agent).is_err(), "assigned to someone else");
    let validated = validate(&agent_actor).expect("assigned agent validates");
    assert_eq!(validated.status, ListingStatus::Validated);

    let err = h
        .marketplace
        .companies
        .transition(
            &agent_actor,
            &company.id,
            TransitionRequest {
                action: ListingAction::SendToReview,
                note: None,
                expected_version: None,
            },
        )
        .and_then(|_| {
            h.marketplace.companies.transition(
                &agent_actor,
                &company.id,
                TransitionRequest {
                    action: ListingAction::Approve,
                    note: None,
                    expected_version: None,
                },
            )
        })
        .expect_err("agents never approve");
    assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);

    let visible = h
        .marketplace
        .companies
        .list(Some(&agent_actor), &CompanyFilter::default())
        .expect("list");
    assert_eq!(visible.len(), 1);

    let summary = h
        .marketplace
        .agents
        .agent_summary(&agent_actor, &agent.id)
        .expect("own summary");
    assert_eq!(summary.assigned, 1);
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.validated_by_agent, 1);

    assert!(h
        .marketplace
        .agents
        .agent_summary(&other_agent, &agent.id)
        .is_err());
}

#[test]
fn agent_submissions_are_self_assigned() {
    let h = harness();
    let admin = h.admin();
    let (agent, agent_actor) = h.agent(&admin, "agente@directorio.cl", "Araucanía");

    let company = h
        .marketplace
        .companies
        .submit(&agent_actor, company_submission("Feria Pitrufquén", "Pitrufquén"))
        .expect("agents file on behalf of businesses");
    assert_eq!(company.assigned_agent, Some(agent.id));
}
