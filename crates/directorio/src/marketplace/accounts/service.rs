use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Duration;
use tracing::{info, warn};

use super::domain::{
    AccountRegistration, AccountView, Actor, AuthError, Credentials, Role, Session, UserAccount,
    UserId,
};
use super::password::{session_token, PasswordHash, MIN_PASSWORD_LENGTH};
use crate::marketplace::agents::AgentId;
use crate::marketplace::clock::Clock;
use crate::marketplace::error::DirectoryError;
use crate::marketplace::store::{Collection, RepositoryError};
use crate::marketplace::validation::{is_valid_email, normalize_email, ValidationError};

/// Email/password accounts and bearer sessions.
pub struct AccountService {
    users: Arc<dyn Collection<UserAccount>>,
    sessions: Mutex<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
}

/// Input for accounts created by the platform itself (bootstrap admin, paired agent accounts).
pub(crate) struct NewAccount<'a> {
    pub id: Option<UserId>,
    pub email: &'a str,
    pub display_name: &'a str,
    pub password: &'a str,
    pub role: Role,
    pub agent_id: Option<AgentId>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn Collection<UserAccount>>,
        clock: Arc<dyn Clock>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions: Mutex::new(HashMap::new()),
            clock,
            session_ttl,
        }
    }

    /// Public sign-up. Only company and client accounts can be self-registered.
    pub fn register(&self, registration: AccountRegistration) -> Result<AccountView, DirectoryError> {
        if !matches!(registration.role, Role::Company | Role::Client) {
            return Err(DirectoryError::forbidden(format!(
                "{} accounts cannot be self-registered",
                registration.role.label()
            )));
        }

        let account = self.create_account(NewAccount {
            id: None,
            email: &registration.email,
            display_name: &registration.display_name,
            password: &registration.password,
            role: registration.role,
            agent_id: None,
        })?;
        Ok(account.view())
    }

    pub(crate) fn create_account(&self, new: NewAccount<'_>) -> Result<UserAccount, DirectoryError> {
        let mut errors = ValidationError::default();
        let email = normalize_email(new.email);
        if email.is_empty() {
            errors.push("email", "is required");
        } else if !is_valid_email(&email) {
            errors.push("email", "is not a valid address");
        }
        let display_name = errors.required("display_name", new.display_name);
        if new.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.push(
                "password",
                format!("must have at least {MIN_PASSWORD_LENGTH} characters"),
            );
        }
        errors.into_result()?;

        let account = UserAccount {
            id: new.id.unwrap_or_else(UserId::generate),
            email,
            display_name,
            role: new.role,
            password_hash: PasswordHash::create(new.password),
            active: true,
            agent_id: new.agent_id,
            created_at: self.clock.now(),
            version: 0,
        };
        let stored = self
            .users
            .insert_unique(account.clone(), &|existing| existing.email == account.email)
            .map_err(|err| {
                DirectoryError::duplicate_on_conflict(err, || {
                    format!("an account already exists for {}", account.email)
                })
            })?;
        info!(user_id = %stored.id, role = stored.role.label(), "account created");
        Ok(stored)
    }

    /// Ensure the configured administrator exists; an existing account with that email is kept.
    pub fn bootstrap_admin(&self, email: &str, password: &str) -> Result<AccountView, DirectoryError> {
        if let Some(existing) = self.find_by_email(&normalize_email(email))? {
            if existing.role != Role::Admin {
                return Err(DirectoryError::Duplicate(format!(
                    "{} is registered with role {}",
                    existing.email,
                    existing.role.label()
                )));
            }
            return Ok(existing.view());
        }

        let account = self.create_account(NewAccount {
            id: None,
            email,
            display_name: "Administrador",
            password,
            role: Role::Admin,
            agent_id: None,
        })?;
        Ok(account.view())
    }

    pub fn login(&self, credentials: &Credentials) -> Result<Session, DirectoryError> {
        let email = normalize_email(&credentials.email);
        let account = match self.find_by_email(&email)? {
            Some(account) if account.password_hash.verify(&credentials.password) => account,
            _ => {
                warn!(email = %email, "rejected login");
                return Err(AuthError::InvalidCredentials.into());
            }
        };
        if !account.active {
            return Err(AuthError::Disabled(account.email).into());
        }

        let now = self.clock.now();
        let expires_at = now.checked_add_signed(self.session_ttl).ok_or_else(|| {
            DirectoryError::InvalidState("session lifetime is out of range".to_string())
        })?;
        let session = Session {
            token: session_token(),
            user_id: account.id.clone(),
            role: account.role,
            expires_at,
        };

        let mut sessions = self.sessions_guard()?;
        sessions.retain(|_, open| open.expires_at > now);
        sessions.insert(session.token.clone(), session.clone());
        drop(sessions);
        info!(user_id = %account.id, "session opened");
        Ok(session)
    }

    /// Resolve a bearer token to the caller, re-reading the account so disabled users lose
    /// access immediately.
    pub fn authenticate(&self, token: &str) -> Result<Actor, DirectoryError> {
        let session = {
            let mut sessions = self.sessions_guard()?;
            let Some(session) = sessions.get(token).cloned() else {
                return Err(AuthError::Unauthenticated.into());
            };
            if session.expires_at <= self.clock.now() {
                sessions.remove(token);
                return Err(AuthError::Unauthenticated.into());
            }
            session
        };

        let account = self
            .users
            .fetch(session.user_id.as_str())?
            .ok_or(AuthError::Unauthenticated)?;
        if !account.active {
            return Err(AuthError::Disabled(account.email).into());
        }

        Ok(Actor {
            user_id: account.id,
            role: account.role,
            agent_id: account.agent_id,
        })
    }

    pub fn logout(&self, token: &str) -> Result<(), DirectoryError> {
        self.sessions_guard()?.remove(token);
        Ok(())
    }

    pub fn account(&self, id: &UserId) -> Result<AccountView, DirectoryError> {
        Ok(self.users.get(id.as_str())?.view())
    }

    pub(crate) fn set_active(&self, id: &UserId, active: bool) -> Result<(), DirectoryError> {
        let mut account = self.users.get(id.as_str())?;
        let version = account.version;
        account.active = active;
        self.users.update(account, version)?;
        if !active {
            self.sessions_guard()?
                .retain(|_, session| &session.user_id != id);
        }
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, DirectoryError> {
        Ok(self
            .users
            .scan()?
            .into_iter()
            .find(|account| account.email == email))
    }

    #[cfg(test)]
    pub(crate) fn open_sessions(&self) -> usize {
        self.sessions.lock().map_or(0, |sessions| sessions.len())
    }

    fn sessions_guard(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Session>>, RepositoryError> {
        self.sessions
            .lock()
            .map_err(|_| RepositoryError::Unavailable("session table poisoned".to_string()))
    }
}
