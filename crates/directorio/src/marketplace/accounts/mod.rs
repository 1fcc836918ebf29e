//! Accounts, roles and bearer sessions.

pub mod domain;
mod password;
pub mod service;

pub use domain::{
    AccountRegistration, AccountView, Actor, AuthError, Credentials, Role, Session, UserAccount,
    UserId,
};
pub use password::PasswordHash;
pub use service::AccountService;
pub(crate) use service::NewAccount;
