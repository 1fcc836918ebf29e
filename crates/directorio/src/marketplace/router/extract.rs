use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::marketplace::accounts::{Actor, AuthError};
use crate::marketplace::error::DirectoryError;
use crate::marketplace::Marketplace;

/// Caller resolved from a mandatory `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub actor: Actor,
    pub token: String,
}

/// Caller on public endpoints. A missing header is anonymous; a bad token is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeAuthenticated(pub Option<Actor>);

impl MaybeAuthenticated {
    pub fn actor(&self) -> Option<&Actor> {
        self.0.as_ref()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[axum::async_trait]
impl FromRequestParts<Arc<Marketplace>> for Authenticated {
    type Rejection = DirectoryError;

    async fn from_request_parts(
        parts: &mut Parts,
        marketplace: &Arc<Marketplace>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::Unauthenticated)?;
        let actor = marketplace.accounts.authenticate(token)?;
        Ok(Self {
            actor,
            token: token.to_string(),
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<Marketplace>> for MaybeAuthenticated {
    type Rejection = DirectoryError;

    async fn from_request_parts(
        parts: &mut Parts,
        marketplace: &Arc<Marketplace>,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) => Ok(Self(Some(marketplace.accounts.authenticate(token)?))),
            None => Ok(Self(None)),
        }
    }
}
