//! Caller identity: bearer token to tenant.
//!
//! The tenant a request acts for comes only from the `Authorization`
//! header, never from the body.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use souschef_core::message::TenantId;
use tracing::warn;

use crate::error::ApiError;
use crate::SharedState;

/// Resolves an access token to the tenant it belongs to.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<TenantId>;
}

/// Fixed token table, usually from `[gateway.tokens]` in the config file.
#[derive(Default)]
pub struct StaticTenantDirectory {
    tokens: HashMap<String, TenantId>,
}

impl StaticTenantDirectory {
    pub fn new(tokens: &HashMap<String, String>) -> Self {
        Self {
            tokens: tokens
                .iter()
                .map(|(token, tenant)| (token.clone(), TenantId::from(tenant.as_str())))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
    async fn resolve(&self, token: &str) -> Option<TenantId> {
        self.tokens.get(token).cloned()
    }
}

/// Reject requests without a known bearer token; otherwise attach the
/// caller's [`TenantId`] as a request extension.
pub async fn auth_middleware(State(state): State<SharedState>, mut req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let tenant = match token {
        Some(token) if !token.is_empty() => state.tenants.resolve(token).await,
        _ => None,
    };

    match tenant {
        Some(tenant) => {
            req.extensions_mut().insert(tenant);
            next.run(req).await
        }
        None => {
            warn!(path = %req.uri().path(), "Unauthorized request: missing or unknown bearer token");
            ApiError::new(StatusCode::UNAUTHORIZED, "Could not validate credentials").into_response()
        }
    }
}
