use authz::{AuthzEngine, Credential, InMemoryGraph, OperationScope};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::debug;

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

/// Header carrying a scoped access token
pub const TOKEN_HEADER: &str = "CA-Token";

/// The authenticated caller of a request
#[derive(Debug, Clone)]
pub struct Caller {
    pub credential: Credential,
}

impl Caller {
    /// Load a fresh snapshot of what the caller can reach and run `check`
    /// inside a single operation scope, so every check of the request shares
    /// one ownership set. A superuser without a token is never resolved, so
    /// nothing is loaded for them.
    pub async fn authorize<T>(
        &self,
        state: &AppState,
        check: impl FnOnce(&OperationScope<'_, InMemoryGraph>) -> authz::Result<T>,
    ) -> ApiResult<T> {
        let graph = if self.credential.bypasses_checks() {
            InMemoryGraph::new()
        } else {
            state.db.storage().load_snapshot(&self.credential).await?
        };
        let engine = AuthzEngine::new(graph);
        let scope = engine.begin_operation(&self.credential);
        Ok(check(&scope)?)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // A header that is not valid UTF-8 counts as absent
        let ca_token = parts
            .headers
            .get(TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        let authorization = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let credential = state.resolver.from_headers(ca_token, authorization).await?;
        if !credential.is_authenticated() {
            return Err(ApiError::Unauthorized);
        }

        debug!("Request authenticated as {}", credential);
        Ok(Caller { credential })
    }
}
