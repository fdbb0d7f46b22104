use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::{self, Access, AuthResult};
use crate::error::ApiError;
use crate::state::AppState;

/// Extractor that validates the Bearer header or `?token=`/`?password=`.
pub struct Authenticated(pub AuthResult);

impl Authenticated {
    pub fn require(&self, access: Access) -> Result<(), ApiError> {
        if auth::permits(&self.0.role, access) {
            Ok(())
        } else {
            Err(ApiError::forbidden(&self.0.name))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let bearer = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "));

        let query = parts.uri.query().unwrap_or("");
        let result = auth::validate_auth(
            &state.config,
            bearer,
            auth::extract_token_from_query(query),
            auth::extract_password_from_query(query),
        );

        async move { result.map(Authenticated).ok_or_else(ApiError::unauthorized) }
    }
}
