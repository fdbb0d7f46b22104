use agentflow_core::config::{ApiKeyRole, GatewayConfig};

/// Who made the request and what they may do.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub name: String,
    pub role: ApiKeyRole,
}

impl AuthResult {
    fn admin(name: &str) -> Self {
        Self {
            name: name.to_string(),
            role: ApiKeyRole::Admin,
        }
    }
}

/// Bearer header -> api_keys -> legacy token -> legacy password -> anonymous.
///
/// Returns `None` when credentials are required and none matched.
pub fn validate_auth(
    config: &GatewayConfig,
    bearer: Option<&str>,
    query_token: Option<&str>,
    query_password: Option<&str>,
) -> Option<AuthResult> {
    if let Some(presented) = bearer {
        if let Some(key) = config.api_keys.iter().find(|k| k.key == presented) {
            return Some(AuthResult {
                name: key.name.clone(),
                role: key.role.clone(),
            });
        }
        if config.token.as_deref() == Some(presented) {
            return Some(AuthResult::admin("legacy-token"));
        }
        return None;
    }

    if let Some(expected) = &config.token {
        return (query_token == Some(expected.as_str())).then(|| AuthResult::admin("legacy-token"));
    }
    if let Some(expected) = &config.password {
        return (query_password == Some(expected.as_str()))
            .then(|| AuthResult::admin("legacy-password"));
    }

    config
        .api_keys
        .is_empty()
        .then(|| AuthResult::admin("anonymous"))
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

/// `?token=...`
pub fn extract_token_from_query(query: &str) -> Option<&str> {
    query_param(query, "token")
}

/// `?password=...`
pub fn extract_password_from_query(query: &str) -> Option<&str> {
    query_param(query, "password")
}

/// Minimum role a route demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Admin,
}

pub fn permits(role: &ApiKeyRole, access: Access) -> bool {
    match access {
        Access::Read => true,
        Access::Write => matches!(role, ApiKeyRole::Operator | ApiKeyRole::Admin),
        Access::Admin => matches!(role, ApiKeyRole::Admin),
    }
}
