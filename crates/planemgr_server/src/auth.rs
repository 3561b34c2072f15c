use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Decides whether a request may touch chart state.
///
/// The chart routes only ever see this trait, so deployments can swap in
/// their own check without touching the handlers.
pub trait Authorizer: Send + Sync {
    /// `bearer` is the token presented in the Authorization header, if any.
    fn is_authorized(&self, bearer: Option<&str>) -> bool;
}

/// Compares the presented token against one configured secret.
///
/// With no secret configured every request passes, which is the local
/// development mode.
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

impl Authorizer for StaticToken {
    fn is_authorized(&self, bearer: Option<&str>) -> bool {
        match &self.token {
            None => true,
            Some(expected) => bearer == Some(expected.as_str()),
        }
    }
}

/// Extract the bearer token from an Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// The 401 response every gated route returns.
pub fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "unauthorized" })),
    )
        .into_response()
}
