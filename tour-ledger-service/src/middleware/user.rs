use crate::models::ActingUser;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Acting user taken from the `X-User-ID` header set by the front end.
///
/// `X-User-Role` carries a comma-separated role list. A missing or blank
/// user id is rejected with 401 before the handler runs.
#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let roles = parts
            .headers
            .get_all(USER_ROLE_HEADER)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::to_string)
            .collect();

        let user = ActingUser::new(user_id, roles)?;

        tracing::Span::current().record("user_id", user.id.as_str());

        Ok(user)
    }
}
