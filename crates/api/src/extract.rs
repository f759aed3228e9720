//! Caller identity from trusted gateway headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use domain::Actor;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// The [`Actor`] behind a request.
///
/// `X-User-Id` carries the caller's id and `X-User-Roles` a comma-separated
/// role list. Both are set by the gateway after authentication, so they are
/// trusted as-is.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".to_string()))?;
        let user_id = UserId::parse(raw_id.trim())
            .map_err(|_| ApiError::Unauthorized(format!("Invalid X-User-Id: {raw_id}")))?;

        let roles: Vec<String> = parts
            .headers
            .get(USER_ROLES_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|role| !role.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(CurrentActor(Actor::new(user_id, roles)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<CurrentActor, ApiError> {
        let (mut parts, ()) = request.into_parts();
        CurrentActor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_id_and_roles() {
        let user_id = UserId::new();
        let request = Request::builder()
            .header("X-User-Id", user_id.to_string())
            .header("X-User-Roles", "ADMIN, employee")
            .body(())
            .unwrap();

        let CurrentActor(actor) = extract(request).await.unwrap();
        assert_eq!(actor.user_id, user_id);
        assert_eq!(actor.roles, vec!["ADMIN", "employee"]);
    }

    #[tokio::test]
    async fn roles_are_optional() {
        let request = Request::builder()
            .header("X-User-Id", UserId::new().to_string())
            .body(())
            .unwrap();

        let CurrentActor(actor) = extract(request).await.unwrap();
        assert!(actor.roles.is_empty());
    }

    #[tokio::test]
    async fn missing_or_malformed_id_is_rejected() {
        let missing = Request::builder().body(()).unwrap();
        assert!(matches!(extract(missing).await, Err(ApiError::Unauthorized(_))));

        let malformed = Request::builder()
            .header("X-User-Id", "not-a-uuid")
            .body(())
            .unwrap();
        assert!(matches!(extract(malformed).await, Err(ApiError::Unauthorized(_))));
    }
}
