// Actor middleware - resolves the request's Actor once and injects it into request extensions
// Handlers and services only ever see the Actor, never the raw credential

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    error::AppError,
    infrastructure::{
        actor::Actor,
        auth::{AuthFailure, AuthProvider},
    },
};

/// No Authorization header yields an anonymous actor; a present but unusable
/// credential is rejected with 401 before any handler runs.
pub async fn actor_middleware(
    State(auth): State<Arc<dyn AuthProvider>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let request_id = Uuid::new_v4();
    let actor = resolve_actor(request.headers(), auth.as_ref()).await?;
    let span = tracing::info_span!("request", %request_id, actor_id = ?actor.id);

    request.extensions_mut().insert(Arc::new(actor));
    Ok(next.run(request).instrument(span).await)
}

pub async fn resolve_actor(headers: &HeaderMap, auth: &dyn AuthProvider) -> Result<Actor, AppError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(Actor::anonymous());
    };

    let token = header
        .to_str()
        .ok()
        .and_then(bearer_token)
        .ok_or(AppError::Unauthenticated(AuthFailure::Malformed))?;

    auth.authenticate(token).await.map_err(|failure| {
        tracing::info!(reason = failure.code(), "rejected credential");
        AppError::Unauthenticated(failure)
    })
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::HeaderValue;

    struct StaticAuth;

    #[async_trait]
    impl AuthProvider for StaticAuth {
        async fn authenticate(&self, token: &str) -> Result<Actor, AuthFailure> {
            match token {
                "member" => Ok(Actor::member(7)),
                "old" => Err(AuthFailure::Expired),
                _ => Err(AuthFailure::Malformed),
            }
        }
    }

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[tokio::test]
    async fn test_missing_header_is_anonymous() {
        let actor = resolve_actor(&HeaderMap::new(), &StaticAuth).await.unwrap();
        assert_eq!(actor, Actor::anonymous());
    }

    #[tokio::test]
    async fn test_bearer_token_resolves_actor() {
        let actor = resolve_actor(&headers("Bearer member"), &StaticAuth).await.unwrap();
        assert_eq!(actor, Actor::member(7));
    }

    #[tokio::test]
    async fn test_wrong_scheme_is_malformed() {
        let err = resolve_actor(&headers("Basic dXNlcjpwYXNz"), &StaticAuth).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(AuthFailure::Malformed)));

        let err = resolve_actor(&headers("Bearer "), &StaticAuth).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(AuthFailure::Malformed)));
    }

    #[tokio::test]
    async fn test_provider_failure_is_passed_through() {
        let err = resolve_actor(&headers("Bearer old"), &StaticAuth).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(AuthFailure::Expired)));
    }
}
